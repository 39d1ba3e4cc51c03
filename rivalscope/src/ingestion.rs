use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::Article;

/// Display name used when a feed document has no usable title.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";
const UNTITLED: &str = "Untitled";

/// Outbound HTTP settings, resolved from `[fetch]` with defaults applied.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub page_timeout: Duration,
    pub user_agent: String,
    pub max_response_bytes: u64,
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            page_timeout: Duration::from_secs(15),
            user_agent: format!("rivalscope/{}", env!("CARGO_PKG_VERSION")),
            max_response_bytes: 5 * 1024 * 1024,
            concurrency: 4,
        }
    }
}

impl FetchSettings {
    pub fn from_config(cfg: Option<&common::FetchConfig>) -> Self {
        let defaults = Self::default();
        let Some(cfg) = cfg else {
            return defaults;
        };
        Self {
            timeout: cfg.timeout_seconds.map(Duration::from_secs).unwrap_or(defaults.timeout),
            page_timeout: cfg
                .page_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.page_timeout),
            user_agent: cfg.user_agent.clone().unwrap_or(defaults.user_agent),
            max_response_bytes: cfg.max_response_bytes.unwrap_or(defaults.max_response_bytes),
            concurrency: cfg.concurrency.unwrap_or(defaults.concurrency).max(1),
        }
    }
}

/// Build the HTTP client shared by feed fetching and page downloads.
pub fn build_http_client(settings: &FetchSettings) -> Result<Client> {
    Client::builder()
        .timeout(settings.timeout)
        .user_agent(&settings.user_agent)
        .build()
        .context("failed to build reqwest client")
}

/// A feed document reduced to what the digest needs.
#[derive(Debug)]
pub struct ParsedFeed {
    pub source_name: String,
    pub articles: Vec<Article>,
    /// Entries dropped for lacking a link or a usable timestamp
    pub skipped: usize,
}

/// Parse a feed document (RSS, Atom or JSON Feed).
///
/// Entries without a link or without a parseable timestamp are left out rather than
/// failing the whole document.
pub fn parse_feed(body: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(body).context("failed to parse feed")?;

    let source_name = feed
        .title
        .as_ref()
        .map(|t| t.content.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let mut articles = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;
    for entry in &feed.entries {
        match entry_to_article(entry, &source_name) {
            Some(article) => articles.push(article),
            None => skipped += 1,
        }
    }

    Ok(ParsedFeed {
        source_name,
        articles,
        skipped,
    })
}

fn entry_to_article(entry: &Entry, source_name: &str) -> Option<Article> {
    let link = entry.links.first().map(|l| l.href.trim().to_string())?;
    if link.is_empty() {
        return None;
    }

    // Atom entries often carry only <updated>
    let published_at: DateTime<Utc> = entry.published.or(entry.updated)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    Some(Article {
        title,
        link,
        source: source_name.to_string(),
        published_at,
    })
}

/// Retrieves feed documents and turns them into articles, one source at a time.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
    max_response_bytes: u64,
    concurrency: usize,
}

impl FeedFetcher {
    pub fn new(client: Client, settings: &FetchSettings) -> Self {
        Self {
            client,
            max_response_bytes: settings.max_response_bytes,
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Fetches a feed from the given URL and parses it. Single attempt, no retries.
    pub async fn fetch_and_parse_feed(&self, url: &str) -> Result<ParsedFeed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("network error during fetch")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed with status: {}", status);
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                anyhow::bail!("feed too large: {} bytes (limit {})", len, self.max_response_bytes);
            }
        }

        let bytes = response.bytes().await.context("failed to read response body")?;
        if bytes.len() as u64 > self.max_response_bytes {
            anyhow::bail!(
                "feed too large: {} bytes (limit {})",
                bytes.len(),
                self.max_response_bytes
            );
        }

        parse_feed(bytes.as_ref())
    }

    /// Fetch one source. Failures are logged and contribute no articles.
    pub async fn fetch(&self, url: &str) -> Vec<Article> {
        match self.fetch_and_parse_feed(url).await {
            Ok(feed) => {
                debug!(
                    "Fetched feed '{}' ({}): {} articles, {} entries skipped",
                    feed.source_name,
                    url,
                    feed.articles.len(),
                    feed.skipped
                );
                feed.articles
            }
            Err(e) => {
                warn!("Could not process feed {}: {:#}", url, e);
                Vec::new()
            }
        }
    }

    /// Fetch every source and concatenate the articles in source order.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<Article> {
        let per_source: Vec<Vec<Article>> = stream::iter(urls.iter().cloned())
            .map(|url| async move { self.fetch(&url).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let articles: Vec<Article> = per_source.into_iter().flatten().collect();
        info!("Fetched {} articles from {} sources", articles.len(), urls.len());
        articles
    }
}
