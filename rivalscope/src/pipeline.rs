use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use common::{Config, DigestConfig};

use crate::digest::{build_digest, DEFAULT_REQUESTED};
use crate::dispatch::{DispatchLimits, DEFAULT_TASK_TIMEOUT, DEFAULT_WORKERS};
use crate::ingestion::{build_http_client, FeedFetcher, FetchSettings};
use crate::llm::LlmProvider;
use crate::models::Digest;
use crate::processing::{ArticleEnricher, Enricher, DEFAULT_MAX_ARTICLE_CHARS};
use crate::recency::{filter_recent, DEFAULT_WINDOW_HOURS};

/// `[digest]` with defaults applied
#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub window: Duration,
    pub default_count: usize,
    pub limits: DispatchLimits,
    pub max_article_chars: usize,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
            default_count: DEFAULT_REQUESTED,
            limits: DispatchLimits::default(),
            max_article_chars: DEFAULT_MAX_ARTICLE_CHARS,
        }
    }
}

impl DigestSettings {
    pub fn from_config(cfg: Option<&DigestConfig>) -> Result<Self> {
        let defaults = Self::default();
        let Some(cfg) = cfg else {
            return Ok(defaults);
        };
        let window = match cfg.recency_hours {
            Some(hours) if hours <= 0 => {
                anyhow::bail!("digest.recency_hours must be positive, got {}", hours)
            }
            Some(hours) => Duration::try_hours(hours)
                .with_context(|| format!("digest.recency_hours out of range: {}", hours))?,
            None => defaults.window,
        };
        Ok(Self {
            window,
            default_count: cfg.default_count.unwrap_or(defaults.default_count),
            limits: DispatchLimits {
                workers: cfg.workers.unwrap_or(DEFAULT_WORKERS).max(1),
                task_timeout: cfg
                    .task_timeout_seconds
                    .map(std::time::Duration::from_secs)
                    .unwrap_or(DEFAULT_TASK_TIMEOUT),
            },
            max_article_chars: cfg.max_article_chars.unwrap_or(defaults.max_article_chars),
        })
    }
}

/// Fetch → recency filter → enrich → assemble.
///
/// Holds only immutable handles, so one instance serves concurrent requests.
pub struct DigestPipeline {
    fetcher: FeedFetcher,
    enricher: Arc<dyn Enricher>,
    settings: DigestSettings,
}

impl DigestPipeline {
    pub fn new(fetcher: FeedFetcher, enricher: Arc<dyn Enricher>, settings: DigestSettings) -> Self {
        Self {
            fetcher,
            enricher,
            settings,
        }
    }

    /// Wire the fetcher and the article enricher from configuration.
    pub fn from_config(config: &Config, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let fetch = FetchSettings::from_config(config.fetch.as_ref());
        let settings = DigestSettings::from_config(config.digest.as_ref())?;
        let client = build_http_client(&fetch)?;

        let enricher = ArticleEnricher::new(client.clone(), provider, config.company.context.clone())
            .with_limits(
                settings.max_article_chars,
                fetch.page_timeout,
                fetch.max_response_bytes,
            );

        Ok(Self::new(
            FeedFetcher::new(client, &fetch),
            Arc::new(enricher),
            settings,
        ))
    }

    pub fn settings(&self) -> &DigestSettings {
        &self.settings
    }

    pub async fn run(&self, sources: &[String], requested: usize) -> Digest {
        self.run_at(sources, requested, Utc::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit reference time for the recency window.
    pub async fn run_at(&self, sources: &[String], requested: usize, now: DateTime<Utc>) -> Digest {
        info!(
            "Building digest: {} sources, {} requested, window {}h",
            sources.len(),
            requested,
            self.settings.window.num_hours()
        );

        let articles = self.fetcher.fetch_all(sources).await;
        let recent = filter_recent(articles, now, self.settings.window);

        build_digest(recent, requested, self.enricher.clone(), self.settings.limits).await
    }
}
