use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Downloads the article page at `url`. Single attempt, bounded by `timeout` and `max_bytes`.
pub async fn download_page(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: u64,
) -> Result<String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .context("failed to fetch article page")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("article fetch failed with status: {}", status));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            anyhow::bail!("article page too large: {} bytes (limit {})", len, max_bytes);
        }
    }

    let bytes = response.bytes().await.context("failed to read response body")?;
    if bytes.len() as u64 > max_bytes {
        anyhow::bail!(
            "article page too large: {} bytes (limit {})",
            bytes.len(),
            max_bytes
        );
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extracts the primary text of an HTML page, without navigation and boilerplate.
///
/// Readability picks the main content block, which is then flattened to text. When that
/// yields nothing, the page's paragraphs are used instead. Returns `None` when the page has
/// no usable text at all.
pub fn extract_main_text(html: &str, url: &Url) -> Option<String> {
    let mut reader = Cursor::new(html.as_bytes());

    let readable = match readability::extractor::extract(&mut reader, url) {
        Ok(product) => match html2text::from_read(product.content.as_bytes(), 80) {
            Ok(text) => text,
            Err(e) => {
                warn!("scraping: failed to convert extracted HTML to text: {}", e);
                product.text
            }
        },
        Err(e) => {
            warn!("scraping: readability failed for {}: {}", url, e);
            String::new()
        }
    };

    let readable = readable.trim();
    if !readable.is_empty() {
        debug!("scraping: readability extracted {} chars from {}", readable.len(), url);
        return Some(readable.to_string());
    }

    let paragraphs = paragraph_text(html);
    if paragraphs.is_empty() {
        None
    } else {
        debug!("scraping: fell back to {} chars of paragraph text from {}", paragraphs.len(), url);
        Some(paragraphs)
    }
}

fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cuts `text` to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
