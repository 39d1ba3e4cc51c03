use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};
use crate::models::{Article, EnrichedArticle, Impact};
use crate::scraping;

/// Default cap on the article text sent to the inference service.
pub const DEFAULT_MAX_ARTICLE_CHARS: usize = 2500;

/// Why one article could not be enriched. Always terminal for that article.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentFailure {
    #[error("invalid article link: {0}")]
    InvalidLink(String),

    #[error("page download failed: {0}")]
    Download(String),

    #[error("no extractable text on page")]
    NoText,

    #[error("inference call failed: {0}")]
    Inference(String),

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

/// Attaches a summary and an impact rating to one article.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, article: &Article) -> Result<EnrichedArticle, EnrichmentFailure>;
}

/// Summary and rating as returned by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub summary: String,
    pub impact: Impact,
}

#[derive(Debug, Deserialize)]
struct AnalysisJson {
    summary: Option<String>,
    impact: Option<String>,
}

/// Download → extract → truncate → prompt → parse, with no retries at any step.
pub struct ArticleEnricher {
    client: Client,
    provider: Arc<dyn LlmProvider>,
    company_context: String,
    max_article_chars: usize,
    page_timeout: Duration,
    max_page_bytes: u64,
}

impl ArticleEnricher {
    pub fn new(
        client: Client,
        provider: Arc<dyn LlmProvider>,
        company_context: impl Into<String>,
    ) -> Self {
        Self {
            client,
            provider,
            company_context: company_context.into(),
            max_article_chars: DEFAULT_MAX_ARTICLE_CHARS,
            page_timeout: Duration::from_secs(15),
            max_page_bytes: 5 * 1024 * 1024,
        }
    }

    pub fn with_limits(
        mut self,
        max_article_chars: usize,
        page_timeout: Duration,
        max_page_bytes: u64,
    ) -> Self {
        self.max_article_chars = max_article_chars;
        self.page_timeout = page_timeout;
        self.max_page_bytes = max_page_bytes;
        self
    }

    async fn analyze(&self, article_text: &str) -> Result<Analysis, EnrichmentFailure> {
        let request = LlmRequest {
            prompt: build_prompt(&self.company_context, article_text),
            json_output: true,
        };

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| EnrichmentFailure::Inference(format!("{:#}", e)))?;

        debug!(
            "inference: model {} used {} prompt / {} completion tokens",
            response.model, response.usage.prompt_tokens, response.usage.completion_tokens
        );

        parse_analysis(&response.content)
    }
}

#[async_trait::async_trait]
impl Enricher for ArticleEnricher {
    async fn enrich(&self, article: &Article) -> Result<EnrichedArticle, EnrichmentFailure> {
        let url = Url::parse(&article.link)
            .map_err(|e| EnrichmentFailure::InvalidLink(format!("{}: {}", article.link, e)))?;

        let html = scraping::download_page(
            &self.client,
            url.as_str(),
            self.page_timeout,
            self.max_page_bytes,
        )
        .await
        .map_err(|e| EnrichmentFailure::Download(format!("{:#}", e)))?;

        let text = scraping::extract_main_text(&html, &url).ok_or(EnrichmentFailure::NoText)?;
        let text = scraping::truncate_chars(&text, self.max_article_chars);

        let analysis = self.analyze(text).await?;

        Ok(EnrichedArticle {
            article: article.clone(),
            summary: analysis.summary,
            impact: analysis.impact,
        })
    }
}

/// Prompt asking for exactly `summary` and `impact`, rated against the company context.
pub fn build_prompt(company_context: &str, article_text: &str) -> String {
    format!(
        r#"You are a strategic analyst working for a company described as follows: "{context}".
Read the article below and answer with a single JSON object that has exactly two keys:
1. "summary": a concise summary of the article in at most two sentences.
2. "impact": how much this news matters to the company, one of "Low", "Medium" or "High".
Output only the JSON object, with no introduction or commentary.

ARTICLE:
"{text}"
"#,
        context = company_context.trim(),
        text = article_text
    )
}

/// Parse the model output into a summary and a rating.
///
/// A missing or blank summary, or a rating other than Low/Medium/High, is malformed.
pub fn parse_analysis(raw: &str) -> Result<Analysis, EnrichmentFailure> {
    let json = extract_json_from_text(raw)
        .ok_or_else(|| EnrichmentFailure::MalformedResponse(format!("no JSON object in {:?}", raw)))?;

    let parsed: AnalysisJson = serde_json::from_str(&json)
        .map_err(|e| EnrichmentFailure::MalformedResponse(format!("{}: {}", e, json)))?;

    let summary = parsed
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EnrichmentFailure::MalformedResponse("missing summary".into()))?;

    let impact = parsed
        .impact
        .ok_or_else(|| EnrichmentFailure::MalformedResponse("missing impact".into()))?
        .parse::<Impact>()
        .map_err(EnrichmentFailure::MalformedResponse)?;

    Ok(Analysis { summary, impact })
}
