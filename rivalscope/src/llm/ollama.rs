use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "gemma:2b";

/// Local inference through Ollama's native `/api/generate` endpoint
pub struct OllamaProvider {
    api_url: String,
    model: String,
    default_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(api_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = self.default_timeout;

        let req_body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: request.json_output.then_some("json"),
        };

        let response = tokio::time::timeout(
            timeout,
            self.client.post(&self.api_url).json(&req_body).send(),
        )
        .await
        .context("Ollama request timed out")?
        .context("Ollama HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, body);
        }

        let resp_body: GenerateResponse = tokio::time::timeout(timeout, response.json())
            .await
            .context("Ollama response timed out")?
            .context("Failed to parse Ollama response")?;

        let prompt_tokens = resp_body.prompt_eval_count.unwrap_or(0);
        let completion_tokens = resp_body.eval_count.unwrap_or(0);

        Ok(LlmResponse {
            content: resp_body.response,
            usage: UsageMetadata {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: Option<String>,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}
