use anyhow::{Context, Result};
use std::sync::Arc;

/// Core trait for inference providers (local or remote)
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Model name, for logs and the status endpoint
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    /// Ask the service to constrain its output to a JSON object
    pub json_output: bool,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod ollama;
pub mod remote;

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Try to find the first '{' and last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}

/// Build the provider selected by `llm.adapter` ("ollama" when unset).
pub fn create_provider(llm_config: Option<&common::LlmConfig>) -> Result<Arc<dyn LlmProvider>> {
    let adapter = llm_config
        .and_then(|c| c.adapter.as_deref())
        .unwrap_or("ollama");

    match adapter {
        "ollama" => {
            let cfg = llm_config.and_then(|c| c.ollama.clone()).unwrap_or_default();
            let mut provider = ollama::OllamaProvider::new(
                cfg.api_url.unwrap_or_else(|| ollama::DEFAULT_API_URL.to_string()),
                cfg.model.unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string()),
            );
            if let Some(timeout_secs) = cfg.timeout_seconds {
                provider = provider.with_timeout(timeout_secs);
            }
            Ok(Arc::new(provider))
        }
        "remote" => {
            let cfg = llm_config
                .and_then(|c| c.remote.clone())
                .context("LLM adapter 'remote' selected but [llm.remote] is missing")?;

            let api_key_env = cfg
                .api_key_env
                .as_deref()
                .context("Missing api_key_env in remote config")?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let provider = remote::RemoteLlmProvider::new(
                cfg.api_url
                    .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
                api_key,
                cfg.model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            )
            .with_defaults(
                cfg.timeout_seconds.unwrap_or(30),
                cfg.max_tokens.unwrap_or(300),
                0.3,
            );
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("Unknown LLM adapter type: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_and_fenced_json() {
        assert_eq!(
            extract_json_from_text(r#"{"summary": "x", "impact": "Low"}"#).as_deref(),
            Some(r#"{"summary": "x", "impact": "Low"}"#)
        );
        assert_eq!(
            extract_json_from_text("Sure!\n```json\n{\"a\": 1}\n```\nAnything else?").as_deref(),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            extract_json_from_text("Here you go: {\"a\": {\"b\": 2}} done").as_deref(),
            Some("{\"a\": {\"b\": 2}}")
        );
        assert_eq!(extract_json_from_text("no json at all"), None);
        assert_eq!(extract_json_from_text("} backwards {"), None);
    }

    #[test]
    fn default_adapter_is_ollama() {
        let provider = create_provider(None).expect("provider");
        assert_eq!(provider.model(), ollama::DEFAULT_MODEL);
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        let cfg = common::LlmConfig {
            adapter: Some("carrier-pigeon".into()),
            ..Default::default()
        };
        assert!(create_provider(Some(&cfg)).is_err());
    }

    #[test]
    fn remote_adapter_requires_its_key() {
        let cfg = common::LlmConfig {
            adapter: Some("remote".into()),
            remote: Some(common::RemoteLlmConfig {
                api_key_env: Some("RIVALSCOPE_TEST_KEY_THAT_IS_NEVER_SET".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = create_provider(Some(&cfg)).err().expect("missing key must fail");
        assert!(err.to_string().contains("RIVALSCOPE_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
