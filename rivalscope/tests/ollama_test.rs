use mockito::Matcher;
use rivalscope::llm::ollama::OllamaProvider;
use rivalscope::llm::{LlmProvider, LlmRequest};
use serde_json::json;

#[tokio::test]
async fn test_ollama_generate_json() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "gemma:2b",
            "prompt": "Rate this",
            "stream": false,
            "format": "json"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "gemma:2b",
                "response": "{\"summary\": \"Rival raised prices.\", \"impact\": \"Medium\"}",
                "done": true,
                "prompt_eval_count": 42,
                "eval_count": 17
            }"#,
        )
        .create_async()
        .await;

    let provider = OllamaProvider::new(format!("{}/api/generate", server.url()), "gemma:2b");

    let response = provider
        .generate(LlmRequest {
            prompt: "Rate this".to_string(),
            json_output: true,
        })
        .await
        .unwrap();

    assert_eq!(
        response.content,
        r#"{"summary": "Rival raised prices.", "impact": "Medium"}"#
    );
    assert_eq!(response.usage.prompt_tokens, 42);
    assert_eq!(response.usage.completion_tokens, 17);
    assert_eq!(response.usage.total_tokens, 59);
    assert_eq!(response.model, "gemma:2b");
    assert_eq!(provider.model(), "gemma:2b");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_error_status() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(404)
        .with_body(r#"{"error": "model 'gemma:2b' not found"}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(format!("{}/api/generate", server.url()), "gemma:2b");

    let err = provider
        .generate(LlmRequest {
            prompt: "Rate this".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("404"), "unexpected error: {message}");
    assert!(message.contains("not found"), "unexpected error: {message}");
}

#[tokio::test]
async fn test_ollama_unreachable() {
    // Nothing listens on port 9 locally
    let provider = OllamaProvider::new("http://127.0.0.1:9/api/generate", "gemma:2b").with_timeout(2);

    let result = provider
        .generate(LlmRequest {
            prompt: "Rate this".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_ollama_timeout() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let provider =
        OllamaProvider::new(format!("{}/api/generate", server.url()), "gemma:2b").with_timeout(1);

    let result = provider
        .generate(LlmRequest {
            prompt: "Rate this".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.unwrap_err().to_string().contains("timed out"));
}
