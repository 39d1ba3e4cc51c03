use rivalscope::scraping::download_page;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_download_page_within_limit() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/story")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>Rival ships sync.</p>")
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let html = download_page(&client, &format!("{}/story", server.url()), TIMEOUT, 1024)
        .await
        .unwrap();

    assert_eq!(html, "<p>Rival ships sync.</p>");
}

#[tokio::test]
async fn test_download_page_rejects_large_declared_length() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/huge")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("x".repeat(4096))
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let err = download_page(&client, &format!("{}/huge", server.url()), TIMEOUT, 1024)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("too large"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_download_page_rejects_large_chunked_body() {
    let mut server = mockito::Server::new_async().await;
    // Chunked responses carry no Content-Length, so only the body check can catch them
    let _mock = server
        .mock("GET", "/stream")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_chunked_body(|w| w.write_all(&[b'x'; 4096]))
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let err = download_page(&client, &format!("{}/stream", server.url()), TIMEOUT, 1024)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("too large"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_download_page_error_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let err = download_page(&client, &format!("{}/gone", server.url()), TIMEOUT, 1024)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("404"), "unexpected error: {err}");
}
