use clap::Parser;
use rivalscope::ingestion::{build_http_client, FeedFetcher, FetchSettings};

#[derive(Parser, Debug)]
#[command(name = "check_feeds", about = "Fetch feeds and show what rivalscope sees in them")]
struct Args {
    /// Feed URLs to check
    #[arg(required = true, value_name = "URL")]
    urls: Vec<String>,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let settings = FetchSettings {
        timeout: std::time::Duration::from_secs(args.timeout),
        ..Default::default()
    };
    let fetcher = FeedFetcher::new(build_http_client(&settings)?, &settings);

    for url in &args.urls {
        println!("\n{}", "=".repeat(60));
        println!("Checking: {}", url);
        println!("{}", "=".repeat(60));

        match fetcher.fetch_and_parse_feed(url).await {
            Ok(feed) => {
                println!("✓ Success!");
                println!("  Source: {}", feed.source_name);
                println!("  Articles: {} ({} entries skipped)", feed.articles.len(), feed.skipped);

                for (i, article) in feed.articles.iter().take(3).enumerate() {
                    println!("    {}. {}", i + 1, article.title);
                    println!("       URL: {}", article.link);
                    println!("       Published: {}", article.published_at.to_rfc3339());
                }
            }
            Err(e) => {
                println!("✗ Failed: {:#}", e);
            }
        }
    }

    Ok(())
}
