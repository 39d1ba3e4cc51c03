/*!
common/src/lib.rs

Shared configuration types and DB helper functions for rivalscope.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override file
- A helper to initialize an SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Longest accepted recency window (one year).
pub const MAX_RECENCY_HOURS: i64 = 24 * 365;

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g. "127.0.0.1")
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/rivalscope.db")
    pub path: String,
}

/// Outbound HTTP settings shared by the feed fetcher and the page downloader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: Option<u64>,
    pub page_timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub max_response_bytes: Option<u64>,
    /// How many feeds are fetched at the same time
    pub concurrency: Option<usize>,
}

/// Digest pipeline tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Trailing window, in hours, that counts as "recent"
    pub recency_hours: Option<i64>,
    /// Number of articles enriched when the request does not say
    pub default_count: Option<usize>,
    /// Size of the enrichment worker pool
    pub workers: Option<usize>,
    /// Article text is cut to this many characters before it reaches the LLM
    pub max_article_chars: Option<usize>,
    /// Upper bound for one article's enrichment (download + extraction + inference)
    pub task_timeout_seconds: Option<u64>,
}

/// Ollama config (used if `llm.adapter = "ollama"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config grouping the adapter specifics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "ollama", "remote"
    pub ollama: Option<OllamaConfig>,
    pub remote: Option<RemoteLlmConfig>,
}

/// Business context the enrichment prompt rates impact against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub context: String,
}

/// Feed source seeded into the registry at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub database: DatabaseConfig,
    pub fetch: Option<FetchConfig>,
    pub digest: Option<DigestConfig>,
    pub llm: Option<LlmConfig>,
    pub company: CompanyConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.company.context.trim().is_empty() {
            anyhow::bail!("company.context must not be empty");
        }
        for source in &self.sources {
            url::Url::parse(&source.url)
                .with_context(|| format!("Invalid source URL in configuration: {}", source.url))?;
        }
        if let Some(hours) = self.digest.as_ref().and_then(|d| d.recency_hours) {
            if !(1..=MAX_RECENCY_HOURS).contains(&hours) {
                anyhow::bail!(
                    "digest.recency_hours must be between 1 and {}, got {}",
                    MAX_RECENCY_HOURS,
                    hours
                );
            }
        }
        if let Some(workers) = self.digest.as_ref().and_then(|d| d.workers) {
            if workers == 0 {
                anyhow::bail!("digest.workers must be at least 1");
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`:
/// - max_connections: 5
/// - WAL journal mode
///
/// Example:
///   let pool = init_db_pool("data/rivalscope.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Creating the file up front surfaces permission or path problems with a clearer error
    // than the SQLite connect would.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [database]
        path = "data/test.db"

        [company]
        context = "We build a developer journal."

        [[sources]]
        url = "https://example.com/feed.xml"
    "#;

    #[test]
    fn config_from_string() {
        let cfg: Config = toml::from_str(MINIMAL).expect("parse config");
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.company.context, "We build a developer journal.");
        assert!(cfg.digest.is_none());
        cfg.validate().expect("valid config");
    }

    #[test]
    fn validate_rejects_blank_context_and_bad_urls() {
        let mut cfg: Config = toml::from_str(MINIMAL).expect("parse config");
        cfg.company.context = "   ".into();
        assert!(cfg.validate().is_err());

        let mut cfg: Config = toml::from_str(MINIMAL).expect("parse config");
        cfg.sources.push(SourceConfig { url: "not a url".into() });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_window() {
        for hours in [0, -24, MAX_RECENCY_HOURS + 1, 3_000_000_000_000] {
            let mut cfg: Config = toml::from_str(MINIMAL).expect("parse config");
            cfg.digest = Some(DigestConfig {
                recency_hours: Some(hours),
                ..Default::default()
            });
            assert!(cfg.validate().is_err(), "accepted recency_hours = {hours}");
        }

        let mut cfg: Config = toml::from_str(MINIMAL).expect("parse config");
        cfg.digest = Some(DigestConfig {
            recency_hours: Some(MAX_RECENCY_HOURS),
            ..Default::default()
        });
        cfg.validate().expect("one year is accepted");
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        std::fs::write(&default_path, MINIMAL).expect("write default");
        std::fs::write(
            &override_path,
            "[digest]\nrecency_hours = 48\n\n[company]\ncontext = \"Override context\"\n",
        )
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load merged config");

        assert_eq!(cfg.company.context, "Override context");
        assert_eq!(cfg.database.path, "data/test.db");
        assert_eq!(cfg.digest.and_then(|d| d.recency_hours), Some(48));
        assert_eq!(cfg.sources.len(), 1);
    }

    #[tokio::test]
    async fn db_pool_in_temp_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("rivalscope.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = init_db_pool(&db_path_str).await.expect("init pool");
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
        assert!(db_path.exists());
    }
}
