use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use url::Url;

/// Ensure the required schema exists. Idempotent and safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");

    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task TEXT NOT NULL,
            is_completed BOOLEAN NOT NULL DEFAULT FALSE,
            reminder_days INTEGER,
            created_at TIMESTAMP DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );
        "#,
    ];

    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| "failed to ensure schema")?;
    }

    info!("storage: DB schema ensured");
    Ok(())
}

/// A feed URL in the source registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub id: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i64,
    url: String,
    created_at: String,
}

impl TryFrom<SourceRow> for SourceRecord {
    type Error = anyhow::Error;

    fn try_from(row: SourceRow) -> Result<Self> {
        Ok(SourceRecord {
            id: row.id,
            url: row.url,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Failed to parse timestamp {:?}", raw))?
        .with_timezone(&Utc))
}

/// Check that `raw` is an absolute http(s) URL and return it trimmed.
pub fn normalize_source_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).with_context(|| format!("invalid source URL: {:?}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => anyhow::bail!("unsupported URL scheme {:?} in {:?}", other, raw),
    }
}

/// All registered sources, in registration order
pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<SourceRecord>> {
    let rows = sqlx::query_as::<_, SourceRow>(
        "SELECT id, url, created_at FROM sources ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list sources")?;

    rows.into_iter().map(SourceRecord::try_from).collect()
}

/// Register a feed URL. Registering the same URL twice returns the existing record.
pub async fn add_source(pool: &SqlitePool, url: &str) -> Result<SourceRecord> {
    let url = normalize_source_url(url)?;

    sqlx::query("INSERT OR IGNORE INTO sources (url) VALUES (?)")
        .bind(&url)
        .execute(pool)
        .await
        .context("Failed to insert source")?;

    let row = sqlx::query_as::<_, SourceRow>(
        "SELECT id, url, created_at FROM sources WHERE url = ?",
    )
    .bind(&url)
    .fetch_one(pool)
    .await
    .context("Failed to fetch source")?;

    SourceRecord::try_from(row)
}

/// Remove a source. Returns `false` when no source had that id.
pub async fn remove_source(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete source")?;

    Ok(result.rows_affected() > 0)
}

/// Make sure every source listed in the configuration is registered.
pub async fn seed_sources(pool: &SqlitePool, sources: &[common::SourceConfig]) -> Result<usize> {
    for source in sources {
        add_source(pool, &source.url)
            .await
            .with_context(|| format!("failed to seed source {}", source.url))?;
    }
    Ok(sources.len())
}
