use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One feed entry that survived parsing. Serialized as `{title, link, source}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Display name of the feed the entry came from
    pub source: String,
    #[serde(skip_serializing)]
    pub published_at: DateTime<Utc>,
}

/// Coarse relevance of a story to the configured company context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(format!("unknown impact rating: {:?}", other)),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::Low => "Low",
            Impact::Medium => "Medium",
            Impact::High => "High",
        };
        f.write_str(s)
    }
}

/// An article with its generated summary and impact rating.
/// Serialized flat: `{title, link, source, summary, impact}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub summary: String,
    pub impact: Impact,
}

/// Response value for one digest request. Never persisted.
///
/// The same shape is used whether or not anything was found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Digest {
    pub total_found: usize,
    pub summarized_count: usize,
    pub summarized_articles: Vec<EnrichedArticle>,
    pub full_article_list: Vec<Article>,
}
