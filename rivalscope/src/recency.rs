use chrono::{DateTime, Duration, Utc};

use crate::models::Article;

/// Default trailing window for "recent" articles.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Keep articles published strictly after `now - window`, preserving their order.
///
/// No de-duplication happens here: the same story carried by two feeds is kept twice.
pub fn filter_recent(articles: Vec<Article>, now: DateTime<Utc>, window: Duration) -> Vec<Article> {
    let threshold = now - window;
    articles
        .into_iter()
        .filter(|a| a.published_at > threshold)
        .collect()
}
