use std::sync::Arc;
use tracing::info;

use crate::dispatch::{dispatch, DispatchLimits};
use crate::models::{Article, Digest, EnrichedArticle};
use crate::processing::Enricher;

/// Number of articles enriched when a request does not say.
pub const DEFAULT_REQUESTED: usize = 5;

/// The leading slice of `full_list` that gets enriched.
pub fn select_for_enrichment(full_list: &[Article], requested: usize) -> &[Article] {
    &full_list[..requested.min(full_list.len())]
}

/// Combine the recent-article list with the dispatch results for its leading slice.
///
/// Failed slots are dropped; survivors keep their relative order.
pub fn assemble(
    full_list: Vec<Article>,
    requested: usize,
    dispatch_results: Vec<Option<EnrichedArticle>>,
) -> Digest {
    let limit = requested.min(full_list.len());
    let summarized_articles: Vec<EnrichedArticle> = dispatch_results
        .into_iter()
        .take(limit)
        .flatten()
        .collect();

    Digest {
        total_found: full_list.len(),
        summarized_count: summarized_articles.len(),
        summarized_articles,
        full_article_list: full_list,
    }
}

/// Enrich the first `requested` articles of `full_list` and assemble the digest.
///
/// An empty list short-circuits without touching the enricher.
pub async fn build_digest(
    full_list: Vec<Article>,
    requested: usize,
    enricher: Arc<dyn Enricher>,
    limits: DispatchLimits,
) -> Digest {
    if full_list.is_empty() {
        info!("No recent articles found; returning an empty digest");
        return Digest::default();
    }

    let selected = select_for_enrichment(&full_list, requested).to_vec();
    info!(
        "Enriching {} of {} recent articles with {} workers",
        selected.len(),
        full_list.len(),
        limits.workers
    );
    let results = dispatch(selected, enricher, limits).await;

    let digest = assemble(full_list, requested, results);
    info!(
        "Digest complete: {} found, {} summarized",
        digest.total_found, digest.summarized_count
    );
    digest
}
