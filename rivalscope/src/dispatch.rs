use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::models::{Article, EnrichedArticle};
use crate::processing::Enricher;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

/// Worker pool bounds for one dispatch run
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Maximum number of enrichments in flight
    pub workers: usize,
    /// Budget for one enrichment, counted from the moment it gets a worker slot
    pub task_timeout: Duration,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Enrich `articles` on a bounded pool of tasks.
///
/// The output has one slot per input, in input order. A slot is `None` when that article's
/// enrichment failed, timed out or panicked; other slots are unaffected. Returns once every
/// task has finished.
pub async fn dispatch(
    articles: Vec<Article>,
    enricher: Arc<dyn Enricher>,
    limits: DispatchLimits,
) -> Vec<Option<EnrichedArticle>> {
    let semaphore = Arc::new(Semaphore::new(limits.workers.max(1)));

    let handles: Vec<_> = articles
        .into_iter()
        .map(|article| {
            let link = article.link.clone();
            let semaphore = semaphore.clone();
            let enricher = enricher.clone();
            let task_timeout = limits.task_timeout;

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails if that changes.
                let _permit = semaphore.acquire_owned().await.ok()?;

                match tokio::time::timeout(task_timeout, enricher.enrich(&article)).await {
                    Ok(Ok(enriched)) => Some(enriched),
                    Ok(Err(e)) => {
                        warn!("Failed to process article {}: {}", article.link, e);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "Processing article {} timed out after {:?}",
                            article.link, task_timeout
                        );
                        None
                    }
                }
            });
            (link, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (link, handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => {
                error!(%join_err, "enrichment task for {} aborted", link);
                results.push(None);
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;
    use crate::processing::EnrichmentFailure;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(link: &str) -> Article {
        Article {
            title: link.to_uppercase(),
            link: link.to_string(),
            source: "Test".into(),
            published_at: Utc::now(),
        }
    }

    fn enriched(article: &Article) -> EnrichedArticle {
        EnrichedArticle {
            article: article.clone(),
            summary: format!("About {}.", article.link),
            impact: Impact::Medium,
        }
    }

    /// Fails, hangs or panics depending on the link; counts concurrent calls.
    #[derive(Default)]
    struct ScriptedEnricher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Enricher for ScriptedEnricher {
        async fn enrich(&self, article: &Article) -> Result<EnrichedArticle, EnrichmentFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = match article.link.as_str() {
                l if l.starts_with("fail") => Err(EnrichmentFailure::NoText),
                l if l.starts_with("hang") => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    return Err(EnrichmentFailure::NoText);
                }
                l if l.starts_with("panic") => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    panic!("enricher blew up on {}", l);
                }
                _ => Ok(enriched(article)),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn links(results: &[Option<EnrichedArticle>]) -> Vec<Option<&str>> {
        results
            .iter()
            .map(|r| r.as_ref().map(|e| e.article.link.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn failed_slot_keeps_order_of_survivors() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let input = vec![article("a"), article("fail-b"), article("c")];

        let results = dispatch(input, enricher, DispatchLimits::default()).await;

        assert_eq!(links(&results), vec![Some("a"), None, Some("c")]);
    }

    #[tokio::test]
    async fn never_exceeds_worker_count() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let input: Vec<Article> = (0..16).map(|i| article(&format!("ok-{i}"))).collect();

        let results = dispatch(input, enricher.clone(), DispatchLimits::default()).await;

        assert_eq!(results.len(), 16);
        assert!(results.iter().all(Option::is_some));
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 16);
        let peak = enricher.peak.load(Ordering::SeqCst);
        assert!(peak <= DEFAULT_WORKERS, "peak concurrency was {peak}");
        assert!(peak >= 2, "work should overlap, peak was {peak}");
    }

    #[tokio::test]
    async fn single_worker_runs_sequentially() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let input: Vec<Article> = (0..5).map(|i| article(&format!("ok-{i}"))).collect();
        let limits = DispatchLimits {
            workers: 1,
            ..Default::default()
        };

        dispatch(input, enricher.clone(), limits).await;

        assert_eq!(enricher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_and_panicking_tasks_do_not_sink_siblings() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let input = vec![
            article("a"),
            article("hang-b"),
            article("panic-c"),
            article("d"),
        ];
        let limits = DispatchLimits {
            workers: 4,
            task_timeout: Duration::from_millis(300),
        };

        let results = dispatch(input, enricher, limits).await;

        assert_eq!(links(&results), vec![Some("a"), None, None, Some("d")]);
    }

    #[tokio::test]
    async fn empty_input_spawns_nothing() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let results = dispatch(Vec::new(), enricher.clone(), DispatchLimits::default()).await;
        assert!(results.is_empty());
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    }
}
