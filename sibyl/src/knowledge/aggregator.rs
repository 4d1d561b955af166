//! Deadline-bounded fan-out across knowledge sources

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Knowledge, KnowledgeSource};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Budget for the fan-out; providers still running when it elapses are
    /// cancelled and their partial results discarded.
    pub deadline: Duration,

    /// Maximum simultaneous aggregations system-wide, protecting upstream
    /// quota.
    pub max_concurrent: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(8),
            max_concurrent: 5,
        }
    }
}

/// Runs the curated and encyclopedic lookups concurrently under a shared
/// deadline and picks the best available result.
///
/// Selection prefers the curated source whenever it returned anything
/// (curated data is fast and zero-cost); provider errors are logged and
/// treated exactly like empty results. A caller never sees a
/// knowledge-source failure.
pub struct KnowledgeAggregator {
    curated: Arc<dyn KnowledgeSource>,
    reference: Arc<dyn KnowledgeSource>,
    gate: Arc<Semaphore>,
    config: AggregatorConfig,
}

impl KnowledgeAggregator {
    pub fn new(
        curated: Arc<dyn KnowledgeSource>,
        reference: Arc<dyn KnowledgeSource>,
        config: AggregatorConfig,
    ) -> Self {
        let gate = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            curated,
            reference,
            gate,
            config,
        }
    }

    /// Retrieve knowledge for the query. Always returns within roughly the
    /// configured deadline (plus scheduling slack); never fails.
    pub async fn retrieve(&self, query: &str) -> Knowledge {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            // Closed semaphore only happens at shutdown
            Err(_) => return Knowledge::default(),
        };

        let mut curated_task = spawn_lookup(&self.curated, query);
        let mut reference_task = spawn_lookup(&self.reference, query);

        let sleep = tokio::time::sleep(self.config.deadline);
        tokio::pin!(sleep);

        let mut curated_result: Option<Knowledge> = None;
        let mut reference_result: Option<Knowledge> = None;

        // Wait for both branches or the deadline, whichever comes first.
        while curated_result.is_none() || reference_result.is_none() {
            tokio::select! {
                joined = &mut curated_task, if curated_result.is_none() => {
                    curated_result = Some(settle("curated", joined));
                }
                joined = &mut reference_task, if reference_result.is_none() => {
                    reference_result = Some(settle("reference", joined));
                }
                _ = &mut sleep => {
                    debug!("knowledge fan-out hit its {}s deadline", self.config.deadline.as_secs());
                    break;
                }
            }
        }

        // Stragglers keep running in the background until the abort lands;
        // their results are discarded, not awaited.
        curated_task.abort();
        reference_task.abort();

        let curated = curated_result.unwrap_or_default();
        let reference = reference_result.unwrap_or_default();

        if !curated.is_empty() {
            curated
        } else if !reference.is_empty() {
            reference
        } else {
            Knowledge::default()
        }
    }
}

fn spawn_lookup(
    source: &Arc<dyn KnowledgeSource>,
    query: &str,
) -> JoinHandle<crate::error::Result<Knowledge>> {
    let source = source.clone();
    let query = query.to_string();
    tokio::spawn(async move { source.lookup(&query).await })
}

/// Collapse a joined lookup into a result, swallowing errors.
fn settle(
    label: &str,
    joined: std::result::Result<crate::error::Result<Knowledge>, tokio::task::JoinError>,
) -> Knowledge {
    match joined {
        Ok(Ok(knowledge)) => knowledge,
        Ok(Err(err)) => {
            warn!("{} knowledge source failed: {}", label, err);
            Knowledge::default()
        }
        Err(err) => {
            warn!("{} knowledge task aborted: {}", label, err);
            Knowledge::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SibylError};
    use async_trait::async_trait;
    use std::time::Instant;

    struct FixedSource {
        result: Knowledge,
        delay: Duration,
    }

    impl FixedSource {
        fn instant(result: Knowledge) -> Arc<Self> {
            Arc::new(Self {
                result,
                delay: Duration::ZERO,
            })
        }

        fn slow(result: Knowledge, delay: Duration) -> Arc<Self> {
            Arc::new(Self { result, delay })
        }
    }

    #[async_trait]
    impl KnowledgeSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn lookup(&self, _query: &str) -> Result<Knowledge> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.result.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl KnowledgeSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn lookup(&self, _query: &str) -> Result<Knowledge> {
            Err(SibylError::Retrieval("boom".to_string()))
        }
    }

    fn config(deadline_ms: u64) -> AggregatorConfig {
        AggregatorConfig {
            deadline: Duration::from_millis(deadline_ms),
            max_concurrent: 5,
        }
    }

    #[tokio::test]
    async fn test_curated_wins_when_both_return() {
        let aggregator = KnowledgeAggregator::new(
            FixedSource::instant(Knowledge::new("Curated", "curated text")),
            FixedSource::instant(Knowledge::new("Reference", "reference text")),
            config(1000),
        );

        let result = aggregator.retrieve("anything").await;
        assert_eq!(result.title, "Curated");
    }

    #[tokio::test]
    async fn test_reference_used_when_curated_empty() {
        let aggregator = KnowledgeAggregator::new(
            FixedSource::instant(Knowledge::default()),
            FixedSource::instant(Knowledge::new("Reference", "reference text")),
            config(1000),
        );

        let result = aggregator.retrieve("anything").await;
        assert_eq!(result.title, "Reference");
    }

    #[tokio::test]
    async fn test_straggler_cancelled_at_deadline() {
        let aggregator = KnowledgeAggregator::new(
            FixedSource::slow(
                Knowledge::new("Curated", "late text"),
                Duration::from_secs(30),
            ),
            FixedSource::instant(Knowledge::new("Reference", "reference text")),
            config(150),
        );

        let start = Instant::now();
        let result = aggregator.retrieve("anything").await;
        let elapsed = start.elapsed();

        // Fast provider's result survives; the call returns at the deadline
        // plus small scheduling slack, not after the straggler.
        assert_eq!(result.title, "Reference");
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_both_stragglers_yield_empty() {
        let slow = Knowledge::new("Slow", "slow text");
        let aggregator = KnowledgeAggregator::new(
            FixedSource::slow(slow.clone(), Duration::from_secs(30)),
            FixedSource::slow(slow, Duration::from_secs(30)),
            config(100),
        );

        let result = aggregator.retrieve("anything").await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_treated_as_empty() {
        let aggregator = KnowledgeAggregator::new(
            Arc::new(FailingSource),
            FixedSource::instant(Knowledge::new("Reference", "reference text")),
            config(1000),
        );

        let result = aggregator.retrieve("anything").await;
        assert_eq!(result.title, "Reference");
    }

    #[tokio::test]
    async fn test_both_empty() {
        let aggregator = KnowledgeAggregator::new(
            FixedSource::instant(Knowledge::default()),
            FixedSource::instant(Knowledge::default()),
            config(1000),
        );

        assert!(aggregator.retrieve("anything").await.is_empty());
    }
}
