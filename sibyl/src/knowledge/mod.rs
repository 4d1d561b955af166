//! Knowledge retrieval for the response orchestrator
//!
//! Two providers sit behind one capability: an encyclopedic search/summary
//! provider and a curated topic table. The aggregator fans out to both
//! under a shared deadline and picks the best available result.

mod aggregator;
mod encyclopedia;
mod topics;

pub use aggregator::{AggregatorConfig, KnowledgeAggregator};
pub use encyclopedia::{EncyclopediaProvider, HttpWikiBackend, WikiBackend, WikiPage};
pub use topics::TopicIndex;

use async_trait::async_trait;

use crate::error::Result;

/// Result of a knowledge lookup. Both fields empty means nothing was found;
/// missing-but-valid queries are never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Knowledge {
    pub title: String,
    pub text: String,
}

impl Knowledge {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Whether this lookup found anything usable.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A provider that can look up a topic and return (title, text).
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Short identifier used in logs and prompt wording.
    fn name(&self) -> &'static str;

    /// Look up the query. An empty [`Knowledge`] signals "nothing found";
    /// errors are reserved for provider-level failures and are absorbed by
    /// the aggregator.
    async fn lookup(&self, query: &str) -> Result<Knowledge>;
}
