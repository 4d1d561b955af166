//! Shared service wiring
//!
//! The caches, rate limiter, and knowledge sources are process-wide state:
//! constructed once here and injected into every session, so the sharing
//! boundary is explicit instead of hiding in globals. Session teardown
//! never touches anything owned by this struct.

use std::sync::Arc;

use crate::config::Settings;
use crate::knowledge::{
    AggregatorConfig, EncyclopediaProvider, HttpWikiBackend, KnowledgeAggregator, TopicIndex,
};
use crate::llm::{GenerationClient, GenerationConfig, HttpChatModel};

/// The shared singletons backing all sessions.
pub struct Services {
    pub topics: Arc<TopicIndex>,
    pub aggregator: Arc<KnowledgeAggregator>,
    pub generator: Arc<GenerationClient>,
}

impl Services {
    /// Wire up production services from settings.
    pub fn from_settings(settings: &Settings) -> Arc<Self> {
        let topics = Arc::new(TopicIndex::new());
        let encyclopedia = Arc::new(EncyclopediaProvider::new(Arc::new(HttpWikiBackend::new())));

        let aggregator = Arc::new(KnowledgeAggregator::new(
            topics.clone(),
            encyclopedia,
            AggregatorConfig::default(),
        ));

        let model = Arc::new(HttpChatModel::new(&settings.api_base, &settings.api_key));
        let generator = Arc::new(GenerationClient::new(
            model,
            GenerationConfig {
                model: settings.model.clone(),
                ..GenerationConfig::default()
            },
        ));

        Arc::new(Self {
            topics,
            aggregator,
            generator,
        })
    }

    /// Assemble services from parts; the seam tests use to inject mock
    /// models and backends.
    pub fn from_parts(
        topics: Arc<TopicIndex>,
        aggregator: Arc<KnowledgeAggregator>,
        generator: Arc<GenerationClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            topics,
            aggregator,
            generator,
        })
    }
}
