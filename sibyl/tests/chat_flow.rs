//! End-to-end tests for the chat pipeline with mock upstreams

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sibyl::chat::{ChatConfig, ChatSession, RegistryConfig, SessionRegistry};
use sibyl::error::{Result, SibylError};
use sibyl::knowledge::{
    AggregatorConfig, EncyclopediaProvider, KnowledgeAggregator, TopicIndex, WikiBackend, WikiPage,
};
use sibyl::llm::{fallback_responses, ChatModel, ChatRequest, GenerationClient, GenerationConfig};
use sibyl::services::Services;

/// Model that echoes the message, counting calls and capturing preambles.
struct EchoModel {
    calls: AtomicUsize,
    last_preamble: Mutex<String>,
}

impl EchoModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_preamble: Mutex::new(String::new()),
        })
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_preamble.lock().await = request.preamble.clone();
        Ok(
            "Here is a considered answer to your question, with enough substance and detail to \
             read like a real reply from the upstream model."
                .to_string(),
        )
    }
}

/// Model that fails on every attempt.
struct BrokenModel {
    calls: AtomicUsize,
}

impl BrokenModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatModel for BrokenModel {
    async fn chat(&self, _request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SibylError::Generation("upstream down".to_string()))
    }
}

/// Wiki backend with one canned article, counting searches.
struct CannedWiki {
    searches: AtomicUsize,
}

impl CannedWiki {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            searches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WikiBackend for CannedWiki {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["Battle of Hastings".to_string()])
    }

    async fn fetch_page(&self, _title: &str) -> Result<WikiPage> {
        Ok(WikiPage::Article {
            text: "The Battle of Hastings was fought in 1066 between the Norman-French army and \
                   an English army, a turning point with consequences that shaped medieval \
                   England for generations."
                .to_string(),
        })
    }
}

/// Backend that never answers within any sensible deadline.
struct StalledWiki;

#[async_trait]
impl WikiBackend for StalledWiki {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(vec![])
    }

    async fn fetch_page(&self, _title: &str) -> Result<WikiPage> {
        Ok(WikiPage::Missing)
    }
}

/// Backend with nothing to offer.
struct EmptyWiki;

#[async_trait]
impl WikiBackend for EmptyWiki {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn fetch_page(&self, _title: &str) -> Result<WikiPage> {
        Ok(WikiPage::Missing)
    }
}

fn build_services(model: Arc<dyn ChatModel>, backend: Arc<dyn WikiBackend>) -> Arc<Services> {
    build_services_with_deadline(model, backend, Duration::from_secs(2))
}

fn build_services_with_deadline(
    model: Arc<dyn ChatModel>,
    backend: Arc<dyn WikiBackend>,
    deadline: Duration,
) -> Arc<Services> {
    let topics = Arc::new(TopicIndex::new());
    let encyclopedia = Arc::new(EncyclopediaProvider::new(backend));
    let aggregator = Arc::new(KnowledgeAggregator::new(
        topics.clone(),
        encyclopedia,
        AggregatorConfig {
            deadline,
            max_concurrent: 5,
        },
    ));
    let generator = Arc::new(GenerationClient::new(
        model,
        GenerationConfig {
            backoff: vec![Duration::ZERO, Duration::ZERO],
            ..GenerationConfig::default()
        },
    ));

    Services::from_parts(topics, aggregator, generator)
}

#[tokio::test]
async fn repeated_message_is_served_from_cache_without_second_generation() {
    let model = EchoModel::new();
    let services = build_services(model.clone(), CannedWiki::new());
    let registry = SessionRegistry::new(services);

    registry.create_session("alice").await;

    let first = registry
        .handle_message("alice", "What is  the battle of hastings?")
        .await
        .unwrap();
    let second = registry
        .handle_message("alice", "what is the Battle of Hastings?")
        .await
        .unwrap();

    // Normalization makes the two phrasings the same cache key
    assert_eq!(first, second);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);

    // Cached answers still enter the conversational record
    let history = registry.history("alice").await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn generation_failure_with_keyword_returns_configured_fallback() {
    let model = BrokenModel::new();
    let services = build_services(model.clone(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::new(services);

    registry.create_session("bob").await;

    let reply = registry
        .handle_message("bob", "tell me about sport")
        .await
        .unwrap();

    let expected = fallback_responses()
        .iter()
        .find(|(keyword, _)| *keyword == "sport")
        .map(|(_, text)| *text)
        .unwrap();

    assert_eq!(reply, expected);
    // Initial attempt plus one per backoff slot
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn generation_failure_without_keyword_degrades_to_apology() {
    let services = build_services(BrokenModel::new(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::new(services);

    registry.create_session("carol").await;

    let reply = registry
        .handle_message("carol", "xylophone acoustics in zero gravity")
        .await
        .unwrap();

    // Never a hard error, always a degraded answer
    assert!(reply.contains("trouble generating a complete response"));
}

#[tokio::test]
async fn sessions_have_isolated_response_caches_but_share_knowledge_cache() {
    let model = EchoModel::new();
    let backend = CannedWiki::new();
    let services = build_services(model.clone(), backend.clone());
    let registry = SessionRegistry::new(services);

    registry.create_session("alice").await;
    registry.create_session("bob").await;

    let question = "what is the battle of hastings";

    registry.handle_message("alice", question).await.unwrap();

    // Give bob a different history so his generation cache key differs
    registry.handle_message("bob", "hello there").await.unwrap();
    registry.handle_message("bob", question).await.unwrap();

    // Bob's session cache was empty, so his pipeline ran end to end
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);

    // The knowledge layer answered bob's repeat lookup from the shared
    // cache: one search for "hello there", one for the shared question,
    // none for asking it a second time.
    assert_eq!(backend.searches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retrieval_timeout_yields_marker_in_prompt_not_an_error() {
    let model = EchoModel::new();
    let services = build_services_with_deadline(
        model.clone(),
        Arc::new(StalledWiki),
        Duration::from_secs(60),
    );

    let config = ChatConfig {
        retrieval_timeout: Duration::from_millis(150),
        ..ChatConfig::default()
    };
    let mut session = ChatSession::with_config(services, config);

    let started = std::time::Instant::now();
    let reply = session.process_message("what is the battle of hastings").await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!reply.is_empty());

    let preamble = model.last_preamble.lock().await.clone();
    assert!(preamble.contains("did not complete in time"));
}

#[tokio::test]
async fn retrieved_knowledge_is_attributed_in_the_answer() {
    let model = EchoModel::new();
    let services = build_services(model, CannedWiki::new());
    let mut session = ChatSession::new(services);

    let reply = session.process_message("what is the battle of hastings").await;

    assert!(reply.contains("Information about Battle of Hastings was retrieved"));
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let services = build_services(EchoModel::new(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::new(services);

    let result = registry.handle_message("ghost", "hello").await;
    assert!(matches!(result, Err(SibylError::UnknownSession(_))));
}

#[tokio::test]
async fn clear_history_keeps_session_alive() {
    let services = build_services(EchoModel::new(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::new(services);

    registry.create_session("dave").await;
    registry.handle_message("dave", "hello there").await.unwrap();
    assert!(!registry.history("dave").await.unwrap().is_empty());

    registry.clear_history("dave").await.unwrap();
    assert!(registry.history("dave").await.unwrap().is_empty());
    assert_eq!(registry.session_count().await, 1);
}

#[tokio::test]
async fn idle_sessions_are_reaped() {
    let services = build_services(EchoModel::new(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::with_config(
        services,
        ChatConfig::default(),
        RegistryConfig {
            reap_interval: Duration::from_secs(3600),
            idle_timeout: Duration::from_millis(50),
        },
    );

    registry.create_session("erin").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(registry.reap_idle().await, 1);
    assert_eq!(registry.session_count().await, 0);
}

#[tokio::test]
async fn teardown_removes_only_the_named_session() {
    let services = build_services(EchoModel::new(), Arc::new(EmptyWiki));
    let registry = SessionRegistry::new(services);

    registry.create_session("alice").await;
    registry.create_session("bob").await;

    assert!(registry.teardown("alice").await);
    assert!(!registry.teardown("alice").await);
    assert_eq!(registry.session_count().await, 1);
}
