//! Per-session conversation pipeline
//!
//! Drives a message end to end: response-cache check, concurrent knowledge
//! retrieval and question classification, preamble construction, generation
//! with retries, fallback synthesis, post-processing, and history/cache
//! updates. A session never surfaces an error to the user; every failure
//! path degrades to some answer.

use std::sync::Arc;
use std::time::Duration;

use sibyl_cache::TtlCache;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::knowledge::Knowledge;
use crate::llm::Turn;
use crate::services::Services;

use super::classify::QuestionCategory;

/// Attribution is only appended to answers of substance
const ATTRIBUTION_MIN_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Internal budget for the knowledge fan-out is carried by the
    /// aggregator; this outer timeout bounds the whole retrieval step.
    /// When it fires the session proceeds with a "timed out" marker used
    /// only for prompt wording.
    pub retrieval_timeout: Duration,

    /// How many trailing turns are sent as generation context. Full
    /// history is retained for display regardless.
    pub history_window: usize,

    /// Capacity of the per-session response cache
    pub cache_entries: usize,

    /// Default TTL of the per-session response cache; category selection
    /// may extend individual entries.
    pub response_ttl: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            retrieval_timeout: Duration::from_secs(10),
            history_window: 6,
            cache_entries: 256,
            response_ttl: Duration::from_secs(3600),
        }
    }
}

/// What the retrieval step produced, distinguishing "nothing found" from
/// "did not finish in time" for prompt wording only.
enum KnowledgeOutcome {
    Found(Knowledge),
    Empty,
    TimedOut,
}

impl KnowledgeOutcome {
    fn knowledge(&self) -> Option<&Knowledge> {
        match self {
            KnowledgeOutcome::Found(knowledge) => Some(knowledge),
            _ => None,
        }
    }
}

/// One client's conversation state plus the shared services.
pub struct ChatSession {
    services: Arc<Services>,
    config: ChatConfig,
    history: Vec<Turn>,
    response_cache: TtlCache<String>,
}

impl ChatSession {
    pub fn new(services: Arc<Services>) -> Self {
        Self::with_config(services, ChatConfig::default())
    }

    pub fn with_config(services: Arc<Services>, config: ChatConfig) -> Self {
        let response_cache = TtlCache::bounded(config.response_ttl, config.cache_entries);
        Self {
            services,
            config,
            history: Vec::new(),
            response_cache,
        }
    }

    /// Process one message and produce the reply. Infallible from the
    /// caller's perspective: every internal failure becomes degraded text.
    pub async fn process_message(&mut self, message: &str) -> String {
        info!("processing message ({} chars)", message.len());

        let normalized = normalize_message(message);

        if let Some(cached) = self.response_cache.get(&normalized).await {
            info!("session cache hit");
            // Cached answers remain part of the conversational record
            self.push_exchange(message, &cached);
            return cached;
        }

        let context: Vec<Turn> = self.recent_history();

        // Launch retrieval, then classify while it runs
        let aggregator = self.services.aggregator.clone();
        let query = normalized.clone();
        let mut retrieval = tokio::spawn(async move { aggregator.retrieve(&query).await });

        let category = QuestionCategory::classify(&normalized);
        debug!("question classified as {}", category.as_str());

        let outcome = match timeout(self.config.retrieval_timeout, &mut retrieval).await {
            Ok(Ok(knowledge)) if !knowledge.is_empty() => KnowledgeOutcome::Found(knowledge),
            Ok(_) => KnowledgeOutcome::Empty,
            Err(_) => {
                warn!("knowledge retrieval timed out, proceeding with generation");
                retrieval.abort();
                KnowledgeOutcome::TimedOut
            }
        };

        let preamble = build_preamble(category, &outcome);

        let reply = match self
            .services
            .generator
            .respond(message, &context, &preamble)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!("generation failed, synthesizing fallback: {}", err);
                self.fallback_reply(message, &normalized, &outcome)
            }
        };

        let finalized = post_process(reply, &outcome);

        self.push_exchange(message, &finalized);
        self.response_cache
            .set_with_ttl(normalized, finalized.clone(), category.response_ttl())
            .await;

        finalized
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        // The response cache stays; it may serve other questions later
        self.history.clear();
    }

    fn recent_history(&self) -> Vec<Turn> {
        let start = self.history.len().saturating_sub(self.config.history_window);
        self.history[start..].to_vec()
    }

    fn push_exchange(&mut self, message: &str, reply: &str) {
        self.history.push(Turn::user(message));
        self.history.push(Turn::assistant(reply));
    }

    /// Compose a reply without the generative model: retrieved knowledge if
    /// any, else a curated topic scan, else a generic apology naming the
    /// best-guess topic.
    fn fallback_reply(
        &self,
        message: &str,
        normalized: &str,
        outcome: &KnowledgeOutcome,
    ) -> String {
        if let Some(knowledge) = outcome.knowledge() {
            return format!(
                "Based on what I found about {}: {}\n\nThis should help answer your question about {}.",
                knowledge.title,
                knowledge.text,
                message.trim()
            );
        }

        if let Some((_, overview)) = self.services.topics.keyword_match(normalized) {
            return overview.to_string();
        }

        "I'm sorry, but I'm having trouble generating a complete response right now. \
         The topic appears to be about something I don't have specific information on. \
         Could you try rephrasing your question or asking about something else?"
            .to_string()
    }
}

/// Normalize a message for use as a session cache key: lowercase, drop
/// punctuation except question marks, collapse whitespace.
pub fn normalize_message(message: &str) -> String {
    let lowered = message.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace() || *c == '?')
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_preamble(category: QuestionCategory, outcome: &KnowledgeOutcome) -> String {
    let mut preamble = format!(
        "You are an intelligent and helpful AI assistant. {} ",
        category.guidance()
    );

    match outcome {
        KnowledgeOutcome::Found(knowledge) => {
            preamble.push_str(&format!(
                "\n\nRetrieved information about {}: {}\n\nUse this information to help answer \
                 the question, but also draw on your general knowledge to provide a complete \
                 response. If the information doesn't fully address the question, be honest \
                 about what you know and don't know.",
                knowledge.title, knowledge.text
            ));
        }
        KnowledgeOutcome::Empty => {
            preamble.push_str(
                "\n\nAnswer based on your general knowledge. If you don't know the specific \
                 answer, be honest about it and provide related information that might be \
                 helpful.",
            );
        }
        KnowledgeOutcome::TimedOut => {
            preamble.push_str(
                "\n\nThe knowledge lookup did not complete in time. Answer from your general \
                 knowledge and be upfront when you are unsure.",
            );
        }
    }

    preamble
}

/// Append a source attribution when retrieved knowledge was used, the
/// answer is substantial, and the source isn't already mentioned.
fn post_process(reply: String, outcome: &KnowledgeOutcome) -> String {
    if reply.is_empty() {
        return "I apologize, but I couldn't generate a response. Please try asking again."
            .to_string();
    }

    if let Some(knowledge) = outcome.knowledge() {
        if !knowledge.title.is_empty()
            && reply.chars().count() > ATTRIBUTION_MIN_LEN
            && !reply
                .to_lowercase()
                .contains(&knowledge.title.to_lowercase())
        {
            return format!(
                "{}\n\nInformation about {} was retrieved from reference sources.",
                reply, knowledge.title
            );
        }
    }

    reply
}
