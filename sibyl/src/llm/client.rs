//! Generation pipeline: rate limit, cache, call, retry, fall back

use std::sync::Arc;
use std::time::Duration;

use sibyl_cache::TtlCache;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, SibylError};
use crate::limiter::RateLimiter;

use super::fallback::fallback_responses;
use super::{ChatModel, ChatRequest, Turn};

/// Temperatures below this cache for a day; everything else for an hour.
/// Low-temperature outputs are near-deterministic and safe to reuse.
const DETERMINISTIC_TEMPERATURE: f64 = 0.5;
const LONG_RESPONSE_TTL: Duration = Duration::from_secs(24 * 3600);
const SHORT_RESPONSE_TTL: Duration = Duration::from_secs(3600);

const RESPONSE_CACHE_ENTRIES: usize = 500;

/// Bounded prefixes used for cache keys; distinct long inputs may alias,
/// an accepted imprecision.
const KEY_MESSAGE_CHARS: usize = 50;
const KEY_HISTORY_TURNS: usize = 3;
const KEY_HISTORY_CHARS: usize = 20;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,

    /// Budget for a single upstream call
    pub call_timeout: Duration,

    /// Sleep between failed attempts; its length is the retry budget.
    /// Distinct from the rate limiter's wait.
    pub backoff: Vec<Duration>,

    /// Tokens granted per refill period
    pub rate: f64,

    /// Refill period in seconds
    pub period: f64,

    /// Rate-limiter burst capacity
    pub burst: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "command".to_string(),
            temperature: 0.6,
            max_tokens: 1024,
            call_timeout: Duration::from_secs(15),
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            rate: 20.0,
            period: 60.0,
            burst: 30.0,
        }
    }
}

/// Wraps the upstream model with rate limiting, response caching,
/// retry/backoff, and topic-keyed fallback text.
///
/// `respond` fails only after exhausting every retry and finding no
/// fallback keyword in the message.
pub struct GenerationClient {
    model: Arc<dyn ChatModel>,
    limiter: RateLimiter,
    cache: TtlCache<String>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Self {
        let limiter = RateLimiter::new(config.rate, config.period, config.burst);
        Self {
            model,
            limiter,
            cache: TtlCache::bounded(SHORT_RESPONSE_TTL, RESPONSE_CACHE_ENTRIES),
            config,
        }
    }

    /// Generate a reply to `message` given recent history and an
    /// instruction preamble.
    pub async fn respond(&self, message: &str, history: &[Turn], preamble: &str) -> Result<String> {
        // Bigger requests consume more upstream quota
        let cost = request_cost(message, history);

        let wait = self.limiter.acquire(cost).await;
        if wait > Duration::ZERO {
            debug!("rate limited, sleeping {:.2}s", wait.as_secs_f64());
            // Sleep once and proceed; admission is not re-checked
            tokio::time::sleep(wait).await;
        }

        let cache_key = self.cache_key(message, history);
        if let Some(cached) = self.cache.get(&cache_key).await {
            info!("generation cache hit");
            return Ok(cached);
        }

        let request = ChatRequest {
            message: message.to_string(),
            history: history.to_vec(),
            preamble: preamble.to_string(),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut last_error = String::new();

        for attempt in 0..=self.config.backoff.len() {
            match timeout(self.config.call_timeout, self.model.chat(&request)).await {
                Ok(Ok(text)) => {
                    let ttl = if self.config.temperature < DETERMINISTIC_TEMPERATURE {
                        LONG_RESPONSE_TTL
                    } else {
                        SHORT_RESPONSE_TTL
                    };
                    self.cache
                        .set_with_ttl(cache_key.clone(), text.clone(), ttl)
                        .await;
                    return Ok(text);
                }
                Ok(Err(err)) => {
                    last_error = err.to_string();
                }
                Err(_) => {
                    last_error = format!(
                        "upstream call timed out after {}s",
                        self.config.call_timeout.as_secs()
                    );
                }
            }

            if let Some(backoff) = self.config.backoff.get(attempt) {
                warn!(
                    "generation attempt {} failed ({}), retrying in {:.0}s",
                    attempt + 1,
                    last_error,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(*backoff).await;
            }
        }

        warn!("all generation attempts failed: {}", last_error);

        if let Some(text) = keyword_fallback(message) {
            info!("serving topic fallback text");
            return Ok(text.to_string());
        }

        Err(SibylError::Generation(last_error))
    }

    fn cache_key(&self, message: &str, history: &[Turn]) -> String {
        let message_prefix: String = message.chars().take(KEY_MESSAGE_CHARS).collect();

        let mut history_summary = String::new();
        let start = history.len().saturating_sub(KEY_HISTORY_TURNS);
        for turn in &history[start..] {
            let content_prefix: String = turn.content.chars().take(KEY_HISTORY_CHARS).collect();
            history_summary.push_str(turn.role.as_str());
            history_summary.push(':');
            history_summary.push_str(&content_prefix);
            history_summary.push(';');
        }

        format!(
            "chat:{}|{}|{}|{:.2}",
            message_prefix, history_summary, self.config.model, self.config.temperature
        )
    }
}

/// Request cost in limiter tokens, scaled by message and history size.
fn request_cost(message: &str, history: &[Turn]) -> f64 {
    let message_tokens = 1 + message.len() / 500;
    let history_chars: usize = history.iter().map(|turn| turn.content.len()).sum();
    let history_tokens = history_chars / 1000;
    (message_tokens + history_tokens) as f64
}

/// Scan the static fallback table for a keyword contained in the message.
fn keyword_fallback(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    for (keyword, text) in fallback_responses().iter().copied() {
        if lowered.contains(keyword) {
            return Some(text);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn succeeding(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, _request: &ChatRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(SibylError::Generation("scripted failure".to_string())),
            }
        }
    }

    fn fast_config() -> GenerationConfig {
        GenerationConfig {
            backoff: vec![Duration::ZERO, Duration::ZERO],
            ..GenerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_response_is_cached() {
        let model = ScriptedModel::succeeding("an answer");
        let client = GenerationClient::new(model.clone(), fast_config());

        let first = client.respond("question", &[], "preamble").await.unwrap();
        let second = client.respond("question", &[], "preamble").await.unwrap();

        assert_eq!(first, "an answer");
        assert_eq!(second, "an answer");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_keyword_fallback() {
        let model = ScriptedModel::failing();
        let client = GenerationClient::new(model.clone(), fast_config());

        let reply = client
            .respond("tell me about sport", &[], "preamble")
            .await
            .unwrap();

        // One initial attempt plus one per backoff slot
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        let expected = fallback_responses()
            .iter()
            .find(|(k, _)| *k == "sport")
            .unwrap()
            .1;
        assert_eq!(reply, expected);
    }

    #[tokio::test]
    async fn test_exhaustion_without_keyword_fails() {
        let model = ScriptedModel::failing();
        let client = GenerationClient::new(model, fast_config());

        let result = client.respond("zebra trivia", &[], "preamble").await;
        assert!(matches!(result, Err(SibylError::Generation(_))));
    }

    #[tokio::test]
    async fn test_cache_key_uses_bounded_prefixes() {
        let client = GenerationClient::new(
            ScriptedModel::succeeding("x"),
            GenerationConfig::default(),
        );

        let long_a = format!("{}{}", "a".repeat(50), "tail one");
        let long_b = format!("{}{}", "a".repeat(50), "tail two");

        // Same 50-char prefix aliases to the same key by design
        assert_eq!(client.cache_key(&long_a, &[]), client.cache_key(&long_b, &[]));
    }

    #[tokio::test]
    async fn test_cache_key_includes_recent_history() {
        let client = GenerationClient::new(
            ScriptedModel::succeeding("x"),
            GenerationConfig::default(),
        );

        let without = client.cache_key("question", &[]);
        let with = client.cache_key("question", &[Turn::user("earlier context")]);
        assert_ne!(without, with);
    }

    #[test]
    fn test_request_cost_scales_with_size() {
        assert_eq!(request_cost("short", &[]), 1.0);

        let long_message = "m".repeat(1200);
        assert_eq!(request_cost(&long_message, &[]), 3.0);

        let history = vec![Turn::user("h".repeat(2500))];
        assert_eq!(request_cost("short", &history), 3.0);
    }

    #[test]
    fn test_keyword_fallback_lookup() {
        assert!(keyword_fallback("any sport news?").is_some());
        assert!(keyword_fallback("quantum stuff").is_none());
    }
}
