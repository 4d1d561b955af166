//! Error types for the Sibyl services
//!
//! The propagation policy is deliberately lopsided: knowledge sources and
//! caches never surface errors to callers (they degrade to empty results),
//! so most variants here travel only between internal layers. Only
//! generation failure after exhausted retries reaches the orchestrator,
//! which converts it into a degraded answer rather than a user-visible
//! error.

use thiserror::Error;

/// Main error type for Sibyl operations
#[derive(Error, Debug)]
pub enum SibylError {
    /// Knowledge source failure; always absorbed by the aggregator
    #[error("Knowledge retrieval error: {0}")]
    Retrieval(String),

    /// Generative upstream failure after retries were exhausted
    #[error("Generation error: {0}")]
    Generation(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out after {timeout_seconds}s: {context}")]
    Timeout {
        timeout_seconds: u64,
        context: String,
    },

    /// Authentication failure at the transport boundary
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Message addressed to a session the registry does not know
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Sibyl operations
pub type Result<T> = std::result::Result<T, SibylError>;

impl From<reqwest::Error> for SibylError {
    fn from(err: reqwest::Error) -> Self {
        SibylError::Retrieval(err.to_string())
    }
}
