//! Generative model client: rate-limited, cached, retried, with
//! topic-keyed fallback text.

mod client;
mod fallback;
mod upstream;

pub use client::{GenerationClient, GenerationConfig};
pub use fallback::fallback_responses;
pub use upstream::HttpChatModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Role name in the upstream chat API's vocabulary
    pub fn as_upstream(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "CHATBOT",
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single generation request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Turn>,
    pub preamble: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// The upstream generative model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String>;
}
