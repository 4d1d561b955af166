pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod limiter;
pub mod llm;
pub mod services;

pub use chat::{ChatConfig, ChatSession, QuestionCategory, SessionRegistry};
pub use config::Settings;
pub use error::{Result, SibylError};
pub use knowledge::{Knowledge, KnowledgeAggregator, KnowledgeSource};
pub use limiter::RateLimiter;
pub use llm::{ChatModel, GenerationClient, Turn};
pub use services::Services;
