//! HTTP implementation of [`ChatModel`] against a chat-completion API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SibylError};

use super::{ChatModel, ChatRequest};

/// Client for a Cohere-style chat endpoint: bearer-key auth, message plus
/// prior turns plus a preamble in one JSON body.
pub struct HttpChatModel {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatModel {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    message: &'a str,
    chat_history: Vec<HistoryItem<'a>>,
    preamble: &'a str,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct HistoryItem<'a> {
    role: &'static str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let payload = ChatPayload {
            model: &request.model,
            message: &request.message,
            chat_history: request
                .history
                .iter()
                .map(|turn| HistoryItem {
                    role: turn.role.as_upstream(),
                    message: &turn.content,
                })
                .collect(),
            preamble: &request.preamble,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("sending chat request to model {}", request.model);

        let response = self
            .http
            .post(format!("{}/v1/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| SibylError::Generation(err.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|err| SibylError::Generation(err.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| SibylError::Generation(err.to_string()))?;

        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Turn;

    #[test]
    fn test_payload_shape() {
        let request = ChatRequest {
            message: "hello".to_string(),
            history: vec![Turn::user("hi"), Turn::assistant("hello there")],
            preamble: "be brief".to_string(),
            model: "command".to_string(),
            temperature: 0.6,
            max_tokens: 512,
        };

        let payload = ChatPayload {
            model: &request.model,
            message: &request.message,
            chat_history: request
                .history
                .iter()
                .map(|turn| HistoryItem {
                    role: turn.role.as_upstream(),
                    message: &turn.content,
                })
                .collect(),
            preamble: &request.preamble,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_history"][0]["role"], "USER");
        assert_eq!(json["chat_history"][1]["role"], "CHATBOT");
        assert_eq!(json["preamble"], "be brief");
    }
}
