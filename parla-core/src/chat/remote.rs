//! Remote chat completion over an OpenAI-compatible endpoint.
//!
//! The request carries the full conversation history with a system
//! prompt prepended; a failure of any kind (network, HTTP status,
//! missing choices) falls back to a fixed apology while the cause is
//! preserved in `ChatReply::error`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::{ChatMessage, ChatReply, Responder, Role};
use crate::error::{ParlaError, Result};

const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "mistral-7b-instruct";
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, concise, and friendly assistant. Always provide brief, accurate answers.";

/// Spoken when the completion endpoint cannot be reached.
pub const FALLBACK_REPLY: &str = "I apologize, but I'm having trouble connecting to my \
     knowledge base right now. Please try again later.";

/// Configuration for `ChatCompletionResponder`.
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl ChatCompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Prepend `prompt` as a system message unless the history already
/// carries one.
fn with_system_prompt(history: &[ChatMessage], prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !history.iter().any(|m| m.role == Role::System) {
        messages.push(ChatMessage::system(prompt));
    }
    messages.extend_from_slice(history);
    messages
}

/// Responder backed by a remote OpenAI-compatible completion endpoint.
pub struct ChatCompletionResponder {
    config: ChatCompletionConfig,
    client: reqwest::Client,
}

impl ChatCompletionResponder {
    pub fn new(config: ChatCompletionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: with_system_prompt(history, &self.config.system_prompt),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response: CompletionResponse = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ParlaError::ChatCompletion("completion had no choices".into()))
    }
}

#[async_trait]
impl Responder for ChatCompletionResponder {
    async fn respond(&self, history: &[ChatMessage]) -> ChatReply {
        match self.complete(history).await {
            Ok(content) => {
                debug!(chars = content.len(), "chat completion succeeded");
                ChatReply::answer(content)
            }
            Err(e) => {
                warn!(error = %e, "chat completion failed");
                ChatReply::failed(FALLBACK_REPLY, e.to_string())
            }
        }
    }
}
