//! Conversation types and the `Responder` seam.
//!
//! The assistant hands a committed utterance (plus conversation history)
//! to a `Responder` and gets back a `ChatReply`. Responders never return
//! `Err` across this boundary: a failed lookup or connection produces a
//! reply whose `content` is a user-facing fallback sentence and whose
//! `error` field carries the underlying cause for the UI layer.

pub mod local;
pub mod providers;
pub mod remote;
pub mod router;

pub use local::LocalAnswerer;
pub use remote::{ChatCompletionConfig, ChatCompletionResponder};
pub use router::RoutedResponder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
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

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// The responder's answer. `content` is always speakable text; when the
/// responder fell back after a failure, `error` names the cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    pub error: Option<String>,
}

impl ChatReply {
    /// A successful answer.
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    /// A fallback answer produced after a failure.
    pub fn failed(content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: Some(error.into()),
        }
    }
}

/// Produces a reply to the newest user message in `history`.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, history: &[ChatMessage]) -> ChatReply;
}
