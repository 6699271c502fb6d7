//! Keyword routing between local answers and the remote responder.
//!
//! Time, date, and weather questions are answered locally; everything
//! else goes to the configured remote `Responder`. Classification is a
//! case-insensitive keyword scan over the newest user message.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chat::local::LocalAnswerer;
use crate::chat::{ChatMessage, ChatReply, Responder, Role};

const NO_MESSAGE_REPLY: &str =
    "I'm sorry, I couldn't understand your message. Could you try again?";

/// Which locally answerable topics a message asks about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalTopics {
    pub time: bool,
    pub date: bool,
    pub weather: bool,
}

impl LocalTopics {
    pub fn any(&self) -> bool {
        self.time || self.date || self.weather
    }

    pub fn all() -> Self {
        Self {
            time: true,
            date: true,
            weather: true,
        }
    }

    pub fn weather_only() -> Self {
        Self {
            weather: true,
            ..Self::default()
        }
    }
}

/// Scan `message` for locally answerable topics. Returns `None` when the
/// message needs the remote responder.
pub fn classify(message: &str) -> Option<LocalTopics> {
    let lower = message.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    // "tell me everything" asks for the full local briefing.
    if has("everything") {
        return Some(LocalTopics::all());
    }

    let topics = LocalTopics {
        time: has("time"),
        date: has("date") || has("day"),
        weather: has("weather") || has("temperature"),
    };
    topics.any().then_some(topics)
}

/// Responder that answers time/date/weather locally and delegates the
/// rest to `remote`.
pub struct RoutedResponder {
    local: LocalAnswerer,
    remote: Arc<dyn Responder>,
}

impl RoutedResponder {
    pub fn new(local: LocalAnswerer, remote: Arc<dyn Responder>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl Responder for RoutedResponder {
    async fn respond(&self, history: &[ChatMessage]) -> ChatReply {
        let Some(message) = history.iter().rev().find(|m| m.role == Role::User) else {
            return ChatReply::failed(NO_MESSAGE_REPLY, "history contains no user message");
        };

        match classify(&message.content) {
            Some(topics) => {
                debug!(?topics, "answering locally");
                ChatReply::answer(self.local.answer(topics).await)
            }
            None => {
                debug!("delegating to remote responder");
                self.remote.respond(history).await
            }
        }
    }
}
