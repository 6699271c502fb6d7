//! # parla-core
//!
//! Reusable engine for a voice-driven chat assistant. The stateful heart
//! is the dictation controller: it merges a recognition backend's
//! interim/final results into one live transcript, auto-commits the
//! utterance after a silence gap, restarts backend streams that end on
//! their own, and classifies backend errors. Around it sit stateless
//! collaborators: a responder that answers time/date/weather questions
//! locally and routes the rest to a remote chat completion, and a
//! synthesizer that speaks the replies.
//!
//! ```text
//!  SpeechRecognizer ──events──▶ DictationController ──commits──▶ VoiceAssistant
//!                                                                  │      ▲
//!                                                             history   reply
//!                                                                  ▼      │
//!                                         SpeechSynthesizer ◀── RoutedResponder
//!                                                                 ├─ LocalAnswerer (time/date/weather)
//!                                                                 └─ ChatCompletionResponder (remote)
//! ```
//!
//! Hosts bring their own backends by implementing [`SpeechRecognizer`]
//! and [`SpeechSynthesizer`]; [`ScriptedRecognizer`] and
//! [`LogSynthesizer`] ship for tests and console use.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod assistant;
pub mod chat;
pub mod controller;
pub mod error;
pub mod events;
pub mod recognizer;
pub mod session;
pub mod synthesis;

pub use assistant::{AssistantConfig, VoiceAssistant};
pub use chat::{
    ChatCompletionConfig, ChatCompletionResponder, ChatMessage, ChatReply, LocalAnswerer,
    Responder, Role, RoutedResponder,
};
pub use controller::{ControllerConfig, DictationController};
pub use error::{ParlaError, Result};
pub use events::{
    AssistantSnapshot, ControllerStatus, ControllerStatusEvent, RecognitionResult,
    RecognizerErrorKind, RecognizerEvent, SynthesisEvent, UtteranceCommit,
};
pub use recognizer::{RecognizerHandle, ScriptedRecognizer, SpeechRecognizer};
pub use synthesis::{
    LogSynthesizer, SpeakOptions, SpeakRequest, SpeechSynthesizer, SynthesizerHandle,
};
