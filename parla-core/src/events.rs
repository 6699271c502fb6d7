//! Event types exchanged between the recognition backend, the dictation
//! controller, and UI-layer subscribers.
//!
//! ## Streams
//!
//! | Event | Direction |
//! |-------|-----------|
//! | `RecognizerEvent` | backend → controller (mpsc push) |
//! | `UtteranceCommit` | controller → subscribers (broadcast) |
//! | `ControllerStatusEvent` | controller → subscribers (broadcast) |
//! | `SynthesisEvent` | synthesizer → assistant (mpsc push) |
//!
//! All types use camelCase field names so JSON consumers (web views,
//! debug tooling) see the same shape the browser speech APIs produce.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recognizer events
// ---------------------------------------------------------------------------

/// A single recognition hypothesis inside a backend result event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    /// Recognized text for this result slot.
    pub transcript: String,
    /// `true` once the recognizer has committed this slot; final results
    /// never change afterwards, non-final ones are revised in place.
    pub is_final: bool,
    /// Recognizer confidence in [0.0, 1.0], if reported.
    pub confidence: Option<f32>,
}

impl RecognitionResult {
    /// A committed result slot.
    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
            confidence: None,
        }
    }

    /// A revisable interim result slot.
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
            confidence: None,
        }
    }
}

/// Error classes a recognition backend may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognizerErrorKind {
    /// The user was simply quiet. Expected noise, not a failure.
    NoSpeech,
    /// A recoverable hiccup (e.g. a network blip). Retried once.
    Transient,
    /// Anything else. Ends the session.
    Fatal,
}

/// Push events delivered by a `SpeechRecognizer` backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecognizerEvent {
    /// New or revised results. `result_index` is the position of the first
    /// carried result in the backend's monotonically growing result list.
    #[serde(rename_all = "camelCase")]
    Result {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// The backend closed its stream on its own (platform-imposed limit).
    /// The controller restarts it transparently while listening.
    StreamEnded,
    /// Backend error report.
    #[serde(rename_all = "camelCase")]
    Error {
        kind: RecognizerErrorKind,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Controller events
// ---------------------------------------------------------------------------

/// Lifecycle state of the dictation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerStatus {
    /// No session active. Ready to start.
    Idle,
    /// Microphone open, merging recognition events.
    Listening,
    /// Silence detected; committing the utterance. Transient.
    Finalizing,
}

/// Emitted on the status broadcast whenever the controller changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatusEvent {
    pub status: ControllerStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Emitted exactly once per auto-committed utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceCommit {
    /// Monotonically increasing commit sequence number.
    pub seq: u64,
    /// The merged transcript, frozen at the last recognition event.
    pub transcript: String,
}

// ---------------------------------------------------------------------------
// Synthesis events
// ---------------------------------------------------------------------------

/// Push events delivered by a `SpeechSynthesizer` backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SynthesisEvent {
    /// Audio playback began.
    Started,
    /// Playback finished normally.
    Finished,
    /// Playback failed. Independent of listening state.
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Visible assistant state
// ---------------------------------------------------------------------------

/// The only fields a rendering layer needs from the assistant core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSnapshot {
    pub transcript: String,
    pub is_listening: bool,
    pub is_speaking: bool,
    pub error: Option<String>,
}
