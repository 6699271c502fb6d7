//! Speech synthesis backend abstraction.
//!
//! Synthesis is independent of dictation: a failing synthesizer surfaces
//! an error alongside the conversation but never touches listening state.
//! Backends push `SynthesisEvent::{Started, Finished, Error}` through a
//! sink, the same pattern the recognizer uses.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::Result;
use crate::events::SynthesisEvent;

/// Push channel a synthesizer uses to report playback progress.
pub type SynthesisSink = mpsc::UnboundedSender<SynthesisEvent>;

/// Voice shaping options for a spoken reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeakOptions {
    /// Playback rate multiplier. 1.0 is natural speed.
    pub rate: f32,
    /// Pitch multiplier. 1.0 is the voice's natural pitch.
    pub pitch: f32,
    /// Preferred voice name, if the backend offers a choice.
    pub voice: Option<String>,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            voice: None,
        }
    }
}

/// One utterance to speak.
#[derive(Debug, Clone)]
pub struct SpeakRequest {
    pub text: String,
    pub options: SpeakOptions,
}

/// Contract for speech synthesis backends.
pub trait SpeechSynthesizer: Send + 'static {
    /// Capability probe.
    fn is_available(&self) -> bool {
        true
    }

    /// Speak `request.text`, cancelling any utterance already playing.
    /// Progress flows through `sink`.
    ///
    /// # Errors
    /// Returns an error if playback cannot even be queued.
    fn speak(&mut self, request: SpeakRequest, sink: SynthesisSink) -> Result<()>;

    /// Cancel any ongoing playback. Idempotent.
    fn cancel(&mut self) -> Result<()>;
}

/// Thread-safe reference-counted handle to any `SpeechSynthesizer`.
#[derive(Clone)]
pub struct SynthesizerHandle(pub Arc<Mutex<dyn SpeechSynthesizer>>);

impl SynthesizerHandle {
    pub fn new<S: SpeechSynthesizer>(synthesizer: S) -> Self {
        Self(Arc::new(Mutex::new(synthesizer)))
    }
}

impl std::fmt::Debug for SynthesizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizerHandle").finish_non_exhaustive()
    }
}

/// Synthesizer that logs the utterance instead of producing audio. Used
/// by the console host and in tests; completes playback immediately.
#[derive(Debug, Default)]
pub struct LogSynthesizer;

impl SpeechSynthesizer for LogSynthesizer {
    fn speak(&mut self, request: SpeakRequest, sink: SynthesisSink) -> Result<()> {
        info!(
            rate = request.options.rate,
            pitch = request.options.pitch,
            voice = request.options.voice.as_deref().unwrap_or("default"),
            text = %request.text,
            "speaking"
        );
        let _ = sink.send(SynthesisEvent::Started);
        let _ = sink.send(SynthesisEvent::Finished);
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}
