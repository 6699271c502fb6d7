//! Speech recognition backend abstraction.
//!
//! The `SpeechRecognizer` trait decouples the controller from any specific
//! capture backend (platform recognizer, scripted test driver, etc.).
//! Backends are push-based: `start_continuous` hands the backend an
//! `EventSink` and events flow until `stop()` or the backend ends the
//! stream on its own.
//!
//! `&mut self` on `start_continuous`/`stop` intentionally expresses that
//! backends are stateful — open device handles, in-flight streams. All
//! mutation is serialised through `RecognizerHandle`'s
//! `parking_lot::Mutex`.

pub mod scripted;

pub use scripted::ScriptedRecognizer;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::events::RecognizerEvent;

/// Push channel a backend uses to deliver events to the controller.
pub type EventSink = mpsc::UnboundedSender<RecognizerEvent>;

/// Contract for continuous speech recognition backends.
pub trait SpeechRecognizer: Send + 'static {
    /// Capability probe. Checked once when the controller is built; a
    /// `false` here permanently disables the controller.
    fn is_available(&self) -> bool {
        true
    }

    /// Open a continuous recognition stream. Events are pushed through
    /// `sink` in arrival order. Called again (with a fresh clone of the
    /// same sink) when the controller transparently restarts a stream the
    /// backend ended itself.
    ///
    /// # Errors
    /// Returns an error if the capture stream cannot be opened.
    fn start_continuous(&mut self, sink: EventSink) -> Result<()>;

    /// Tear down the active stream. Idempotent: stopping a backend with
    /// no open stream is a no-op.
    fn stop(&mut self) -> Result<()>;
}

/// Thread-safe reference-counted handle to any `SpeechRecognizer`.
///
/// Uses `parking_lot::Mutex` for non-poisoning locks; the controller and
/// its dispatch task share the backend through clones of this handle.
#[derive(Clone)]
pub struct RecognizerHandle(pub Arc<Mutex<dyn SpeechRecognizer>>);

impl RecognizerHandle {
    /// Wrap any `SpeechRecognizer` in a `RecognizerHandle`.
    pub fn new<R: SpeechRecognizer>(recognizer: R) -> Self {
        Self(Arc::new(Mutex::new(recognizer)))
    }
}

impl std::fmt::Debug for RecognizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerHandle").finish_non_exhaustive()
    }
}
