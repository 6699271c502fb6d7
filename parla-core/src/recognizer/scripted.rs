//! `ScriptedRecognizer` — in-process backend driven by explicit calls.
//!
//! Stands in for a platform recognizer during development and in tests:
//! the host (console app, test harness) pushes interim/final results, end
//! of stream, and error events by hand. Result indices follow the
//! platform convention — a growing list where the interim slot keeps its
//! index until a final commits it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ParlaError, Result};
use crate::events::{RecognitionResult, RecognizerErrorKind, RecognizerEvent};
use crate::recognizer::{EventSink, SpeechRecognizer};

#[derive(Default)]
struct Inner {
    sink: Option<EventSink>,
    /// Index the next result slot will occupy in the current stream.
    next_index: usize,
    /// How many times `start_continuous` has been called (restarts included).
    starts: u32,
}

/// Hand-driven recognition backend. Cloning shares the same stream, so a
/// test or host can keep a driver clone while the controller owns the
/// backend through its `RecognizerHandle`.
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    inner: Arc<Mutex<Inner>>,
    unsupported: bool,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that reports no recognition capability. Every controller
    /// built on it is permanently disabled.
    pub fn unsupported() -> Self {
        Self {
            inner: Arc::default(),
            unsupported: true,
        }
    }

    /// Number of `start_continuous` calls observed so far.
    pub fn starts(&self) -> u32 {
        self.inner.lock().starts
    }

    /// Whether a stream is currently open.
    pub fn is_streaming(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Push a revisable interim result. The slot index stays put until a
    /// final commits it.
    pub fn push_interim(&self, transcript: &str) {
        let inner = self.inner.lock();
        let index = inner.next_index;
        Self::send(
            &inner,
            RecognizerEvent::Result {
                result_index: index,
                results: vec![RecognitionResult::interim(transcript)],
            },
        );
    }

    /// Push a committed final result and advance the slot index.
    pub fn push_final(&self, transcript: &str) {
        let mut inner = self.inner.lock();
        let index = inner.next_index;
        inner.next_index += 1;
        Self::send(
            &inner,
            RecognizerEvent::Result {
                result_index: index,
                results: vec![RecognitionResult::final_text(transcript)],
            },
        );
    }

    /// Simulate the platform closing the stream on its own. The sink is
    /// dropped; a transparent restart re-opens it with fresh indices.
    pub fn end_stream(&self) {
        let mut inner = self.inner.lock();
        Self::send(&inner, RecognizerEvent::StreamEnded);
        inner.sink = None;
        inner.next_index = 0;
    }

    /// Report a backend error of the given kind.
    pub fn fail(&self, kind: RecognizerErrorKind, message: &str) {
        let inner = self.inner.lock();
        Self::send(
            &inner,
            RecognizerEvent::Error {
                kind,
                message: message.to_string(),
            },
        );
    }

    fn send(inner: &Inner, event: RecognizerEvent) {
        match &inner.sink {
            Some(sink) => {
                if sink.send(event).is_err() {
                    debug!("scripted recognizer event dropped — controller gone");
                }
            }
            None => debug!("scripted recognizer event dropped — no open stream"),
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        !self.unsupported
    }

    fn start_continuous(&mut self, sink: EventSink) -> Result<()> {
        if self.unsupported {
            return Err(ParlaError::Unsupported);
        }
        let mut inner = self.inner.lock();
        inner.sink = Some(sink);
        inner.next_index = 0;
        inner.starts += 1;
        debug!(starts = inner.starts, "scripted recognizer stream opened");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.sink = None;
        debug!("scripted recognizer stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn events_flow_through_the_sink_with_growing_indices() {
        let mut recognizer = ScriptedRecognizer::new();
        let driver = recognizer.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        recognizer.start_continuous(tx).expect("start");
        driver.push_interim("he");
        driver.push_final("hello");
        driver.push_final("world");

        match rx.try_recv().expect("interim event") {
            RecognizerEvent::Result {
                result_index,
                results,
            } => {
                assert_eq!(result_index, 0);
                assert!(!results[0].is_final);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.try_recv().expect("first final") {
            RecognizerEvent::Result { result_index, .. } => assert_eq!(result_index, 0),
            other => panic!("unexpected event {other:?}"),
        }
        match rx.try_recv().expect("second final") {
            RecognizerEvent::Result { result_index, .. } => assert_eq!(result_index, 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn restart_resets_result_indices() {
        let mut recognizer = ScriptedRecognizer::new();
        let driver = recognizer.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        recognizer.start_continuous(tx).expect("start");
        driver.push_final("one");
        driver.end_stream();
        assert!(!driver.is_streaming());

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        recognizer.start_continuous(tx2).expect("restart");
        driver.push_final("two");

        // First stream saw index 0, then the end-of-stream marker.
        assert!(matches!(
            rx.try_recv().expect("final"),
            RecognizerEvent::Result { result_index: 0, .. }
        ));
        assert!(matches!(
            rx.try_recv().expect("ended"),
            RecognizerEvent::StreamEnded
        ));
        // Restarted stream numbers from zero again.
        assert!(matches!(
            rx2.try_recv().expect("final after restart"),
            RecognizerEvent::Result { result_index: 0, .. }
        ));
        assert_eq!(driver.starts(), 2);
    }

    #[test]
    fn unsupported_backend_refuses_to_start() {
        let mut recognizer = ScriptedRecognizer::unsupported();
        assert!(!recognizer.is_available());

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            recognizer.start_continuous(tx),
            Err(ParlaError::Unsupported)
        ));
    }

    #[test]
    fn pushing_without_a_stream_is_a_quiet_no_op() {
        let driver = ScriptedRecognizer::new();
        driver.push_final("nobody listening");
        driver.fail(RecognizerErrorKind::NoSpeech, "quiet");
    }
}
