//! `DictationController` — top-level dictation lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start()--> Listening
//! Listening --stop()--> Idle                       (explicit, no commit)
//! Listening --silence timeout--> Finalizing --> Idle   [emits commit]
//! Listening --backend self-terminates--> Listening     [transparent restart]
//! Listening --fatal backend error--> Idle              [surfaces error]
//! ```
//!
//! One long-lived controller instance owns one `ListeningSession` and the
//! exclusive backend handle. All recognition events, plus the silence
//! timer, are consumed by a single dispatch task (`dispatch::run`), so
//! session mutations are serialised the way a UI event loop would
//! serialise them.
//!
//! `start()` must be called from within a Tokio runtime — it spawns the
//! dispatch task.

pub mod dispatch;

use std::sync::{atomic::AtomicU64, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    error::{ParlaError, Result},
    events::{ControllerStatus, ControllerStatusEvent, UtteranceCommit},
    recognizer::RecognizerHandle,
    session::ListeningSession,
};

/// Broadcast channel capacity: 64 commit/status events buffered for slow
/// consumers.
const BROADCAST_CAP: usize = 64;

/// Configuration for `DictationController`.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long without a recognition event (partial or final) before the
    /// session is considered finished. Default: 1500 ms.
    pub silence_threshold: Duration,
    /// Delay before the single automatic backend restart after a
    /// transient error. Default: 300 ms.
    pub transient_retry_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(1500),
            transient_retry_delay: Duration::from_millis(300),
        }
    }
}

/// The dictation controller handle.
///
/// `DictationController` is `Send + Sync` — all fields use interior
/// mutability. Wrap in `Arc` to share with the UI layer and the
/// assistant's commit pump.
pub struct DictationController {
    config: ControllerConfig,
    recognizer: RecognizerHandle,
    /// Capability probe result, taken once at construction. When `false`,
    /// `start`/`stop` permanently return `ParlaError::Unsupported`.
    supported: bool,
    session: Arc<Mutex<ListeningSession>>,
    /// Rouses the dispatch loop so `stop()`/`start()` take effect promptly
    /// instead of waiting for the next deadline.
    wake: Arc<Notify>,
    commit_tx: broadcast::Sender<UtteranceCommit>,
    status_tx: broadcast::Sender<ControllerStatusEvent>,
    /// Monotonically increasing commit sequence counter.
    seq: Arc<AtomicU64>,
    /// Last surfaced error, overwritten by the next one. Errors are
    /// reported here rather than thrown across the component boundary.
    last_error: Arc<Mutex<Option<String>>>,
}

impl DictationController {
    /// Create a controller over the given backend. Probes capability once;
    /// an unavailable backend surfaces as a permanent `Unsupported` error
    /// on every subsequent `start`/`stop`.
    pub fn new(config: ControllerConfig, recognizer: RecognizerHandle) -> Self {
        let supported = recognizer.0.lock().is_available();
        let (commit_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let last_error = Arc::new(Mutex::new(None));

        if !supported {
            warn!("speech recognition backend unavailable — controller disabled");
            *last_error.lock() = Some(ParlaError::Unsupported.to_string());
        }

        Self {
            config,
            recognizer,
            supported,
            session: Arc::new(Mutex::new(ListeningSession::idle(Instant::now()))),
            wake: Arc::new(Notify::new()),
            commit_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            last_error,
        }
    }

    /// Start listening.
    ///
    /// If already listening this begins a new utterance on the live
    /// stream: the transcript is cleared and the silence clock restarts,
    /// but no second backend capture stream is ever opened.
    ///
    /// # Errors
    /// - `ParlaError::Unsupported` if the backend failed its capability probe.
    /// - Backend errors from opening the capture stream.
    pub fn start(&self) -> Result<()> {
        if !self.supported {
            return Err(ParlaError::Unsupported);
        }

        let now = Instant::now();
        let epoch = {
            let mut session = self.session.lock();
            if session.is_listening() {
                info!("start while listening — beginning a new utterance");
                session.clear_transcript();
                session.mark_event(now, self.config.silence_threshold);
                self.wake.notify_waiters();
                return Ok(());
            }
            session.begin(now, self.config.silence_threshold);
            session.epoch()
        };

        *self.last_error.lock() = None;

        let (sink, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.recognizer.0.lock().start_continuous(sink.clone()) {
            let mut session = self.session.lock();
            session.set_state(ControllerStatus::Idle);
            *self.last_error.lock() = Some(e.to_string());
            self.emit_status(ControllerStatus::Idle, Some(e.to_string()));
            return Err(e);
        }

        self.emit_status(ControllerStatus::Listening, None);
        info!(epoch, "listening session started");

        let ctx = dispatch::Dispatch {
            config: self.config.clone(),
            recognizer: self.recognizer.clone(),
            session: Arc::clone(&self.session),
            wake: Arc::clone(&self.wake),
            commit_tx: self.commit_tx.clone(),
            status_tx: self.status_tx.clone(),
            seq: Arc::clone(&self.seq),
            last_error: Arc::clone(&self.last_error),
            epoch,
            sink,
        };
        tokio::spawn(dispatch::run(ctx, rx));

        // Retire any dispatch loop left over from an earlier session.
        self.wake.notify_waiters();
        Ok(())
    }

    /// Stop listening immediately (explicit user stop).
    ///
    /// Transitions `Listening → Idle` bypassing `Finalizing`; the pending
    /// silence timer is invalidated, no commit is emitted, and the
    /// transcript accumulated so far stays readable via `transcript()`.
    /// Whether to forward it is the caller's decision.
    ///
    /// # Errors
    /// - `ParlaError::Unsupported` if the backend failed its capability probe.
    /// - `ParlaError::NotListening` if no session is active.
    pub fn stop(&self) -> Result<()> {
        if !self.supported {
            return Err(ParlaError::Unsupported);
        }

        {
            let mut session = self.session.lock();
            if !session.is_listening() {
                return Err(ParlaError::NotListening);
            }
            session.set_state(ControllerStatus::Idle);
        }

        let stopped = self.recognizer.0.lock().stop();
        self.emit_status(ControllerStatus::Idle, None);
        self.wake.notify_waiters();
        info!("listening session stopped by caller");
        stopped
    }

    /// Clear the transcript. Callable in any state (including on a
    /// disabled controller); does not change the lifecycle state.
    pub fn reset(&self) {
        self.session.lock().clear_transcript();
    }

    /// The merged transcript as of the most recent recognition event.
    pub fn transcript(&self) -> String {
        self.session.lock().transcript()
    }

    /// Current lifecycle state (snapshot).
    pub fn status(&self) -> ControllerStatus {
        self.session.lock().state()
    }

    pub fn is_listening(&self) -> bool {
        self.session.lock().is_listening()
    }

    /// Last surfaced error, if any. Overwritten by the next error and
    /// cleared by a successful `start()`.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Subscribe to utterance commits (silence-timeout finalizations).
    pub fn subscribe_commits(&self) -> broadcast::Receiver<UtteranceCommit> {
        self.commit_tx.subscribe()
    }

    /// Subscribe to lifecycle status events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<ControllerStatusEvent> {
        self.status_tx.subscribe()
    }

    fn emit_status(&self, status: ControllerStatus, detail: Option<String>) {
        let _ = self.status_tx.send(ControllerStatusEvent { status, detail });
    }
}

impl std::fmt::Debug for DictationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictationController")
            .field("supported", &self.supported)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
