//! Dispatch loop: one task per listening session.
//!
//! ## Per-iteration shape
//!
//! ```text
//! 1. Read the session's silence deadline (break if the session retired)
//! 2. select! { biased;
//!      recognizer event  → merge / restart / error-handle
//!      wake notification → re-check liveness
//!      deadline elapsed  → commit if the silence gap is real
//!    }
//! ```
//!
//! The `biased` ordering polls the event channel before the timer, so a
//! deadline can only fire when no newer recognition event is queued —
//! that is what rules out a stale timer committing a transcript that is
//! about to be extended. Liveness is `state == Listening && epoch ==
//! ours`; `stop()`, a fatal error, or a newer `start()` all fail that
//! check, so a retired loop can never emit a late commit.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    controller::ControllerConfig,
    events::{
        ControllerStatus, ControllerStatusEvent, RecognizerErrorKind, RecognizerEvent,
        UtteranceCommit,
    },
    recognizer::{EventSink, RecognizerHandle},
    session::ListeningSession,
};

/// All context the dispatch loop needs, passed as one struct so the spawn
/// site stays tidy.
pub(crate) struct Dispatch {
    pub config: ControllerConfig,
    pub recognizer: RecognizerHandle,
    pub session: Arc<Mutex<ListeningSession>>,
    pub wake: Arc<Notify>,
    pub commit_tx: broadcast::Sender<UtteranceCommit>,
    pub status_tx: broadcast::Sender<ControllerStatusEvent>,
    pub seq: Arc<AtomicU64>,
    pub last_error: Arc<Mutex<Option<String>>>,
    /// Session generation this loop serves.
    pub epoch: u64,
    /// Handed back to the backend on transparent restarts.
    pub sink: EventSink,
}

fn live(session: &ListeningSession, epoch: u64) -> bool {
    session.is_listening() && session.epoch() == epoch
}

/// Run the dispatch loop until the session retires.
pub(crate) async fn run(ctx: Dispatch, mut rx: mpsc::UnboundedReceiver<RecognizerEvent>) {
    debug!(epoch = ctx.epoch, "dispatch loop started");

    loop {
        let deadline = {
            let session = ctx.session.lock();
            if !live(&session, ctx.epoch) {
                break;
            }
            session.silence_deadline()
        };

        tokio::select! {
            biased;

            event = rx.recv() => match event {
                Some(event) => {
                    if !handle_event(&ctx, event).await {
                        break;
                    }
                }
                None => break,
            },

            _ = ctx.wake.notified() => {
                // Liveness re-checked at the top of the loop.
            }

            _ = time::sleep_until(deadline) => {
                if !on_silence_deadline(&ctx) {
                    break;
                }
            }
        }
    }

    debug!(epoch = ctx.epoch, "dispatch loop ended");
}

/// Handle one backend event. Returns `false` when the loop should end.
async fn handle_event(ctx: &Dispatch, event: RecognizerEvent) -> bool {
    match event {
        RecognizerEvent::Result {
            result_index,
            results,
        } => {
            let mut session = ctx.session.lock();
            if !live(&session, ctx.epoch) {
                return false;
            }
            session.apply_results(result_index, &results);
            session.mark_event(Instant::now(), ctx.config.silence_threshold);
            debug!(
                result_index,
                results = results.len(),
                transcript_chars = session.transcript().len(),
                "recognition event merged"
            );
            true
        }

        RecognizerEvent::StreamEnded => {
            {
                let mut session = ctx.session.lock();
                if !live(&session, ctx.epoch) {
                    return false;
                }
                // The restarted stream numbers its results from zero; the
                // transcript carries over untouched.
                session.rebase_result_index();
            }
            match ctx.recognizer.0.lock().start_continuous(ctx.sink.clone()) {
                Ok(()) => {
                    info!("backend ended its stream — restarted transparently");
                    true
                }
                Err(e) => {
                    fail_session(ctx, format!("backend restart failed: {e}"));
                    false
                }
            }
        }

        RecognizerEvent::Error { kind, message } => match kind {
            RecognizerErrorKind::NoSpeech => {
                // Expected noise while the user is quiet. No state change,
                // no timer change, nothing surfaced.
                debug!("no-speech notice ignored");
                true
            }
            RecognizerErrorKind::Transient => retry_backend(ctx, message).await,
            RecognizerErrorKind::Fatal => {
                fail_session(ctx, message);
                false
            }
        },
    }
}

/// One automatic backend restart after a transient error; a second
/// transient failure before the next successful result is treated as
/// fatal.
async fn retry_backend(ctx: &Dispatch, message: String) -> bool {
    {
        let mut session = ctx.session.lock();
        if !live(&session, ctx.epoch) {
            return false;
        }
        if !session.take_transient_retry() {
            drop(session);
            fail_session(ctx, format!("transient error persisted after retry: {message}"));
            return false;
        }
    }

    warn!(message = %message, "transient backend error — retrying start shortly");
    time::sleep(ctx.config.transient_retry_delay).await;

    // The caller may have stopped or restarted the session during the delay.
    if !live(&ctx.session.lock(), ctx.epoch) {
        return false;
    }

    match ctx.recognizer.0.lock().start_continuous(ctx.sink.clone()) {
        Ok(()) => {
            info!("backend restarted after transient error");
            true
        }
        Err(e) => {
            fail_session(ctx, format!("retry after transient error failed: {e}"));
            false
        }
    }
}

/// The silence deadline fired. Returns `false` when the loop should end
/// (session committed or retired).
fn on_silence_deadline(ctx: &Dispatch) -> bool {
    let transcript = {
        let mut session = ctx.session.lock();
        if !live(&session, ctx.epoch) {
            return false;
        }
        let now = Instant::now();
        if !session.silence_elapsed(now, ctx.config.silence_threshold) {
            // A fresh event moved the clock while we were waking up; the
            // loop recomputes the deadline.
            return true;
        }
        let transcript = session.transcript();
        if transcript.is_empty() {
            // An empty transcript never auto-commits; keep waiting.
            session.rearm_silence(now, ctx.config.silence_threshold);
            debug!("silence over empty transcript — timer re-armed");
            return true;
        }
        session.set_state(ControllerStatus::Finalizing);
        transcript
    };

    let _ = ctx.status_tx.send(ControllerStatusEvent {
        status: ControllerStatus::Finalizing,
        detail: None,
    });

    let retired = retire_session(ctx);

    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let delivered = ctx
        .commit_tx
        .send(UtteranceCommit {
            seq,
            transcript: transcript.clone(),
        })
        .is_ok();
    if retired {
        let _ = ctx.status_tx.send(ControllerStatusEvent {
            status: ControllerStatus::Idle,
            detail: None,
        });
    }

    info!(
        seq,
        transcript_chars = transcript.len(),
        delivered,
        "utterance committed on silence timeout"
    );
    false
}

/// Close this loop's backend stream and park its session in `Idle`.
///
/// The epoch is re-checked under the session lock, and the backend stop
/// happens while it is still held: a `start()` racing this tail (the
/// session is no longer `Listening`, so the controller treats it as
/// fresh) bumps the epoch and reopens the backend, and the retiring loop
/// must leave both alone. Returns whether the teardown applied.
fn retire_session(ctx: &Dispatch) -> bool {
    let mut session = ctx.session.lock();
    if session.epoch() != ctx.epoch {
        debug!("teardown skipped — a newer session owns the backend");
        return false;
    }
    if let Err(e) = ctx.recognizer.0.lock().stop() {
        warn!(error = %e, "backend stop failed during teardown");
    }
    session.set_state(ControllerStatus::Idle);
    true
}

/// Fatal path: park the session in `Idle`, keep the partial transcript
/// for inspection, surface the error, and close the backend stream.
fn fail_session(ctx: &Dispatch, message: String) {
    error!(message = %message, "fatal backend error — session terminated");

    *ctx.last_error.lock() = Some(message.clone());
    if retire_session(ctx) {
        let _ = ctx.status_tx.send(ControllerStatusEvent {
            status: ControllerStatus::Idle,
            detail: Some(message),
        });
    }
}
