//! `ListeningSession` — the single live unit of work while the microphone
//! is open.
//!
//! The session owns the merged transcript and the silence clock. It is pure
//! state: all timing decisions are made by the controller's dispatch loop,
//! which passes `Instant`s in. That keeps the merge algorithm and the
//! silence bookkeeping unit-testable without a runtime.

use std::time::Duration;

use tokio::time::Instant;

use crate::events::{ControllerStatus, RecognitionResult};

/// State of one dictation session.
///
/// Exactly one session may be live (`state != Idle`) per controller. The
/// transcript survives `stop()` and fatal errors so callers can still read
/// it; it is cleared on `reset()` or the next `start()`.
#[derive(Debug)]
pub struct ListeningSession {
    state: ControllerStatus,
    /// Committed transcript fragments, appended in recognizer order.
    final_segments: Vec<String>,
    /// Best-guess fragment for speech the recognizer has not finalized yet.
    /// Replaced wholesale on every event, never appended to.
    interim: String,
    /// First backend result slot not yet folded into `final_segments`.
    next_result_index: usize,
    /// Time of the most recent recognition event (partial or final).
    last_event_at: Instant,
    /// When the silence timer should next fire.
    silence_deadline: Instant,
    /// Generation counter. Bumped by each `start()`; a dispatch loop only
    /// acts while its captured epoch matches, so stale timers can never
    /// commit on behalf of a newer session.
    epoch: u64,
    /// Whether the single automatic restart after a transient backend
    /// error has been spent. Cleared by the next successful result event.
    transient_retry_used: bool,
}

impl ListeningSession {
    /// A fresh idle session (controller construction).
    pub fn idle(now: Instant) -> Self {
        Self {
            state: ControllerStatus::Idle,
            final_segments: Vec::new(),
            interim: String::new(),
            next_result_index: 0,
            last_event_at: now,
            silence_deadline: now,
            epoch: 0,
            transient_retry_used: false,
        }
    }

    /// Begin a new listening session: clears the transcript, re-arms the
    /// silence clock, and bumps the epoch so older dispatch loops retire.
    pub fn begin(&mut self, now: Instant, silence_threshold: Duration) {
        self.state = ControllerStatus::Listening;
        self.final_segments.clear();
        self.interim.clear();
        self.next_result_index = 0;
        self.transient_retry_used = false;
        self.epoch = self.epoch.wrapping_add(1);
        self.mark_event(now, silence_threshold);
    }

    pub fn state(&self) -> ControllerStatus {
        self.state
    }

    pub fn set_state(&mut self, state: ControllerStatus) {
        self.state = state;
    }

    pub fn is_listening(&self) -> bool {
        self.state == ControllerStatus::Listening
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn silence_deadline(&self) -> Instant {
        self.silence_deadline
    }

    /// Fold a batch of backend results into the transcript.
    ///
    /// `result_index` is where the batch starts in the backend's growing
    /// result list; slots below `next_result_index` were already committed
    /// and are skipped, which is what prevents duplicated words when a
    /// backend re-reports its full list. Final slots append to
    /// `final_segments` and clear the interim; non-final slots replace it.
    pub fn apply_results(&mut self, result_index: usize, results: &[RecognitionResult]) {
        for (offset, result) in results.iter().enumerate() {
            let index = result_index + offset;
            if index < self.next_result_index {
                continue;
            }
            if result.is_final {
                let text = result.transcript.trim();
                if !text.is_empty() {
                    self.final_segments.push(text.to_string());
                }
                self.interim.clear();
                self.next_result_index = index + 1;
            } else {
                self.interim = result.transcript.trim().to_string();
            }
        }
    }

    /// Record a recognition event: advances the silence clock and refunds
    /// the transient-retry budget.
    pub fn mark_event(&mut self, now: Instant, silence_threshold: Duration) {
        self.last_event_at = now;
        self.silence_deadline = now + silence_threshold;
        self.transient_retry_used = false;
    }

    /// Push the deadline forward without touching `last_event_at`. Used
    /// when the timer fires over an empty transcript, which never commits.
    pub fn rearm_silence(&mut self, now: Instant, silence_threshold: Duration) {
        self.silence_deadline = now + silence_threshold;
    }

    /// Whether the silence gap since the last recognition event has
    /// reached the threshold.
    pub fn silence_elapsed(&self, now: Instant, silence_threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_event_at) >= silence_threshold
    }

    /// The backend restarted its stream; its result indices begin again at
    /// zero. The transcript is deliberately untouched — continuity of the
    /// logical utterance across backend restarts is a correctness
    /// requirement.
    pub fn rebase_result_index(&mut self) {
        self.next_result_index = 0;
    }

    /// Spend the one automatic transient-error retry. Returns `false` if
    /// it was already spent since the last successful result.
    pub fn take_transient_retry(&mut self) -> bool {
        if self.transient_retry_used {
            return false;
        }
        self.transient_retry_used = true;
        true
    }

    /// The externally visible transcript:
    /// `trim(join(final_segments, " ") + " " + interim)`.
    pub fn transcript(&self) -> String {
        let mut text = self.final_segments.join(" ");
        if !self.interim.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&self.interim);
        }
        text.trim().to_string()
    }

    /// Clear the transcript without touching state or the silence clock.
    pub fn clear_transcript(&mut self) {
        self.final_segments.clear();
        self.interim.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening_session() -> ListeningSession {
        let mut session = ListeningSession::idle(Instant::now());
        session.begin(Instant::now(), Duration::from_millis(1500));
        session
    }

    #[test]
    fn interim_is_replaced_not_appended() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::interim("the")]);
        assert_eq!(session.transcript(), "the");

        session.apply_results(0, &[RecognitionResult::interim("the wea")]);
        assert_eq!(session.transcript(), "the wea");

        session.apply_results(0, &[RecognitionResult::interim("the weather")]);
        assert_eq!(session.transcript(), "the weather");
    }

    #[test]
    fn final_promotes_interim_without_duplication() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::interim("the wea")]);
        session.apply_results(0, &[RecognitionResult::final_text("the weather")]);

        // The interim guess is gone; only the final text remains.
        assert_eq!(session.transcript(), "the weather");
    }

    #[test]
    fn sequential_finals_concatenate_with_spaces() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::final_text("the")]);
        session.apply_results(1, &[RecognitionResult::final_text("weather")]);

        assert_eq!(session.transcript(), "the weather");
    }

    #[test]
    fn rereported_finals_are_not_committed_twice() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::final_text("hello")]);
        // Backend re-reports its full list plus a new interim tail.
        session.apply_results(
            0,
            &[
                RecognitionResult::final_text("hello"),
                RecognitionResult::interim("world"),
            ],
        );

        assert_eq!(session.transcript(), "hello world");
    }

    #[test]
    fn final_and_trailing_interim_in_one_batch() {
        let mut session = listening_session();

        session.apply_results(
            0,
            &[
                RecognitionResult::final_text("turn on"),
                RecognitionResult::interim("the li"),
            ],
        );

        assert_eq!(session.transcript(), "turn on the li");

        session.apply_results(1, &[RecognitionResult::final_text("the lights")]);
        assert_eq!(session.transcript(), "turn on the lights");
    }

    #[test]
    fn whitespace_only_final_is_dropped() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::final_text("   ")]);
        assert_eq!(session.transcript(), "");

        session.apply_results(1, &[RecognitionResult::final_text("ok")]);
        assert_eq!(session.transcript(), "ok");
    }

    #[test]
    fn rebase_preserves_transcript_and_accepts_new_stream_indices() {
        let mut session = listening_session();

        session.apply_results(0, &[RecognitionResult::final_text("hello")]);
        session.rebase_result_index();

        // The restarted stream numbers its results from zero again.
        session.apply_results(0, &[RecognitionResult::final_text("world")]);
        assert_eq!(session.transcript(), "hello world");
    }

    #[test]
    fn clear_transcript_is_idempotent() {
        let mut session = listening_session();
        session.apply_results(0, &[RecognitionResult::final_text("hello")]);

        session.clear_transcript();
        assert_eq!(session.transcript(), "");

        session.clear_transcript();
        assert_eq!(session.transcript(), "");
    }

    #[test]
    fn begin_bumps_epoch_and_clears_everything() {
        let mut session = listening_session();
        let first_epoch = session.epoch();
        session.apply_results(0, &[RecognitionResult::final_text("stale")]);

        session.begin(Instant::now(), Duration::from_millis(1500));

        assert_eq!(session.transcript(), "");
        assert!(session.is_listening());
        assert_eq!(session.epoch(), first_epoch + 1);
    }

    #[test]
    fn silence_clock_tracks_last_event() {
        let threshold = Duration::from_millis(1500);
        let start = Instant::now();
        let mut session = ListeningSession::idle(start);
        session.begin(start, threshold);

        let at_event = start + Duration::from_millis(400);
        session.apply_results(0, &[RecognitionResult::interim("hm")]);
        session.mark_event(at_event, threshold);

        assert!(!session.silence_elapsed(at_event + Duration::from_millis(1499), threshold));
        assert!(session.silence_elapsed(at_event + threshold, threshold));
        assert_eq!(session.silence_deadline(), at_event + threshold);
    }

    #[test]
    fn transient_retry_budget_is_single_use_until_next_event() {
        let threshold = Duration::from_millis(1500);
        let mut session = listening_session();

        assert!(session.take_transient_retry());
        assert!(!session.take_transient_retry());

        // A successful result refunds the budget.
        session.mark_event(Instant::now(), threshold);
        assert!(session.take_transient_retry());
    }
}
