//! `VoiceAssistant` — the conversation orchestrator.
//!
//! Ties the dictation controller, the responder, and the synthesizer
//! together: committed utterances become user messages, the responder's
//! reply joins the history and is spoken aloud. The assistant owns the
//! conversation history; the controller stays a pure dictation engine.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use crate::{
    chat::{ChatMessage, Responder},
    controller::DictationController,
    events::{AssistantSnapshot, SynthesisEvent},
    synthesis::{SpeakOptions, SpeakRequest, SynthesizerHandle},
};

const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Configuration for `VoiceAssistant`.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// First assistant message seeded into the history.
    pub greeting: String,
    pub speak_options: SpeakOptions,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            speak_options: SpeakOptions::default(),
        }
    }
}

/// The assistant core. `Send + Sync`; wrap in `Arc` and call
/// `spawn_commit_pump` once to wire silence-timeout commits into the
/// conversation.
pub struct VoiceAssistant {
    config: AssistantConfig,
    controller: Arc<DictationController>,
    synthesizer: SynthesizerHandle,
    responder: Arc<dyn Responder>,
    history: Mutex<Vec<ChatMessage>>,
    speaking: Arc<AtomicBool>,
    /// Guards against overlapping `submit` calls; replies are produced
    /// one at a time, in commit order.
    processing: AtomicBool,
    error: Mutex<Option<String>>,
}

impl VoiceAssistant {
    pub fn new(
        config: AssistantConfig,
        controller: Arc<DictationController>,
        synthesizer: SynthesizerHandle,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let history = vec![ChatMessage::assistant(&config.greeting)];
        Self {
            config,
            controller,
            synthesizer,
            responder,
            history: Mutex::new(history),
            speaking: Arc::new(AtomicBool::new(false)),
            processing: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Forward every utterance commit into the conversation. Call once
    /// after wrapping the assistant in `Arc`.
    pub fn spawn_commit_pump(self: &Arc<Self>) {
        let assistant = Arc::clone(self);
        let mut commits = assistant.controller.subscribe_commits();
        tokio::spawn(async move {
            loop {
                match commits.recv().await {
                    Ok(commit) => {
                        debug!(seq = commit.seq, "commit received");
                        assistant.submit(&commit.transcript).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "commit pump lagged behind the controller");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Toggle the microphone, the way a push-to-talk button would.
    ///
    /// Listening: stop the session and forward whatever transcript had
    /// accumulated (explicit stop sends immediately rather than waiting
    /// out the silence timer). Idle: cancel any speech in progress and
    /// start listening.
    pub async fn toggle_microphone(&self) {
        if self.controller.is_listening() {
            if let Err(e) = self.controller.stop() {
                warn!(error = %e, "microphone stop failed");
                *self.error.lock() = Some(e.to_string());
                return;
            }
            let transcript = self.controller.transcript();
            self.controller.reset();
            if !transcript.trim().is_empty() {
                self.submit(&transcript).await;
            }
        } else {
            self.stop_speaking();
            if let Err(e) = self.controller.start() {
                warn!(error = %e, "microphone start failed");
                *self.error.lock() = Some(e.to_string());
            }
        }
    }

    /// Submit one user message, wait for the reply, and speak it.
    pub async fn submit(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.processing.swap(true, Ordering::Acquire) {
            debug!("submit skipped — a reply is already in flight");
            return;
        }

        let history = {
            let mut history = self.history.lock();
            history.push(ChatMessage::user(text));
            history.clone()
        };
        info!(chars = text.len(), "user message submitted");

        let reply = self.responder.respond(&history).await;
        *self.error.lock() = reply.error.clone();
        self.history.lock().push(ChatMessage::assistant(&reply.content));
        self.controller.reset();
        self.processing.store(false, Ordering::Release);

        self.speak(&reply.content);
    }

    /// Speak `text` with the configured voice, cancelling any utterance
    /// already playing. Synthesis failures are surfaced via `snapshot()`
    /// and never affect listening state.
    pub fn speak(&self, text: &str) {
        let (sink, rx) = mpsc::unbounded_channel();
        let request = SpeakRequest {
            text: text.to_string(),
            options: self.config.speak_options.clone(),
        };

        {
            let mut synthesizer = self.synthesizer.0.lock();
            if let Err(e) = synthesizer.cancel() {
                warn!(error = %e, "cancel before speak failed");
            }
            if let Err(e) = synthesizer.speak(request, sink) {
                warn!(error = %e, "synthesis refused the utterance");
                *self.error.lock() = Some(e.to_string());
                return;
            }
        }

        self.track_playback(rx);
    }

    /// Cancel any speech in progress.
    pub fn stop_speaking(&self) {
        if let Err(e) = self.synthesizer.0.lock().cancel() {
            warn!(error = %e, "synthesis cancel failed");
        }
        self.speaking.store(false, Ordering::Release);
    }

    fn track_playback(&self, mut rx: mpsc::UnboundedReceiver<SynthesisEvent>) {
        let speaking = Arc::clone(&self.speaking);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    SynthesisEvent::Started => speaking.store(true, Ordering::Release),
                    SynthesisEvent::Finished => speaking.store(false, Ordering::Release),
                    SynthesisEvent::Error { message } => {
                        warn!(message = %message, "synthesis playback error");
                        speaking.store(false, Ordering::Release);
                    }
                }
            }
            speaking.store(false, Ordering::Release);
        });
    }

    /// Conversation history, greeting included.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }

    /// The fields a rendering layer needs, in one read. The assistant's
    /// own error (responder, synthesis) wins over the controller's.
    pub fn snapshot(&self) -> AssistantSnapshot {
        let error = self
            .error
            .lock()
            .clone()
            .or_else(|| self.controller.last_error());
        AssistantSnapshot {
            transcript: self.controller.transcript(),
            is_listening: self.controller.is_listening(),
            is_speaking: self.is_speaking(),
            error,
        }
    }
}

impl std::fmt::Debug for VoiceAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAssistant")
            .field("messages", &self.history.lock().len())
            .field("is_speaking", &self.is_speaking())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::chat::ChatReply;
    use crate::controller::ControllerConfig;
    use crate::recognizer::{RecognizerHandle, ScriptedRecognizer};
    use crate::synthesis::LogSynthesizer;

    struct EchoResponder;

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, history: &[ChatMessage]) -> ChatReply {
            let last = history.last().expect("history not empty");
            ChatReply::answer(format!("you said: {}", last.content))
        }
    }

    struct FailingResponder;

    #[async_trait]
    impl Responder for FailingResponder {
        async fn respond(&self, _history: &[ChatMessage]) -> ChatReply {
            ChatReply::failed("sorry, try later", "upstream down")
        }
    }

    fn assistant_with(responder: Arc<dyn Responder>) -> (Arc<VoiceAssistant>, ScriptedRecognizer) {
        let recognizer = ScriptedRecognizer::new();
        let driver = recognizer.clone();
        let controller = Arc::new(DictationController::new(
            ControllerConfig::default(),
            RecognizerHandle::new(recognizer),
        ));
        let assistant = Arc::new(VoiceAssistant::new(
            AssistantConfig::default(),
            controller,
            SynthesizerHandle::new(LogSynthesizer),
            responder,
        ));
        (assistant, driver)
    }

    #[tokio::test]
    async fn history_starts_with_the_greeting() {
        let (assistant, _driver) = assistant_with(Arc::new(EchoResponder));
        let messages = assistant.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, DEFAULT_GREETING);
    }

    #[tokio::test]
    async fn submit_appends_user_and_assistant_turns() {
        let (assistant, _driver) = assistant_with(Arc::new(EchoResponder));
        assistant.submit("hello there").await;

        let messages = assistant.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "hello there");
        assert_eq!(messages[2].content, "you said: hello there");
        assert!(assistant.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn blank_submissions_are_ignored() {
        let (assistant, _driver) = assistant_with(Arc::new(EchoResponder));
        assistant.submit("   ").await;
        assert_eq!(assistant.messages().len(), 1);
    }

    #[tokio::test]
    async fn responder_failure_surfaces_in_the_snapshot() {
        let (assistant, _driver) = assistant_with(Arc::new(FailingResponder));
        assistant.submit("anything").await;

        let snapshot = assistant.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("upstream down"));
        // The fallback sentence still joins the conversation.
        assert_eq!(assistant.messages()[2].content, "sorry, try later");
    }

    #[tokio::test]
    async fn toggle_starts_and_stops_listening() {
        let (assistant, driver) = assistant_with(Arc::new(EchoResponder));

        assistant.toggle_microphone().await;
        assert!(assistant.snapshot().is_listening);
        assert!(driver.is_streaming());

        // Stop with an empty transcript: back to idle, nothing submitted.
        assistant.toggle_microphone().await;
        assert!(!assistant.snapshot().is_listening);
        assert_eq!(assistant.messages().len(), 1);
    }

    #[tokio::test]
    async fn toggle_stop_forwards_the_accumulated_transcript() {
        let (assistant, driver) = assistant_with(Arc::new(EchoResponder));

        assistant.toggle_microphone().await;
        driver.push_final("what is rust");
        tokio::task::yield_now().await;

        // Let the dispatch task merge the event before stopping.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assistant.toggle_microphone().await;

        let messages = assistant.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "what is rust");
        assert_eq!(messages[2].content, "you said: what is rust");
        // Transcript cleared once forwarded.
        assert!(assistant.snapshot().transcript.is_empty());
    }
}
