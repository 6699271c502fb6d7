//! Parla console host.
//!
//! Drives the assistant engine from stdin: typed lines stand in for
//! speech. While the microphone is on, each line is fed to the scripted
//! recognizer as a final recognition result and the silence timer commits
//! it; while off, lines are submitted to the assistant directly.
//!
//! Commands: `/mic` toggles the microphone, `/state` prints the assistant
//! snapshot as JSON, `/quit` exits.

mod settings;

use std::sync::Arc;

use anyhow::Result;
use parla_core::{
    AssistantConfig, ChatCompletionResponder, ChatMessage, ChatReply, DictationController,
    LocalAnswerer, LogSynthesizer, RecognizerHandle, Responder, RoutedResponder,
    ScriptedRecognizer, SynthesizerHandle, VoiceAssistant,
};
use parla_core::chat::providers::{IpApiLocator, OpenWeatherClient};
use settings::{default_settings_path, load_settings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stands in for the remote model when no chat API key is configured, so
/// the host still converses offline.
struct EchoResponder;

#[async_trait::async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, history: &[ChatMessage]) -> ChatReply {
        let last = history
            .iter()
            .rev()
            .find(|m| m.role == parla_core::Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        ChatReply::answer(format!(
            "I'm running without a chat API key, so I can only echo you: {last}"
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = default_settings_path();
    let settings = load_settings(&settings_path);
    info!(path = %settings_path.display(), "settings loaded");

    let recognizer = ScriptedRecognizer::new();
    let microphone = recognizer.clone();
    let controller = Arc::new(DictationController::new(
        settings.controller_config(),
        RecognizerHandle::new(recognizer),
    ));

    let local = LocalAnswerer::new(
        Arc::new(IpApiLocator::new()),
        Arc::new(OpenWeatherClient::new(
            settings.openweather_api_key.clone().unwrap_or_default(),
        )),
    );
    let remote: Arc<dyn Responder> = match settings.chat_completion_config() {
        Some(config) => {
            info!(model = %config.model, "remote chat completion enabled");
            Arc::new(ChatCompletionResponder::new(config))
        }
        None => {
            info!("no chat API key configured — echo responder active");
            Arc::new(EchoResponder)
        }
    };
    let responder = Arc::new(RoutedResponder::new(local, remote));

    let assistant = Arc::new(VoiceAssistant::new(
        AssistantConfig {
            greeting: settings
                .greeting
                .clone()
                .unwrap_or_else(|| AssistantConfig::default().greeting),
            speak_options: settings.speak_options(),
        },
        Arc::clone(&controller),
        SynthesizerHandle::new(LogSynthesizer),
        responder,
    ));

    let greeting = assistant
        .messages()
        .first()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    println!("{greeting}");
    println!("(/mic toggles the microphone, /state shows status, /quit exits)");

    let mut commits = controller.subscribe_commits();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            commit = commits.recv() => {
                let commit = match commit {
                    Ok(commit) => commit,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        println!("(fell behind by {missed} dictated utterances)");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                println!("you (dictated): {}", commit.transcript);
                assistant.submit(&commit.transcript).await;
                print_reply(&assistant);
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => {}
                    "/quit" => break,
                    "/mic" => {
                        let before = assistant.messages().len();
                        assistant.toggle_microphone().await;
                        let snapshot = assistant.snapshot();
                        if snapshot.is_listening {
                            println!("microphone on — type to dictate");
                        } else {
                            println!("microphone off");
                            // An explicit stop forwards the transcript at once.
                            if assistant.messages().len() > before {
                                print_reply(&assistant);
                            }
                        }
                    }
                    "/state" => {
                        println!("{}", serde_json::to_string_pretty(&assistant.snapshot())?);
                    }
                    text => {
                        if assistant.snapshot().is_listening {
                            dictate(&microphone, text);
                        } else {
                            assistant.submit(text).await;
                            print_reply(&assistant);
                        }
                    }
                }
            }
        }
    }

    info!("goodbye");
    Ok(())
}

/// Feed a typed line to the scripted recognizer the way a platform
/// recognizer would: growing interim guesses, then one final result.
fn dictate(microphone: &ScriptedRecognizer, text: &str) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut prefix = String::new();
    for word in &words[..words.len().saturating_sub(1)] {
        if !prefix.is_empty() {
            prefix.push(' ');
        }
        prefix.push_str(word);
        microphone.push_interim(&prefix);
    }
    microphone.push_final(text);
}

fn print_reply(assistant: &VoiceAssistant) {
    if let Some(reply) = assistant.messages().last() {
        println!("parla: {}", reply.content);
    }
    if let Some(error) = assistant.snapshot().error {
        println!("(error: {error})");
    }
}
