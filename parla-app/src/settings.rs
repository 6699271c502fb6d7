//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use parla_core::{ChatCompletionConfig, ControllerConfig, SpeakOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub silence_threshold_ms: u64,
    pub transient_retry_delay_ms: u64,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub preferred_voice: Option<String>,
    pub openweather_api_key: Option<String>,
    pub chat_endpoint: Option<String>,
    pub chat_model: Option<String>,
    pub chat_api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub greeting: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 1500,
            transient_retry_delay_ms: 300,
            speech_rate: 1.0,
            speech_pitch: 1.0,
            preferred_voice: None,
            openweather_api_key: None,
            chat_endpoint: None,
            chat_model: None,
            chat_api_key: None,
            system_prompt: None,
            greeting: None,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.silence_threshold_ms = self.silence_threshold_ms.clamp(300, 30_000);
        self.transient_retry_delay_ms = self.transient_retry_delay_ms.clamp(50, 5_000);
        self.speech_rate = self.speech_rate.clamp(0.25, 4.0);
        self.speech_pitch = self.speech_pitch.clamp(0.25, 4.0);
        self.preferred_voice = trimmed(&self.preferred_voice);
        self.openweather_api_key = trimmed(&self.openweather_api_key);
        self.chat_endpoint = trimmed(&self.chat_endpoint);
        self.chat_model = trimmed(&self.chat_model);
        self.chat_api_key = trimmed(&self.chat_api_key);
        self.system_prompt = trimmed(&self.system_prompt);
        self.greeting = trimmed(&self.greeting);
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            silence_threshold: Duration::from_millis(self.silence_threshold_ms),
            transient_retry_delay: Duration::from_millis(self.transient_retry_delay_ms),
        }
    }

    pub fn speak_options(&self) -> SpeakOptions {
        SpeakOptions {
            rate: self.speech_rate,
            pitch: self.speech_pitch,
            voice: self.preferred_voice.clone(),
        }
    }

    /// Remote completion configuration, present only when an API key is
    /// configured.
    pub fn chat_completion_config(&self) -> Option<ChatCompletionConfig> {
        let api_key = self.chat_api_key.clone()?;
        let mut config = ChatCompletionConfig::new(api_key);
        if let Some(endpoint) = &self.chat_endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.chat_model {
            config.model = model.clone();
        }
        if let Some(prompt) = &self.system_prompt {
            config.system_prompt = prompt.clone();
        }
        Some(config)
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn default_settings_path() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("parla")
        .join("settings.json")
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "settings file unreadable — using defaults");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
