use thiserror::Error;

/// All errors produced by parla-core.
#[derive(Debug, Error)]
pub enum ParlaError {
    #[error("speech recognition is not available on this backend")]
    Unsupported,

    #[error("controller is not listening")]
    NotListening,

    #[error("location lookup failed: {0}")]
    Location(String),

    #[error("weather lookup failed: {0}")]
    Weather(String),

    #[error("chat completion failed: {0}")]
    ChatCompletion(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ParlaError>;
