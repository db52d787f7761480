use thiserror::Error;

use crate::compose::CompositionError;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Download error: {message}")]
    Download { message: String, transient: bool },

    #[error("Transcription error: {message}")]
    Transcription { message: String, transient: bool },

    #[error("Translation error: {message}")]
    Translation { message: String, transient: bool },

    #[error("TTS error: {message}")]
    Tts { message: String, transient: bool },

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Mux error: {0}")]
    Mux(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Synthesis model used before it was acquired")]
    ModelNotInitialized,

    #[error("Run cancelled before stage: {0}")]
    Cancelled(String),
}

impl DubError {
    pub fn download(message: impl Into<String>) -> Self {
        DubError::Download { message: message.into(), transient: false }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        DubError::Transcription { message: message.into(), transient: false }
    }

    pub fn translation(message: impl Into<String>) -> Self {
        DubError::Translation { message: message.into(), transient: false }
    }

    pub fn tts(message: impl Into<String>) -> Self {
        DubError::Tts { message: message.into(), transient: false }
    }

    /// Mark a stage failure as worth another attempt
    pub fn retryable(self, retry: bool) -> Self {
        match self {
            DubError::Download { message, .. } => DubError::Download { message, transient: retry },
            DubError::Transcription { message, .. } => DubError::Transcription { message, transient: retry },
            DubError::Translation { message, .. } => DubError::Translation { message, transient: retry },
            DubError::Tts { message, .. } => DubError::Tts { message, transient: retry },
            other => other,
        }
    }

    /// Network-facing failures that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DubError::Http(e) => is_transient_request(e),
            DubError::Download { transient, .. }
            | DubError::Transcription { transient, .. }
            | DubError::Translation { transient, .. }
            | DubError::Tts { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Connection and timeout failures; builder or decode errors are not
pub fn is_transient_request(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Server-side and throttling statuses; other client errors repeat
pub fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
}

pub type Result<T> = std::result::Result<T, DubError>;
