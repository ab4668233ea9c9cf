//! Error types for the Sentauri voice pipeline

use thiserror::Error;

/// Result type alias for Sentauri operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the provider fallback path
///
/// Provider calls report failures as [`crate::providers::ProviderFailure`]
/// values instead; this enum covers configuration, startup and I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Remote intent service error
    #[error("intent error: {0}")]
    Intent(String),

    /// Audio playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
