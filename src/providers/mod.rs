//! Speech providers and the fallback gateway
//!
//! Every backend implements one of two capability traits,
//! [`SpeechToText`] or [`TextToSpeech`]. Calls never return
//! [`crate::Error`]; they return a [`ProviderResult`] whose failure side is
//! a [`ProviderFailure`] tagged with a [`FailureReason`], so the
//! [`ProviderGateway`] can move down its preference list without treating
//! failures as exceptional.

pub mod budget;
pub mod gateway;
pub mod local;
pub mod stt;
pub mod tts;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

pub use budget::BudgetGuard;
pub use gateway::ProviderGateway;
pub use local::LocalTts;
pub use stt::{DeepgramStt, WhisperStt};
pub use tts::{ElevenLabsTts, OpenAiTts};

/// Why a provider call (or a whole capability) failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoSpeechDetected,
    ProviderUnauthorized,
    ProviderRateLimited,
    ProviderUnavailable,
    InputTooLong,
    AllProvidersExhausted,
    MicrophoneUnavailable,
    UnknownIntent,
}

impl FailureReason {
    /// Stable identifier for logs and API bodies
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSpeechDetected => "no_speech_detected",
            Self::ProviderUnauthorized => "provider_unauthorized",
            Self::ProviderRateLimited => "provider_rate_limited",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::InputTooLong => "input_too_long",
            Self::AllProvidersExhausted => "all_providers_exhausted",
            Self::MicrophoneUnavailable => "microphone_unavailable",
            Self::UnknownIntent => "unknown_intent",
        }
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::ProviderUnauthorized,
            StatusCode::TOO_MANY_REQUESTS => Self::ProviderRateLimited,
            StatusCode::PAYLOAD_TOO_LARGE => Self::InputTooLong,
            _ => Self::ProviderUnavailable,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a provider or by the gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct ProviderFailure {
    pub reason: FailureReason,
    /// Provider that failed; `None` for gateway-level outcomes
    pub provider: Option<&'static str>,
    pub detail: String,
}

impl ProviderFailure {
    #[must_use]
    pub fn new(reason: FailureReason, provider: &'static str, detail: impl Into<String>) -> Self {
        Self {
            reason,
            provider: Some(provider),
            detail: detail.into(),
        }
    }

    /// Gateway-level failure not tied to one provider
    #[must_use]
    pub fn terminal(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            provider: None,
            detail: detail.into(),
        }
    }

    /// Failure from a non-success HTTP response
    #[must_use]
    pub fn from_status(provider: &'static str, status: StatusCode, body: &str) -> Self {
        let reason = FailureReason::from_status(status);
        let body: String = body.chars().take(200).collect();
        Self::new(reason, provider, format!("HTTP {status}: {body}"))
    }

    /// Failure from a transport or decoding error
    #[must_use]
    pub fn transport(provider: &'static str, error: &reqwest::Error) -> Self {
        Self::new(FailureReason::ProviderUnavailable, provider, error.to_string())
    }
}

/// Result of a provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderFailure>;

/// Recorded audio awaiting transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioClip {
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Whether the MIME type is a format hosted transcription accepts
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(
            self.base_mime(),
            "audio/mpeg"
                | "audio/mp3"
                | "audio/mp4"
                | "audio/m4a"
                | "audio/wav"
                | "audio/x-wav"
                | "audio/webm"
                | "audio/ogg"
                | "audio/flac"
        )
    }

    /// File name with an extension matching the MIME type
    #[must_use]
    pub fn file_name(&self) -> String {
        let ext = match self.base_mime() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/mp4" | "audio/m4a" => "m4a",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/flac" => "flac",
            _ => "webm",
        };
        format!("audio.{ext}")
    }

    /// MIME type without parameters such as `;codecs=opus`
    #[must_use]
    pub fn base_mime(&self) -> &str {
        self.mime.split(';').next().unwrap_or_default().trim()
    }
}

/// Transcription produced by a provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    /// Provider confidence in `[0, 1]`
    pub confidence: f32,
    pub provider: &'static str,
}

/// Voice selection for a synthesis call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceOptions {
    /// Provider-specific voice identifier, overriding the configured one
    pub voice: Option<String>,
    /// Speaking rate multiplier
    pub speed: Option<f32>,
}

/// Synthesized, playable audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub provider: &'static str,
}

/// Speech-to-text capability
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider name for logging and preference lists
    fn name(&self) -> &'static str;

    /// Estimated cost in USD of transcribing the clip
    fn estimated_cost(&self, _clip: &AudioClip) -> f64 {
        0.0
    }

    /// Transcribe recorded audio
    async fn transcribe(&self, clip: &AudioClip) -> ProviderResult<Transcript>;
}

/// Text-to-speech capability
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Provider name for logging and preference lists
    fn name(&self) -> &'static str;

    /// Longest input in characters the provider accepts
    fn max_input_chars(&self) -> usize;

    /// Estimated cost in USD of synthesizing the text
    fn estimated_cost(&self, _text: &str) -> f64 {
        0.0
    }

    /// Synthesize speech
    async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ProviderResult<AudioHandle>;
}

/// Which capability a provider offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SpeechToText,
    TextToSpeech,
}

/// Configurable provider identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Whisper,
    Deepgram,
    OpenAi,
    ElevenLabs,
    Local,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whisper => "whisper",
            Self::Deepgram => "deepgram",
            Self::OpenAi => "openai",
            Self::ElevenLabs => "elevenlabs",
            Self::Local => "local",
        }
    }

    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::Whisper | Self::Deepgram => Capability::SpeechToText,
            Self::OpenAi | Self::ElevenLabs | Self::Local => Capability::TextToSpeech,
        }
    }

    /// Parse a comma-separated preference list, skipping unknown names
    #[must_use]
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|name| match name.parse() {
                Ok(kind) => Some(kind),
                Err(()) => {
                    tracing::warn!(provider = name, "unknown provider in preference list, skipping");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            "openai" | "openai-tts" => Ok(Self::OpenAi),
            "elevenlabs" | "eleven-labs" => Ok(Self::ElevenLabs),
            "local" | "espeak" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}
