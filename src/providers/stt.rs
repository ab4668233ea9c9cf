//! Hosted speech-to-text providers

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{AudioClip, FailureReason, ProviderFailure, ProviderResult, SpeechToText, Transcript};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Whisper reports no confidence; the hosted model is treated as reliable
const WHISPER_CONFIDENCE: f32 = 0.95;

/// Bytes per second assumed when estimating clip duration (32 kbit/s)
const ESTIMATED_BYTES_PER_SECOND: f64 = 4_000.0;

fn estimated_minutes(clip: &AudioClip) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let bytes = clip.bytes.len() as f64;
    bytes / ESTIMATED_BYTES_PER_SECOND / 60.0
}

/// Response from `OpenAI` Whisper transcription API
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// `OpenAI` Whisper transcription
pub struct WhisperStt {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    language: Option<String>,
    temperature: f32,
}

impl WhisperStt {
    /// Create a Whisper provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for Whisper".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            language: Some("en".to_string()),
            temperature: 0.2,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    fn name(&self) -> &'static str {
        "whisper"
    }

    fn estimated_cost(&self, clip: &AudioClip) -> f64 {
        estimated_minutes(clip) * 0.006
    }

    async fn transcribe(&self, clip: &AudioClip) -> ProviderResult<Transcript> {
        let name = self.name();
        tracing::debug!(audio_bytes = clip.bytes.len(), mime = %clip.mime, "starting Whisper transcription");

        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name())
            .mime_str(clip.base_mime())
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("temperature", self.temperature.to_string());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(ProviderFailure::from_status(name, status, &body));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderFailure::new(FailureReason::NoSpeechDetected, name, "empty transcript"));
        }

        tracing::debug!(text_len = text.len(), "Whisper transcription complete");
        Ok(Transcript {
            text,
            confidence: WHISPER_CONFIDENCE,
            provider: name,
        })
    }
}

/// Response from Deepgram transcription API
#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Deepgram pre-recorded transcription
pub struct DeepgramStt {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl DeepgramStt {
    /// Create a Deepgram provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: DEEPGRAM_BASE_URL.to_string(),
            model: model.into(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    fn estimated_cost(&self, clip: &AudioClip) -> f64 {
        estimated_minutes(clip) * 0.0043
    }

    async fn transcribe(&self, clip: &AudioClip) -> ProviderResult<Transcript> {
        let name = self.name();
        tracing::debug!(audio_bytes = clip.bytes.len(), "starting Deepgram transcription");

        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[("model", self.model.as_str()), ("smart_format", "true")])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", clip.base_mime())
            .body(clip.bytes.clone())
            .send()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(ProviderFailure::from_status(name, status, &body));
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let best = result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next());

        match best {
            Some(alt) if !alt.transcript.trim().is_empty() => Ok(Transcript {
                text: alt.transcript.trim().to_string(),
                confidence: alt.confidence.unwrap_or(WHISPER_CONFIDENCE).clamp(0.0, 1.0),
                provider: name,
            }),
            _ => Err(ProviderFailure::new(FailureReason::NoSpeechDetected, name, "empty transcript")),
        }
    }
}
