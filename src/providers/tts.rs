//! Hosted text-to-speech providers

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{AudioHandle, FailureReason, ProviderFailure, ProviderResult, TextToSpeech, VoiceOptions};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// `OpenAI` speech request body
#[derive(Serialize)]
struct OpenAiSpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// `OpenAI` speech synthesis
pub struct OpenAiTts {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    voice: String,
    speed: f32,
}

impl OpenAiTts {
    /// Voices the speech endpoint accepts
    pub const VOICES: [&'static str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

    /// Create an `OpenAI` speech provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: impl Into<String>, voice: impl Into<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            voice: voice.into(),
            speed: 1.0,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Requested voice if the endpoint supports it, else the configured one
    fn pick_voice<'a>(&'a self, voice: &'a VoiceOptions) -> &'a str {
        match voice.voice.as_deref() {
            Some(v) if Self::VOICES.contains(&v) => v,
            _ => &self.voice,
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn max_input_chars(&self) -> usize {
        4096
    }

    fn estimated_cost(&self, text: &str) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let chars = text.chars().count() as f64;
        chars * 15.0 / 1_000_000.0
    }

    async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        let name = self.name();
        let request = OpenAiSpeechRequest {
            model: &self.model,
            input: text,
            voice: self.pick_voice(voice),
            speed: voice.speed.unwrap_or(self.speed).clamp(0.25, 4.0),
        };
        tracing::debug!(voice = request.voice, text_len = text.len(), "OpenAI speech request");

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI TTS API error");
            return Err(ProviderFailure::from_status(name, status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;
        if bytes.is_empty() {
            return Err(ProviderFailure::new(FailureReason::ProviderUnavailable, name, "empty audio"));
        }

        Ok(AudioHandle {
            bytes: bytes.to_vec(),
            mime: "audio/mpeg",
            provider: name,
        })
    }
}

/// `ElevenLabs` voice tuning
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

#[derive(Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// `ElevenLabs` speech synthesis
pub struct ElevenLabsTts {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    voice_id: String,
    settings: VoiceSettings,
}

impl ElevenLabsTts {
    /// Create an `ElevenLabs` provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: impl Into<String>, voice_id: impl Into<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("ElevenLabs API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: ELEVENLABS_BASE_URL.to_string(),
            model: model.into(),
            voice_id: voice_id.into(),
            settings: VoiceSettings::default(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Requested voice id, or the configured one
    ///
    /// The id becomes a URL path segment, so anything beyond
    /// `[A-Za-z0-9_-]` is refused.
    fn pick_voice<'a>(&'a self, voice: &'a VoiceOptions) -> &'a str {
        match voice.voice.as_deref() {
            // OpenAI voice names are not ElevenLabs voice ids
            Some(v) if OpenAiTts::VOICES.contains(&v) => &self.voice_id,
            Some(v) if is_voice_id(v) => v,
            Some(v) => {
                tracing::warn!(voice = v, "ignoring malformed ElevenLabs voice id");
                &self.voice_id
            }
            None => &self.voice_id,
        }
    }
}

fn is_voice_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn max_input_chars(&self) -> usize {
        1000
    }

    fn estimated_cost(&self, text: &str) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let chars = text.chars().count() as f64;
        chars * 0.30 / 1_000.0
    }

    async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        let name = self.name();
        let voice_id = self.pick_voice(voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: self.settings,
        };

        let response = self
            .client
            .post(format!("{}/v1/text-to-speech/{voice_id}", self.base_url))
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "ElevenLabs API error");
            return Err(ProviderFailure::from_status(name, status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderFailure::transport(name, &e))?;
        if bytes.is_empty() {
            return Err(ProviderFailure::new(FailureReason::ProviderUnavailable, name, "empty audio"));
        }

        Ok(AudioHandle {
            bytes: bytes.to_vec(),
            mime: "audio/mpeg",
            provider: name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_keys() {
        assert!(OpenAiTts::new(String::new(), "tts-1", "nova").is_err());
        assert!(ElevenLabsTts::new(String::new(), "eleven_monolingual_v1", "voice").is_err());
    }

    #[test]
    fn test_voice_selection() {
        let tts = OpenAiTts::new("sk-test".to_string(), "tts-1", "nova").unwrap();
        let shimmer = VoiceOptions {
            voice: Some("shimmer".to_string()),
            speed: None,
        };
        assert_eq!(tts.pick_voice(&shimmer), "shimmer");

        let foreign = VoiceOptions {
            voice: Some("qSV5UqvHBC0Widy71Esh".to_string()),
            speed: None,
        };
        assert_eq!(tts.pick_voice(&foreign), "nova");
    }

    #[test]
    fn test_elevenlabs_voice_id_stays_in_path() {
        let tts =
            ElevenLabsTts::new("xi-test".to_string(), "eleven_monolingual_v1", "voice-1").unwrap();
        let pick = |id: &str| {
            let options = VoiceOptions {
                voice: Some(id.to_string()),
                speed: None,
            };
            tts.pick_voice(&options).to_string()
        };

        assert_eq!(pick("qSV5UqvHBC0Widy71Esh"), "qSV5UqvHBC0Widy71Esh");
        assert_eq!(pick("custom_voice-2"), "custom_voice-2");
        assert_eq!(pick("nova"), "voice-1");
        assert_eq!(pick("../../v1/user"), "voice-1");
        assert_eq!(pick("abc?x=1"), "voice-1");
        assert_eq!(pick("a%2Fb"), "voice-1");
        assert_eq!(pick(""), "voice-1");
        assert_eq!(tts.pick_voice(&VoiceOptions::default()), "voice-1");
    }

    #[test]
    fn test_limits_and_costs() {
        let openai = OpenAiTts::new("sk-test".to_string(), "tts-1", "nova").unwrap();
        let eleven = ElevenLabsTts::new("xi-test".to_string(), "eleven_monolingual_v1", "v").unwrap();
        assert_eq!(openai.max_input_chars(), 4096);
        assert_eq!(eleven.max_input_chars(), 1000);
        assert!(eleven.estimated_cost("hello") > openai.estimated_cost("hello"));
    }
}
