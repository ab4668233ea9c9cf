//! Ordered provider fallback
//!
//! Providers are tried strictly in preference order, one call at a time.
//! A failure moves on to the next distinct provider; nothing is retried.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::{
    AudioClip, AudioHandle, BudgetGuard, DeepgramStt, ElevenLabsTts, FailureReason, LocalTts,
    OpenAiTts, ProviderFailure, ProviderKind, ProviderResult, SpeechToText, TextToSpeech,
    Transcript, VoiceOptions, WhisperStt,
};
use crate::config::Config;
use crate::providers::tts::VoiceSettings;

/// Uniform STT/TTS front over ordered provider lists
#[derive(Clone, Default)]
pub struct ProviderGateway {
    stt: Vec<Arc<dyn SpeechToText>>,
    tts: Vec<Arc<dyn TextToSpeech>>,
    budget: Arc<BudgetGuard>,
}

impl ProviderGateway {
    /// Gateway over explicit provider lists, most preferred first
    #[must_use]
    pub fn new(stt: Vec<Arc<dyn SpeechToText>>, tts: Vec<Arc<dyn TextToSpeech>>) -> Self {
        Self {
            stt,
            tts,
            budget: Arc::new(BudgetGuard::unlimited()),
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Arc<BudgetGuard>) -> Self {
        self.budget = budget;
        self
    }

    /// Build the effective provider lists from configuration
    ///
    /// Providers are kept in the configured order; those whose credentials
    /// (or, for the local engine, binary) are missing are dropped.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let stt = config
            .providers
            .stt
            .iter()
            .filter_map(|kind| build_stt(*kind, config))
            .collect();
        let tts = config
            .providers
            .tts
            .iter()
            .filter_map(|kind| build_tts(*kind, config))
            .collect();

        let gateway = Self::new(stt, tts).with_budget(Arc::new(BudgetGuard::new(
            config.budget.daily_usd,
            config.budget.monthly_usd,
        )));

        tracing::info!(
            stt = ?gateway.stt_names(),
            tts = ?gateway.tts_names(),
            "provider preferences"
        );
        gateway
    }

    /// Effective STT order
    #[must_use]
    pub fn stt_names(&self) -> Vec<&'static str> {
        self.stt.iter().map(|p| p.name()).collect()
    }

    /// Effective TTS order
    #[must_use]
    pub fn tts_names(&self) -> Vec<&'static str> {
        self.tts.iter().map(|p| p.name()).collect()
    }

    /// Whether any STT provider is available
    #[must_use]
    pub fn has_stt(&self) -> bool {
        !self.stt.is_empty()
    }

    /// Whether any TTS provider is available
    #[must_use]
    pub fn has_tts(&self) -> bool {
        !self.tts.is_empty()
    }

    /// Shared spend ledger
    #[must_use]
    pub fn budget(&self) -> &BudgetGuard {
        &self.budget
    }

    /// Transcribe with the first provider that succeeds
    ///
    /// When every provider heard nothing the result is
    /// [`FailureReason::NoSpeechDetected`]; any other combination of
    /// failures is [`FailureReason::AllProvidersExhausted`].
    pub async fn transcribe(&self, clip: &AudioClip) -> ProviderResult<Transcript> {
        if clip.bytes.is_empty() {
            return Err(ProviderFailure::terminal(FailureReason::NoSpeechDetected, "empty recording"));
        }

        let mut failures = Vec::new();
        for provider in &self.stt {
            let name = provider.name();
            let cost = provider.estimated_cost(clip);
            let Some(reservation) = self.budget.reserve(cost) else {
                failures.push(budget_failure(name));
                continue;
            };

            let outcome = AssertUnwindSafe(provider.transcribe(clip))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(panic_failure(name)));

            match outcome {
                Ok(transcript) => {
                    tracing::debug!(provider = name, confidence = transcript.confidence, "transcribed");
                    return Ok(transcript);
                }
                Err(failure) => {
                    self.budget.refund(reservation);
                    log_failure(&failure);
                    failures.push(failure);
                }
            }
        }

        let all_silent = !failures.is_empty()
            && failures.iter().all(|f| f.reason == FailureReason::NoSpeechDetected);
        if all_silent {
            return Err(ProviderFailure::terminal(FailureReason::NoSpeechDetected, "no speech in recording"));
        }
        Err(exhausted("speech-to-text", &failures))
    }

    /// Synthesize with the first provider that succeeds
    pub async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        let length = text.chars().count();
        let mut failures = Vec::new();

        for provider in &self.tts {
            let name = provider.name();
            if length > provider.max_input_chars() {
                let failure = ProviderFailure::new(
                    FailureReason::InputTooLong,
                    name,
                    format!("{length} characters exceeds limit of {}", provider.max_input_chars()),
                );
                log_failure(&failure);
                failures.push(failure);
                continue;
            }

            let cost = provider.estimated_cost(text);
            let Some(reservation) = self.budget.reserve(cost) else {
                failures.push(budget_failure(name));
                continue;
            };

            let outcome = AssertUnwindSafe(provider.synthesize(text, voice))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(panic_failure(name)));

            match outcome {
                Ok(audio) => {
                    tracing::debug!(provider = name, bytes = audio.bytes.len(), "synthesized");
                    return Ok(audio);
                }
                Err(failure) => {
                    self.budget.refund(reservation);
                    log_failure(&failure);
                    failures.push(failure);
                }
            }
        }

        Err(exhausted("text-to-speech", &failures))
    }
}

fn log_failure(failure: &ProviderFailure) {
    tracing::warn!(
        provider = failure.provider.unwrap_or("unknown"),
        reason = %failure.reason,
        detail = %failure.detail,
        "provider failed, trying next"
    );
}

fn budget_failure(provider: &'static str) -> ProviderFailure {
    tracing::warn!(provider, "budget ceiling reached, skipping provider");
    ProviderFailure::new(FailureReason::ProviderRateLimited, provider, "budget ceiling reached")
}

fn panic_failure(provider: &'static str) -> ProviderFailure {
    tracing::error!(provider, "provider panicked");
    ProviderFailure::new(FailureReason::ProviderUnavailable, provider, "provider panicked")
}

fn exhausted(capability: &str, failures: &[ProviderFailure]) -> ProviderFailure {
    let detail = if failures.is_empty() {
        format!("no {capability} providers configured")
    } else {
        failures
            .iter()
            .map(|f| format!("{}: {}", f.provider.unwrap_or("unknown"), f.reason))
            .collect::<Vec<_>>()
            .join(", ")
    };
    tracing::error!(capability, detail = %detail, "all providers exhausted");
    ProviderFailure::terminal(FailureReason::AllProvidersExhausted, detail)
}

fn key(value: Option<&String>, kind: ProviderKind) -> Option<String> {
    let key = value.filter(|k| !k.is_empty()).cloned();
    if key.is_none() {
        tracing::info!(provider = %kind, "no credentials, provider disabled");
    }
    key
}

fn build_stt(kind: ProviderKind, config: &Config) -> Option<Arc<dyn SpeechToText>> {
    let voice = &config.voice;
    let built = match kind {
        ProviderKind::Whisper => key(config.api_keys.openai.as_ref(), kind).map(|k| {
            WhisperStt::new(k, voice.whisper_model.clone()).map(|p| {
                Arc::new(
                    p.with_language(voice.language.clone())
                        .with_temperature(voice.stt_temperature),
                ) as Arc<dyn SpeechToText>
            })
        }),
        ProviderKind::Deepgram => key(config.api_keys.deepgram.as_ref(), kind).map(|k| {
            DeepgramStt::new(k, voice.deepgram_model.clone())
                .map(|p| Arc::new(p) as Arc<dyn SpeechToText>)
        }),
        ProviderKind::OpenAi | ProviderKind::ElevenLabs | ProviderKind::Local => None,
    };

    match built? {
        Ok(provider) => Some(provider),
        Err(e) => {
            tracing::warn!(provider = %kind, error = %e, "failed to create provider");
            None
        }
    }
}

fn build_tts(kind: ProviderKind, config: &Config) -> Option<Arc<dyn TextToSpeech>> {
    let voice = &config.voice;
    let built = match kind {
        ProviderKind::OpenAi => key(config.api_keys.openai.as_ref(), kind).map(|k| {
            OpenAiTts::new(k, voice.openai_model.clone(), voice.openai_voice.clone())
                .map(|p| Arc::new(p.with_speed(voice.speed)) as Arc<dyn TextToSpeech>)
        }),
        ProviderKind::ElevenLabs => key(config.api_keys.elevenlabs.as_ref(), kind).map(|k| {
            ElevenLabsTts::new(k, voice.elevenlabs_model.clone(), voice.elevenlabs_voice.clone())
                .map(|p| {
                    Arc::new(p.with_settings(VoiceSettings {
                        stability: voice.stability,
                        similarity_boost: voice.similarity_boost,
                    })) as Arc<dyn TextToSpeech>
                })
        }),
        ProviderKind::Local => {
            let Some(local) = LocalTts::detect(&voice.local_engine) else {
                tracing::info!(engine = %voice.local_engine, "local speech engine missing, provider disabled");
                return None;
            };
            Some(Ok(Arc::new(local.with_voice(voice.local_voice.clone())) as Arc<dyn TextToSpeech>))
        }
        ProviderKind::Whisper | ProviderKind::Deepgram => None,
    };

    match built? {
        Ok(provider) => Some(provider),
        Err(e) => {
            tracing::warn!(provider = %kind, error = %e, "failed to create provider");
            None
        }
    }
}
