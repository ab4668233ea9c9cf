//! Local speech synthesis through an installed engine
//!
//! Runs an `espeak-ng` compatible binary, feeding text on stdin and reading
//! the WAV it writes to a temporary file. No credentials, no cost.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    AudioHandle, FailureReason, OpenAiTts, ProviderFailure, ProviderResult, TextToSpeech, VoiceOptions,
};

/// Default speaking rate of espeak-ng in words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Synthesis with a local speech engine
#[derive(Debug, Clone)]
pub struct LocalTts {
    engine: PathBuf,
    voice: Option<String>,
}

impl LocalTts {
    /// Use the engine at an explicit path
    #[must_use]
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            voice: None,
        }
    }

    /// Locate `engine` on `PATH`
    ///
    /// Returns `None` when the binary is not installed, which removes the
    /// provider from the preference list.
    #[must_use]
    pub fn detect(engine: &str) -> Option<Self> {
        match which::which(engine) {
            Ok(path) => Some(Self::new(path)),
            Err(e) => {
                tracing::debug!(engine, error = %e, "local speech engine not found");
                None
            }
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }

    /// Path of the engine binary
    #[must_use]
    pub fn engine(&self) -> &Path {
        &self.engine
    }

    fn failure(&self, reason: FailureReason, detail: impl Into<String>) -> ProviderFailure {
        ProviderFailure::new(reason, self.name(), detail)
    }
}

#[async_trait]
impl TextToSpeech for LocalTts {
    fn name(&self) -> &'static str {
        "local"
    }

    fn max_input_chars(&self) -> usize {
        1000
    }

    async fn synthesize(&self, text: &str, voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        let output = tempfile::Builder::new()
            .prefix("sentauri-speech-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| self.failure(FailureReason::ProviderUnavailable, e.to_string()))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let wpm = (BASE_WORDS_PER_MINUTE * voice.speed.unwrap_or(1.0).clamp(0.5, 2.0)) as u32;

        let mut command = Command::new(&self.engine);
        command
            .arg("--stdin")
            .arg("-w")
            .arg(output.path())
            .arg("-s")
            .arg(wpm.to_string());
        // Hosted voice names mean nothing to the local engine
        let requested = voice
            .voice
            .as_ref()
            .filter(|v| !OpenAiTts::VOICES.contains(&v.as_str()));
        if let Some(v) = requested.or(self.voice.as_ref()) {
            command.arg("-v").arg(v);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(FailureReason::ProviderUnavailable, format!("spawn failed: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| self.failure(FailureReason::ProviderUnavailable, e.to_string()))?;
        }

        let result = child
            .wait_with_output()
            .await
            .map_err(|e| self.failure(FailureReason::ProviderUnavailable, e.to_string()))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::error!(status = %result.status, stderr = %stderr, "local speech engine failed");
            return Err(self.failure(
                FailureReason::ProviderUnavailable,
                format!("engine exited with {}", result.status),
            ));
        }

        let bytes = tokio::fs::read(output.path())
            .await
            .map_err(|e| self.failure(FailureReason::ProviderUnavailable, e.to_string()))?;

        let (sample_rate, samples) = {
            let reader = hound::WavReader::new(Cursor::new(bytes.as_slice())).map_err(|e| {
                self.failure(FailureReason::ProviderUnavailable, format!("invalid WAV: {e}"))
            })?;
            (reader.spec().sample_rate, reader.duration())
        };
        if samples == 0 {
            return Err(self.failure(FailureReason::ProviderUnavailable, "engine produced no audio"));
        }
        tracing::debug!(sample_rate, samples, "local synthesis complete");

        Ok(AudioHandle {
            bytes,
            mime: "audio/wav",
            provider: self.name(),
        })
    }
}
