//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sentauri_voice::executor::{ActionExecutor, Execution, PageEditor};
use sentauri_voice::intent::{IntentService, RemoteIntent};
use sentauri_voice::playback::Playback;
use sentauri_voice::providers::{
    AudioClip, AudioHandle, FailureReason, ProviderFailure, ProviderResult, SpeechToText,
    TextToSpeech, Transcript, VoiceOptions,
};
use sentauri_voice::{Intent, Interpreter, Orchestrator, ProviderGateway};

/// Shared record of which providers were called, in order
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[must_use]
pub fn calls(log: &CallLog) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// Speech-to-text provider with a fixed answer
pub struct ScriptedStt {
    name: &'static str,
    answer: ProviderResult<String>,
    delay: Duration,
    log: CallLog,
}

impl ScriptedStt {
    pub fn hears(name: &'static str, text: &str, log: &CallLog) -> Arc<dyn SpeechToText> {
        Arc::new(Self {
            name,
            answer: Ok(text.to_string()),
            delay: Duration::ZERO,
            log: log.clone(),
        })
    }

    pub fn fails(name: &'static str, reason: FailureReason, log: &CallLog) -> Arc<dyn SpeechToText> {
        Arc::new(Self {
            name,
            answer: Err(ProviderFailure::new(reason, name, "scripted failure")),
            delay: Duration::ZERO,
            log: log.clone(),
        })
    }

    /// Answers after a delay, to hold the orchestrator in capture
    pub fn slow(name: &'static str, text: &str, delay: Duration, log: &CallLog) -> Arc<dyn SpeechToText> {
        Arc::new(Self {
            name,
            answer: Ok(text.to_string()),
            delay,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn transcribe(&self, _clip: &AudioClip) -> ProviderResult<Transcript> {
        self.log.lock().unwrap().push(self.name);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone().map(|text| Transcript {
            text,
            confidence: 0.9,
            provider: self.name,
        })
    }
}

/// Text-to-speech provider with a fixed answer
pub struct ScriptedTts {
    name: &'static str,
    failure: Option<FailureReason>,
    max_chars: usize,
    log: CallLog,
}

impl ScriptedTts {
    pub fn speaks(name: &'static str, log: &CallLog) -> Arc<dyn TextToSpeech> {
        Arc::new(Self {
            name,
            failure: None,
            max_chars: 4096,
            log: log.clone(),
        })
    }

    pub fn limited(name: &'static str, max_chars: usize, log: &CallLog) -> Arc<dyn TextToSpeech> {
        Arc::new(Self {
            name,
            failure: None,
            max_chars,
            log: log.clone(),
        })
    }

    pub fn fails(name: &'static str, reason: FailureReason, log: &CallLog) -> Arc<dyn TextToSpeech> {
        Arc::new(Self {
            name,
            failure: Some(reason),
            max_chars: 4096,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl TextToSpeech for ScriptedTts {
    fn name(&self) -> &'static str {
        self.name
    }

    fn max_input_chars(&self) -> usize {
        self.max_chars
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        self.log.lock().unwrap().push(self.name);
        match self.failure {
            Some(reason) => Err(ProviderFailure::new(reason, self.name, "scripted failure")),
            None => Ok(AudioHandle {
                bytes: text.as_bytes().to_vec(),
                mime: "audio/mpeg",
                provider: self.name,
            }),
        }
    }
}

/// Provider that panics mid-call
pub struct PanickingTts;

#[async_trait]
impl TextToSpeech for PanickingTts {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn max_input_chars(&self) -> usize {
        4096
    }

    async fn synthesize(&self, _text: &str, _voice: &VoiceOptions) -> ProviderResult<AudioHandle> {
        panic!("synthesizer crashed");
    }
}

/// Intent service that panics mid-request
pub struct PanickingIntentService;

#[async_trait]
impl IntentService for PanickingIntentService {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn parse(&self, _utterance: &str) -> sentauri_voice::Result<RemoteIntent> {
        panic!("intent service crashed");
    }
}

/// Executor that panics on every intent
pub struct PanickingExecutor;

impl ActionExecutor for PanickingExecutor {
    fn apply(&self, _intent: &Intent) -> Execution {
        panic!("executor crashed");
    }
}

/// Executor that records the intents it receives
#[derive(Default)]
pub struct RecordingExecutor {
    pub applied: Mutex<Vec<Intent>>,
}

impl ActionExecutor for RecordingExecutor {
    fn apply(&self, intent: &Intent) -> Execution {
        self.applied.lock().unwrap().push(intent.clone());
        Execution {
            confirmation: format!("Applied {}", intent.action),
            changed: true,
        }
    }
}

/// Playback that remembers which providers' audio it played
#[derive(Default)]
pub struct RecordingPlayback {
    pub played: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Playback for RecordingPlayback {
    async fn play(&self, audio: &AudioHandle) -> sentauri_voice::Result<()> {
        self.played.lock().unwrap().push(audio.provider);
        Ok(())
    }
}

/// Orchestrator over the given gateway editing a fresh page
#[must_use]
pub fn orchestrator_with(gateway: ProviderGateway) -> (Arc<Orchestrator>, Arc<PageEditor>) {
    let editor = Arc::new(PageEditor::default());
    let orchestrator = Orchestrator::new(gateway, Interpreter::local(), editor.clone(), 10);
    (Arc::new(orchestrator), editor)
}

#[must_use]
pub fn webm_clip() -> AudioClip {
    AudioClip::new(vec![0x1a, 0x45, 0xdf, 0xa3, 0, 0, 0, 0], "audio/webm")
}
