//! Command orchestration
//!
//! Drives one utterance at a time through
//! `Idle → Capturing → Interpreting → Executing → Responding → Idle`.
//!
//! The stage lives in a `watch` channel and is claimed with
//! `send_if_modified`, so two concurrent requests can never both leave
//! `Idle`. Every path (provider failure, unknown intent, a panicking
//! executor) still produces exactly one assistant entry and ends in `Idle`.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinError;

use crate::executor::ActionExecutor;
use crate::intent::{Intent, IntentSource, Interpreter};
use crate::playback::{Detached, Playback};
use crate::providers::{
    AudioClip, AudioHandle, FailureReason, ProviderFailure, ProviderGateway, ProviderResult,
    VoiceOptions,
};
use crate::session::{
    ConversationEntry, ConversationLog, SessionEvent, SessionState, Stage, UtteranceSource,
};

/// Event channel capacity
const EVENT_CAPACITY: usize = 64;

const WELCOME: &str = "Welcome to Sentauri Voice! I'm ready to help you edit this website using voice commands. Click the avatar or button to start speaking.";

/// Raw input of one utterance
#[derive(Debug, Clone)]
pub enum Input {
    /// Already-transcribed or typed text
    Text(String),
    /// Recorded audio that still needs transcription
    Audio(AudioClip),
}

/// Another utterance is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("an utterance is already in flight (stage {stage:?})")]
pub struct Busy {
    pub stage: Stage,
}

/// Answer to a start-capture request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureStart {
    /// Capture began for a new utterance
    Started { utterance: u64 },
    /// A capture was already running and has been stopped
    Stopped { utterance: u64 },
    /// Another utterance is being processed
    Ignored { stage: Stage },
    /// No speech-to-text provider, answered with a fallback message
    Unavailable { outcome: Box<CycleOutcome> },
}

/// Everything one cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub utterance: u64,
    pub source: UtteranceSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_source: Option<IntentSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_confirmation: Option<String>,
    /// Text appended to the conversation and spoken back
    pub response: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Spoken response, absent when every TTS provider failed
    #[serde(skip)]
    pub audio: Option<AudioHandle>,
}

impl CycleOutcome {
    fn new(utterance: u64, source: UtteranceSource, response: impl Into<String>) -> Self {
        Self {
            utterance,
            source,
            transcript: None,
            intent: None,
            intent_source: None,
            remote_confirmation: None,
            response: response.into(),
            success: true,
            failure: None,
            audio: None,
        }
    }

    fn failed(mut self, failure: Option<FailureReason>) -> Self {
        self.success = false;
        self.failure = failure;
        self
    }
}

/// Single-flight coordinator for one session
pub struct Orchestrator {
    gateway: ProviderGateway,
    interpreter: Interpreter,
    executor: Arc<dyn ActionExecutor>,
    playback: Arc<dyn Playback>,
    voice: VoiceOptions,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    log: Mutex<ConversationLog>,
    next_utterance: AtomicU64,
}

impl Orchestrator {
    /// Create an idle orchestrator and greet the user
    #[must_use]
    pub fn new(
        gateway: ProviderGateway,
        interpreter: Interpreter,
        executor: Arc<dyn ActionExecutor>,
        history_limit: usize,
    ) -> Self {
        let initial = SessionState {
            stt_providers: gateway.stt_names(),
            tts_providers: gateway.tts_names(),
            ..SessionState::default()
        };
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut log = ConversationLog::new(history_limit);
        log.push(ConversationEntry::assistant(WELCOME, true));

        Self {
            gateway,
            interpreter,
            executor,
            playback: Arc::new(Detached),
            voice: VoiceOptions::default(),
            state,
            events,
            log: Mutex::new(log),
            next_utterance: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_playback(mut self, playback: Arc<dyn Playback>) -> Self {
        self.playback = playback;
        self
    }

    #[must_use]
    pub fn with_voice(mut self, voice: VoiceOptions) -> Self {
        self.voice = voice;
        self
    }

    #[must_use]
    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    #[must_use]
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Voice used for spoken responses
    #[must_use]
    pub fn voice(&self) -> &VoiceOptions {
        &self.voice
    }

    /// Current session flags
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observe session flags
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Observe stage changes, speech and conversation entries
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Conversation so far, oldest first
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).entries()
    }

    /// User pressed the microphone button
    ///
    /// Starts capture from `Idle`, stops a capture that is still listening,
    /// and is ignored while an utterance is being processed.
    pub async fn begin_capture(self: &Arc<Self>, source: UtteranceSource) -> CaptureStart {
        let needs_stt = source == UtteranceSource::RecordedAudio;
        let microphone_ready = !needs_stt || self.gateway.has_stt();

        let mut answer = None;
        self.state.send_if_modified(|s| match s.stage {
            Stage::Idle if microphone_ready => {
                let utterance = self.allocate();
                s.stage = Stage::Capturing;
                s.utterance = Some(utterance);
                s.is_listening = true;
                answer = Some(CaptureStart::Started { utterance });
                true
            }
            Stage::Idle => false,
            Stage::Capturing if s.is_listening => {
                answer = Some(CaptureStart::Stopped {
                    utterance: s.utterance.unwrap_or_default(),
                });
                s.stage = Stage::Idle;
                s.utterance = None;
                s.is_listening = false;
                true
            }
            stage => {
                answer = Some(CaptureStart::Ignored { stage });
                false
            }
        });

        match answer {
            Some(CaptureStart::Started { utterance }) => {
                tracing::debug!(utterance, ?source, "capture started");
                self.emit(SessionEvent::Stage {
                    stage: Stage::Capturing,
                    utterance: Some(utterance),
                });
                CaptureStart::Started { utterance }
            }
            Some(CaptureStart::Stopped { utterance }) => {
                tracing::debug!(utterance, "capture stopped");
                self.emit(SessionEvent::Stage {
                    stage: Stage::Idle,
                    utterance: None,
                });
                CaptureStart::Stopped { utterance }
            }
            Some(ignored) => {
                tracing::debug!(?source, "capture request ignored, utterance in flight");
                ignored
            }
            None => self.microphone_unavailable(source).await,
        }
    }

    /// Abandon a capture that has not delivered its input yet
    ///
    /// Returns whether a capture was cancelled. Processing already under
    /// way is never interrupted.
    pub fn cancel_capture(&self) -> bool {
        let mut cancelled = None;
        self.state.send_if_modified(|s| {
            if s.stage == Stage::Capturing && s.is_listening {
                cancelled = s.utterance;
                s.stage = Stage::Idle;
                s.utterance = None;
                s.is_listening = false;
                true
            } else {
                false
            }
        });

        if let Some(utterance) = cancelled {
            tracing::debug!(utterance, "capture cancelled");
            self.emit(SessionEvent::Stage {
                stage: Stage::Idle,
                utterance: None,
            });
        }
        cancelled.is_some()
    }

    /// Run one full cycle for typed text
    ///
    /// # Errors
    ///
    /// Returns [`Busy`] if another utterance is in flight
    pub async fn process_text(self: &Arc<Self>, text: &str) -> Result<CycleOutcome, Busy> {
        self.submit(UtteranceSource::Typed, Input::Text(text.to_string()))
            .await
    }

    /// Deliver input for the listening capture, or start and finish a new one
    ///
    /// The cycle runs on its own task, so it reaches `Idle` even when the
    /// caller stops waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`] if another utterance is already past capture
    pub async fn submit(
        self: &Arc<Self>,
        source: UtteranceSource,
        input: Input,
    ) -> Result<CycleOutcome, Busy> {
        let utterance = self.claim()?;
        let this = Arc::clone(self);
        let cycle = tokio::spawn(async move { this.run_cycle(utterance, source, input).await });
        Ok(match cycle.await {
            Ok(outcome) => outcome,
            Err(e) => self.abandon(utterance, source, &e),
        })
    }

    fn allocate(&self) -> u64 {
        self.next_utterance.fetch_add(1, Ordering::Relaxed)
    }

    /// Take ownership of the capture stage for one utterance
    fn claim(&self) -> Result<u64, Busy> {
        let mut claimed = None;
        let mut current = Stage::Idle;
        self.state.send_if_modified(|s| {
            current = s.stage;
            match (s.stage, s.utterance) {
                (Stage::Idle, _) => {
                    let utterance = self.allocate();
                    s.stage = Stage::Capturing;
                    s.utterance = Some(utterance);
                    claimed = Some((utterance, true));
                    true
                }
                (Stage::Capturing, Some(utterance)) if s.is_listening => {
                    s.is_listening = false;
                    claimed = Some((utterance, false));
                    true
                }
                _ => false,
            }
        });

        match claimed {
            Some((utterance, fresh)) => {
                if fresh {
                    self.emit(SessionEvent::Stage {
                        stage: Stage::Capturing,
                        utterance: Some(utterance),
                    });
                }
                Ok(utterance)
            }
            None => {
                tracing::debug!(stage = ?current, "rejected utterance, orchestrator busy");
                Err(Busy { stage: current })
            }
        }
    }

    async fn microphone_unavailable(self: &Arc<Self>, source: UtteranceSource) -> CaptureStart {
        match self.claim() {
            Ok(utterance) => {
                tracing::warn!(utterance, "no speech-to-text provider, cannot capture audio");
                let outcome = CycleOutcome::new(
                    utterance,
                    source,
                    capture_failure_message(FailureReason::MicrophoneUnavailable),
                )
                .failed(Some(FailureReason::MicrophoneUnavailable));
                let this = Arc::clone(self);
                let reply = tokio::spawn(async move { this.respond(outcome).await });
                let outcome = match reply.await {
                    Ok(outcome) => outcome,
                    Err(e) => self.abandon(utterance, source, &e),
                };
                CaptureStart::Unavailable {
                    outcome: Box::new(outcome),
                }
            }
            Err(busy) => CaptureStart::Ignored { stage: busy.stage },
        }
    }

    /// Close out a cycle whose task died before responding
    fn abandon(&self, utterance: u64, source: UtteranceSource, error: &JoinError) -> CycleOutcome {
        tracing::error!(utterance, error = %error, "command cycle aborted");
        let outcome = CycleOutcome::new(
            utterance,
            source,
            "Sorry, something went wrong. Please try again.",
        )
        .failed(None);
        self.record(ConversationEntry::assistant(outcome.response.clone(), false));
        self.reset();
        outcome
    }

    fn reset(&self) {
        self.state.send_modify(|s| {
            s.stage = Stage::Idle;
            s.utterance = None;
            s.is_listening = false;
            s.is_speaking = false;
        });
        self.emit(SessionEvent::Stage {
            stage: Stage::Idle,
            utterance: None,
        });
    }

    async fn run_cycle(&self, utterance: u64, source: UtteranceSource, input: Input) -> CycleOutcome {
        let transcript = match self.capture_text(input).await {
            Ok(text) => text,
            Err(failure) => {
                tracing::warn!(utterance, reason = %failure.reason, detail = %failure.detail, "capture failed");
                let outcome =
                    CycleOutcome::new(utterance, source, capture_failure_message(failure.reason))
                        .failed(Some(failure.reason));
                return self.respond(outcome).await;
            }
        };

        self.record(ConversationEntry::user(transcript.clone()));
        self.transition(Stage::Interpreting, utterance);

        let interpreted = AssertUnwindSafe(self.interpreter.interpret(&transcript))
            .catch_unwind()
            .await;
        let Ok(interpretation) = interpreted else {
            tracing::error!(utterance, "interpretation panicked");
            let mut outcome = CycleOutcome::new(
                utterance,
                source,
                "Sorry, something went wrong while understanding that. Please try again.",
            )
            .failed(None);
            outcome.transcript = Some(transcript);
            return self.respond(outcome).await;
        };

        self.transition(Stage::Executing, utterance);
        let intent = interpretation.intent;
        tracing::info!(utterance, action = %intent.action, source = ?interpretation.source, "intent resolved");

        let mut outcome = if intent.is_actionable() {
            let executor = &self.executor;
            match std::panic::catch_unwind(AssertUnwindSafe(|| executor.apply(&intent))) {
                Ok(execution) => CycleOutcome::new(utterance, source, execution.confirmation),
                Err(_) => {
                    tracing::error!(utterance, action = %intent.action, "executor panicked");
                    CycleOutcome::new(
                        utterance,
                        source,
                        "Sorry, something went wrong while applying that change.",
                    )
                    .failed(None)
                }
            }
        } else {
            tracing::debug!(utterance, missing = ?intent.missing_fields(), "intent needs clarification");
            CycleOutcome::new(utterance, source, intent.clarification())
                .failed(Some(FailureReason::UnknownIntent))
        };

        outcome.transcript = Some(transcript);
        outcome.intent = Some(intent);
        outcome.intent_source = Some(interpretation.source);
        outcome.remote_confirmation = interpretation.remote_confirmation;
        self.respond(outcome).await
    }

    async fn capture_text(&self, input: Input) -> ProviderResult<String> {
        match input {
            Input::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ProviderFailure::terminal(
                        FailureReason::NoSpeechDetected,
                        "empty command",
                    ));
                }
                Ok(text.to_string())
            }
            Input::Audio(clip) => {
                if !self.gateway.has_stt() {
                    return Err(ProviderFailure::terminal(
                        FailureReason::MicrophoneUnavailable,
                        "no speech-to-text provider configured",
                    ));
                }
                let transcript = self.gateway.transcribe(&clip).await?;
                tracing::debug!(
                    provider = transcript.provider,
                    confidence = transcript.confidence,
                    "audio transcribed"
                );
                Ok(transcript.text)
            }
        }
    }

    /// Append the assistant entry, speak it, and return to `Idle`
    async fn respond(&self, mut outcome: CycleOutcome) -> CycleOutcome {
        self.transition(Stage::Responding, outcome.utterance);
        self.record(ConversationEntry::assistant(
            outcome.response.clone(),
            outcome.success,
        ));
        outcome.audio = self.speak(outcome.utterance, &outcome.response).await;

        self.reset();
        tracing::debug!(utterance = outcome.utterance, success = outcome.success, "cycle complete");
        outcome
    }

    async fn speak(&self, utterance: u64, text: &str) -> Option<AudioHandle> {
        if !self.gateway.has_tts() {
            return None;
        }

        self.state.send_modify(|s| s.is_speaking = true);
        let audio = match self.gateway.synthesize(text, &self.voice).await {
            Ok(audio) => {
                self.emit(SessionEvent::SpeakingStarted {
                    utterance,
                    provider: audio.provider,
                });
                match AssertUnwindSafe(self.playback.play(&audio)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(utterance, error = %e, "playback failed"),
                    Err(_) => tracing::error!(utterance, "playback panicked"),
                }
                self.emit(SessionEvent::SpeakingFinished { utterance });
                Some(audio)
            }
            Err(failure) => {
                tracing::warn!(
                    utterance,
                    reason = %failure.reason,
                    detail = %failure.detail,
                    "speech synthesis failed, responding with text only"
                );
                None
            }
        };
        self.state.send_modify(|s| s.is_speaking = false);
        audio
    }

    fn transition(&self, stage: Stage, utterance: u64) {
        self.state.send_modify(|s| s.stage = stage);
        tracing::debug!(utterance, ?stage, "stage");
        self.emit(SessionEvent::Stage {
            stage,
            utterance: Some(utterance),
        });
    }

    fn record(&self, entry: ConversationEntry) {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        self.emit(SessionEvent::Entry { entry });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn capture_failure_message(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::NoSpeechDetected => "I didn't hear anything. Please try again.",
        FailureReason::MicrophoneUnavailable => {
            "Voice input isn't available right now. Please type your command instead."
        }
        _ => "Sorry, I couldn't transcribe that. Please try again or type your command.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PageEditor;
    use crate::session::Role;

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            ProviderGateway::default(),
            Interpreter::local(),
            Arc::new(PageEditor::default()),
            10,
        ))
    }

    #[test]
    fn test_starts_idle_with_welcome() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.state().stage, Stage::Idle);
        let log = orchestrator.conversation();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_typed_title_cycle() {
        let orchestrator = orchestrator();
        let outcome = orchestrator
            .process_text("change the title to Hello World")
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.response.contains("Hello World"));
        assert!(outcome.audio.is_none());
        assert_eq!(orchestrator.state().stage, Stage::Idle);

        let log = orchestrator.conversation();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].text, "change the title to Hello World");
        assert_eq!(log[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_unknown_command_asks_for_clarification() {
        let orchestrator = orchestrator();
        let outcome = orchestrator.process_text("make me a sandwich").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureReason::UnknownIntent));
        assert!(outcome.response.contains("didn't quite understand"));
    }

    #[tokio::test]
    async fn test_empty_text_is_no_speech() {
        let orchestrator = orchestrator();
        let outcome = orchestrator.process_text("   ").await.unwrap();
        assert_eq!(outcome.failure, Some(FailureReason::NoSpeechDetected));
        assert!(outcome.transcript.is_none());
        // welcome + one assistant reply, no user entry
        assert_eq!(orchestrator.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_second_start_stops_capture() {
        let orchestrator = orchestrator();
        let started = orchestrator.begin_capture(UtteranceSource::Typed).await;
        assert!(matches!(started, CaptureStart::Started { .. }));
        assert!(orchestrator.state().is_listening);

        let stopped = orchestrator.begin_capture(UtteranceSource::Typed).await;
        assert!(matches!(stopped, CaptureStart::Stopped { .. }));
        assert_eq!(orchestrator.state().stage, Stage::Idle);
        assert_eq!(orchestrator.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_completes_listening_capture() {
        let orchestrator = orchestrator();
        let CaptureStart::Started { utterance } =
            orchestrator.begin_capture(UtteranceSource::BrowserSpeech).await
        else {
            panic!("capture should start");
        };

        let outcome = orchestrator
            .submit(UtteranceSource::BrowserSpeech, Input::Text("add a feature".into()))
            .await
            .unwrap();
        assert_eq!(outcome.utterance, utterance);
        assert_eq!(orchestrator.state().stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_recorded_audio_without_stt() {
        let orchestrator = orchestrator();
        let CaptureStart::Unavailable { outcome } =
            orchestrator.begin_capture(UtteranceSource::RecordedAudio).await
        else {
            panic!("expected unavailable");
        };
        assert_eq!(outcome.failure, Some(FailureReason::MicrophoneUnavailable));
        assert_eq!(orchestrator.state().stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_cancel_only_while_listening() {
        let orchestrator = orchestrator();
        assert!(!orchestrator.cancel_capture());
        orchestrator.begin_capture(UtteranceSource::Typed).await;
        assert!(orchestrator.cancel_capture());
        assert_eq!(orchestrator.state().stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_utterance_ids_increase() {
        let orchestrator = orchestrator();
        let first = orchestrator.process_text("help").await.unwrap();
        let second = orchestrator.process_text("help").await.unwrap();
        assert!(second.utterance > first.utterance);
    }

    #[tokio::test]
    async fn test_emits_stage_sequence() {
        let orchestrator = orchestrator();
        let mut events = orchestrator.events();
        orchestrator.process_text("animate the page").await.unwrap();

        let mut stages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Stage { stage, .. } = event {
                stages.push(stage);
            }
        }
        assert_eq!(
            stages,
            vec![
                Stage::Capturing,
                Stage::Interpreting,
                Stage::Executing,
                Stage::Responding,
                Stage::Idle
            ]
        );
    }
}
