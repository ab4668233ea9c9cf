//! Provider fallback integration tests

use std::sync::Arc;

use sentauri_voice::ProviderGateway;
use sentauri_voice::providers::{AudioClip, FailureReason, TextToSpeech, VoiceOptions};

mod common;
use common::{PanickingTts, ScriptedStt, ScriptedTts, call_log, calls, webm_clip};

#[tokio::test]
async fn test_first_successful_stt_wins() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![
            ScriptedStt::hears("whisper", "make it dark", &log),
            ScriptedStt::hears("deepgram", "never used", &log),
        ],
        vec![],
    );

    let transcript = gateway.transcribe(&webm_clip()).await.unwrap();
    assert_eq!(transcript.text, "make it dark");
    assert_eq!(transcript.provider, "whisper");
    assert_eq!(calls(&log), vec!["whisper"]);
}

#[tokio::test]
async fn test_stt_falls_back_in_order() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![
            ScriptedStt::fails("whisper", FailureReason::ProviderUnauthorized, &log),
            ScriptedStt::hears("deepgram", "add a feature", &log),
        ],
        vec![],
    );

    let transcript = gateway.transcribe(&webm_clip()).await.unwrap();
    assert_eq!(transcript.provider, "deepgram");
    assert_eq!(calls(&log), vec!["whisper", "deepgram"]);
}

#[tokio::test]
async fn test_all_silent_is_no_speech() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![
            ScriptedStt::fails("whisper", FailureReason::NoSpeechDetected, &log),
            ScriptedStt::fails("deepgram", FailureReason::NoSpeechDetected, &log),
        ],
        vec![],
    );

    let failure = gateway.transcribe(&webm_clip()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::NoSpeechDetected);
    assert_eq!(calls(&log).len(), 2);
}

#[tokio::test]
async fn test_mixed_failures_are_exhausted() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![
            ScriptedStt::fails("whisper", FailureReason::NoSpeechDetected, &log),
            ScriptedStt::fails("deepgram", FailureReason::ProviderRateLimited, &log),
        ],
        vec![],
    );

    let failure = gateway.transcribe(&webm_clip()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::AllProvidersExhausted);
    assert!(failure.provider.is_none());
    assert!(failure.detail.contains("deepgram"));
}

#[tokio::test]
async fn test_empty_clip_calls_nobody() {
    let log = call_log();
    let gateway = ProviderGateway::new(vec![ScriptedStt::hears("whisper", "hi", &log)], vec![]);

    let failure = gateway
        .transcribe(&AudioClip::new(Vec::new(), "audio/webm"))
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::NoSpeechDetected);
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn test_tts_skips_provider_for_long_input() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![],
        vec![
            ScriptedTts::limited("elevenlabs", 10, &log),
            ScriptedTts::speaks("openai", &log),
        ],
    );

    let audio = gateway
        .synthesize("This sentence is longer than ten characters", &VoiceOptions::default())
        .await
        .unwrap();
    assert_eq!(audio.provider, "openai");
    // the limited provider is never called
    assert_eq!(calls(&log), vec!["openai"]);
}

#[tokio::test]
async fn test_tts_too_long_everywhere_is_exhausted() {
    let log = call_log();
    let gateway = ProviderGateway::new(vec![], vec![ScriptedTts::limited("elevenlabs", 5, &log)]);

    let failure = gateway
        .synthesize("far too long", &VoiceOptions::default())
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::AllProvidersExhausted);
    assert!(failure.detail.contains("input_too_long"));
}

#[tokio::test]
async fn test_panicking_provider_falls_through() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![],
        vec![
            Arc::new(PanickingTts) as Arc<dyn TextToSpeech>,
            ScriptedTts::speaks("local", &log),
        ],
    );

    let audio = gateway.synthesize("Hello", &VoiceOptions::default()).await.unwrap();
    assert_eq!(audio.provider, "local");
}

#[tokio::test]
async fn test_every_tts_failure_is_tried_once() {
    let log = call_log();
    let gateway = ProviderGateway::new(
        vec![],
        vec![
            ScriptedTts::fails("elevenlabs", FailureReason::ProviderRateLimited, &log),
            ScriptedTts::fails("openai", FailureReason::ProviderUnavailable, &log),
        ],
    );

    let failure = gateway.synthesize("Hello", &VoiceOptions::default()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::AllProvidersExhausted);
    assert_eq!(calls(&log), vec!["elevenlabs", "openai"]);
}
