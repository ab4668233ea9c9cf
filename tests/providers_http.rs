//! HTTP contract tests for the hosted providers

use std::sync::Arc;

use secrecy::SecretString;
use sentauri_voice::intent::{IntentService, OpenAiIntentService};
use sentauri_voice::providers::{
    BudgetGuard, DeepgramStt, ElevenLabsTts, FailureReason, OpenAiTts, SpeechToText, TextToSpeech,
    VoiceOptions, WhisperStt,
};
use sentauri_voice::{Action, ProviderGateway};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::webm_clip;

#[tokio::test]
async fn test_whisper_transcribes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " Add a feature. "})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let stt = WhisperStt::new("sk-test".to_string(), "whisper-1")
        .unwrap()
        .with_base_url(mock_server.uri());
    let transcript = stt.transcribe(&webm_clip()).await.unwrap();

    assert_eq!(transcript.text, "Add a feature.");
    assert_eq!(transcript.provider, "whisper");
}

#[tokio::test]
async fn test_whisper_empty_text_is_no_speech() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": ""})))
        .mount(&mock_server)
        .await;

    let stt = WhisperStt::new("sk-test".to_string(), "whisper-1")
        .unwrap()
        .with_base_url(mock_server.uri());
    let failure = stt.transcribe(&webm_clip()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::NoSpeechDetected);
}

#[tokio::test]
async fn test_whisper_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let stt = WhisperStt::new("sk-bad".to_string(), "whisper-1")
        .unwrap()
        .with_base_url(mock_server.uri());
    let failure = stt.transcribe(&webm_clip()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::ProviderUnauthorized);
    assert_eq!(failure.provider, Some("whisper"));
}

#[tokio::test]
async fn test_deepgram_reads_best_alternative() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .and(query_param("model", "nova-2"))
        .and(header("authorization", "Token dg-test"))
        .and(header("content-type", "audio/webm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {
                "channels": [{
                    "alternatives": [{"transcript": "scroll to the top", "confidence": 0.87}]
                }]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let stt = DeepgramStt::new("dg-test".to_string(), "nova-2")
        .unwrap()
        .with_base_url(mock_server.uri());
    let transcript = stt.transcribe(&webm_clip()).await.unwrap();

    assert_eq!(transcript.text, "scroll to the top");
    assert!((transcript.confidence - 0.87).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_openai_tts_request_and_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({"model": "tts-1", "voice": "nova", "input": "Hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfb, 0x90]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tts = OpenAiTts::new("sk-test".to_string(), "tts-1", "nova")
        .unwrap()
        .with_base_url(mock_server.uri());
    let audio = tts.synthesize("Hello", &VoiceOptions::default()).await.unwrap();
    assert_eq!(audio.bytes, vec![0xff, 0xfb, 0x90]);
    assert_eq!(audio.mime, "audio/mpeg");

    let limited = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&limited)
        .await;
    let tts = OpenAiTts::new("sk-test".to_string(), "tts-1", "nova")
        .unwrap()
        .with_base_url(limited.uri());
    let failure = tts.synthesize("Hello", &VoiceOptions::default()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::ProviderRateLimited);
}

#[tokio::test]
async fn test_elevenlabs_falls_back_to_openai() {
    let eleven = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .and(header("xi-api-key", "el-test"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&eleven)
        .await;

    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .expect(1)
        .mount(&openai)
        .await;

    let gateway = ProviderGateway::new(
        vec![],
        vec![
            Arc::new(
                ElevenLabsTts::new("el-test".to_string(), "eleven_monolingual_v1", "voice-1")
                    .unwrap()
                    .with_base_url(eleven.uri()),
            ) as Arc<dyn TextToSpeech>,
            Arc::new(
                OpenAiTts::new("sk-test".to_string(), "tts-1", "nova")
                    .unwrap()
                    .with_base_url(openai.uri()),
            ) as Arc<dyn TextToSpeech>,
        ],
    );

    let audio = gateway.synthesize("Done", &VoiceOptions::default()).await.unwrap();
    assert_eq!(audio.provider, "openai");
}

#[tokio::test]
async fn test_budget_ceiling_skips_paid_provider() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tts = OpenAiTts::new("sk-test".to_string(), "tts-1", "nova")
        .unwrap()
        .with_base_url(mock_server.uri());
    let gateway = ProviderGateway::new(vec![], vec![Arc::new(tts) as Arc<dyn TextToSpeech>])
        .with_budget(Arc::new(BudgetGuard::new(Some(0.000_001), None)));

    let failure = gateway.synthesize("Hello", &VoiceOptions::default()).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::AllProvidersExhausted);
    assert!(failure.detail.contains("provider_rate_limited"));
}

#[tokio::test]
async fn test_failed_call_refunds_budget() {
    let eleven = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&eleven)
        .await;

    let tts = ElevenLabsTts::new("el-test".to_string(), "eleven_monolingual_v1", "voice-1")
        .unwrap()
        .with_base_url(eleven.uri());
    // room for exactly one call of this length
    let cap = tts.estimated_cost("Hello");
    let gateway = ProviderGateway::new(vec![], vec![Arc::new(tts) as Arc<dyn TextToSpeech>])
        .with_budget(Arc::new(BudgetGuard::new(Some(cap), None)));

    gateway.synthesize("Hello", &VoiceOptions::default()).await.unwrap_err();
    assert!(gateway.budget().spent().today.abs() < f64::EPSILON);

    // the refunded reservation lets the next call through
    gateway.synthesize("Hello", &VoiceOptions::default()).await.unwrap_err();
    assert!(gateway.budget().spent().today.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_elevenlabs_rejects_unsafe_voice_id() {
    let eleven = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7, 7]))
        .expect(1)
        .mount(&eleven)
        .await;

    let tts = ElevenLabsTts::new("el-test".to_string(), "eleven_monolingual_v1", "voice-1")
        .unwrap()
        .with_base_url(eleven.uri());
    let voice = VoiceOptions {
        voice: Some("../../v1/user".to_string()),
        ..VoiceOptions::default()
    };

    let audio = tts.synthesize("Hello", &voice).await.unwrap();
    assert_eq!(audio.bytes, vec![7, 7]);
}

#[tokio::test]
async fn test_remote_intent_parses_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo-preview",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"action\":\"theme\",\"modifier\":\"purple\",\"response\":\"Purple it is!\"}"
                }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = OpenAiIntentService::new(SecretString::from("sk-test".to_string()), "gpt-4-turbo-preview")
        .unwrap()
        .with_base_url(mock_server.uri());
    let parsed = service.parse("make everything purple").await.unwrap();

    assert_eq!(parsed.intent.action, Action::Theme);
    assert_eq!(parsed.intent.modifier.as_deref(), Some("purple"));
    assert_eq!(parsed.confirmation.as_deref(), Some("Purple it is!"));
}

#[tokio::test]
async fn test_remote_intent_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let service = OpenAiIntentService::new(SecretString::from("sk-test".to_string()), "gpt-4")
        .unwrap()
        .with_base_url(mock_server.uri());
    assert!(service.parse("add a feature").await.is_err());
}
