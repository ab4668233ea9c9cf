//! Speech endpoints: transcription, synthesis and full voice interaction

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::command::OutcomeResponse;
use super::{ApiError, ApiState};
use crate::orchestrator::Input;
use crate::providers::{AudioClip, VoiceOptions};
use crate::session::UtteranceSource;

/// Content type assumed when the client sends none
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Routes guarded by the synthesis limiter
pub fn synthesis_routes() -> Router<Arc<ApiState>> {
    Router::new().route("/api/text-to-speech", post(text_to_speech))
}

/// Routes guarded by the transcription limiter
pub fn transcription_routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/speech-to-text", post(speech_to_text))
        .route("/api/voice-interact", post(voice_interact))
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub transcript: String,
    pub confidence: f32,
    pub provider: &'static str,
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    /// Provider-specific voice override
    #[serde(default)]
    pub voice: Option<String>,
}

fn audio_clip(headers: &HeaderMap, body: Bytes) -> Result<AudioClip, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty audio data"));
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_AUDIO_MIME);
    let clip = AudioClip::new(body.to_vec(), mime);
    if !clip.is_supported() {
        return Err(ApiError::BadRequest("Unsupported audio format"));
    }
    Ok(clip)
}

/// Transcribe audio to text
///
/// Accepts the raw audio as the request body, typed by `Content-Type`
async fn speech_to_text(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let gateway = state.orchestrator.gateway();
    if !gateway.has_stt() {
        return Err(ApiError::NotConfigured("No speech-to-text provider configured"));
    }

    let clip = audio_clip(&headers, body)?;
    let transcript = gateway.transcribe(&clip).await?;

    Ok(Json(TranscribeResponse {
        success: true,
        transcript: transcript.text,
        confidence: transcript.confidence,
        provider: transcript.provider,
    }))
}

/// Synthesize text to speech
///
/// Returns the audio bytes with the provider's content type
async fn text_to_speech(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let gateway = state.orchestrator.gateway();
    if !gateway.has_tts() {
        return Err(ApiError::NotConfigured("No text-to-speech provider configured"));
    }
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required"));
    }

    let mut voice: VoiceOptions = state.orchestrator.voice().clone();
    if request.voice.is_some() {
        voice.voice = request.voice;
    }
    let audio = gateway.synthesize(&request.text, &voice).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, audio.mime),
            (header::HeaderName::from_static("x-voice-provider"), audio.provider),
        ],
        audio.bytes,
    )
        .into_response())
}

/// Full cycle from recorded audio
async fn voice_interact(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let clip = audio_clip(&headers, body)?;
    let outcome = state
        .orchestrator
        .submit(UtteranceSource::RecordedAudio, Input::Audio(clip))
        .await?;
    Ok(Json(outcome.into()))
}
