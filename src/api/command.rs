//! Typed command endpoints

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::intent::{Intent, IntentSource};
use crate::orchestrator::{CycleOutcome, Input};
use crate::session::UtteranceSource;

/// Build command router
pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/process-command", post(process_command))
        .route("/api/command", post(command))
}

/// Command request
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Defaults to typed input
    #[serde(default)]
    pub source: Option<UtteranceSource>,
}

/// Interpretation without execution
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub intent: Intent,
    pub source: IntentSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
}

/// Spoken response encoded for JSON clients
#[derive(Debug, Serialize)]
pub struct AudioPayload {
    pub mime: &'static str,
    pub provider: &'static str,
    /// Base64-encoded audio bytes
    pub data: String,
}

/// Cycle outcome plus its audio
#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    #[serde(flatten)]
    pub outcome: CycleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPayload>,
}

impl From<CycleOutcome> for OutcomeResponse {
    fn from(outcome: CycleOutcome) -> Self {
        let audio = outcome.audio.as_ref().map(|audio| AudioPayload {
            mime: audio.mime,
            provider: audio.provider,
            data: base64::engine::general_purpose::STANDARD.encode(&audio.bytes),
        });
        Self { outcome, audio }
    }
}

/// Interpret a command without applying it
async fn process_command(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Command is required"));
    }

    let interpretation = state
        .orchestrator
        .interpreter()
        .interpret(&request.command)
        .await;
    let intent = interpretation.intent;
    let actionable = intent.is_actionable();

    Ok(Json(ProcessResponse {
        success: actionable,
        clarification: (!actionable).then(|| intent.clarification()),
        intent,
        source: interpretation.source,
        confirmation: interpretation.remote_confirmation,
    }))
}

/// Run a full cycle for a typed command
async fn command(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Command is required"));
    }

    let source = request.source.unwrap_or(UtteranceSource::Typed);
    let outcome = state
        .orchestrator
        .submit(source, Input::Text(request.command))
        .await?;
    Ok(Json(outcome.into()))
}
