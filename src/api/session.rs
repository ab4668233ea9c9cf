//! Session control and read-only projections

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::executor::Page;
use crate::orchestrator::CaptureStart;
use crate::session::{ConversationEntry, SessionState, UtteranceSource};

/// Build session router
pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/session", get(session_state))
        .route("/api/session/start", post(start))
        .route("/api/session/stop", post(stop))
        .route("/api/conversation", get(conversation))
        .route("/api/page", get(page))
}

/// Start request
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub source: UtteranceSource,
}

/// Stop response
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub cancelled: bool,
}

/// Toggle capture: start when idle, stop when listening
async fn start(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<StartRequest>,
) -> Json<CaptureStart> {
    Json(state.orchestrator.begin_capture(request.source).await)
}

async fn stop(State(state): State<Arc<ApiState>>) -> Json<StopResponse> {
    Json(StopResponse {
        cancelled: state.orchestrator.cancel_capture(),
    })
}

async fn session_state(State(state): State<Arc<ApiState>>) -> Json<SessionState> {
    Json(state.orchestrator.state())
}

async fn conversation(State(state): State<Arc<ApiState>>) -> Json<Vec<ConversationEntry>> {
    Json(state.orchestrator.conversation())
}

async fn page(State(state): State<Arc<ApiState>>) -> Json<Page> {
    Json(state.editor.snapshot())
}
