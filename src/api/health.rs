//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ApiState;
use crate::providers::budget::Spend;
use crate::session::Stage;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    /// Effective speech-to-text order
    pub stt_providers: Vec<&'static str>,
    /// Effective text-to-speech order
    pub tts_providers: Vec<&'static str>,
    pub remote_intent: bool,
    pub spend: Spend,
}

/// Liveness probe with the effective provider configuration
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let gateway = orchestrator.gateway();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        stage: orchestrator.state().stage,
        stt_providers: gateway.stt_names(),
        tts_providers: gateway.tts_names(),
        remote_intent: orchestrator.interpreter().has_remote(),
        spend: gateway.budget().spent(),
    })
}

/// Build health router
pub fn routes() -> Router<Arc<ApiState>> {
    Router::new().route("/api/health", get(health))
}
