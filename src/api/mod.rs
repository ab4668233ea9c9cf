//! HTTP API server for the voice pipeline

pub mod command;
pub mod health;
pub mod rate_limit;
pub mod session;
pub mod voice;
pub mod websocket;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, middleware};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::ServerConfig;
use crate::executor::PageEditor;
use crate::orchestrator::{Busy, Orchestrator};
use crate::providers::{FailureReason, ProviderFailure};

/// Shared state for API handlers
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    /// Page the orchestrator edits, for snapshots
    pub editor: Arc<PageEditor>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    config: ServerConfig,
}

impl ApiServer {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, editor: Arc<PageEditor>, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(ApiState {
                orchestrator,
                editor,
            }),
            config,
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let limits = rate_limit::RateLimits::from_config(&self.config);

        let synthesis = voice::synthesis_routes().route_layer(middleware::from_fn_with_state(
            limits.synthesis,
            rate_limit::rate_limit_middleware,
        ));
        let transcription = voice::transcription_routes().route_layer(
            middleware::from_fn_with_state(limits.transcription, rate_limit::rate_limit_middleware),
        );

        let api = Router::new()
            .merge(command::routes())
            .merge(session::routes())
            .merge(synthesis)
            .merge(transcription)
            .layer(middleware::from_fn_with_state(
                limits.general,
                rate_limit::rate_limit_middleware,
            ));

        Router::new()
            .merge(health::routes())
            .merge(websocket::routes())
            .merge(api)
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.upload_limit_bytes))
            .layer(cors(&self.config.allowed_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.config.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// CORS for the configured origins; an empty list allows any
fn cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    /// Another utterance is in flight
    Busy(Busy),
    NotConfigured(&'static str),
    BadRequest(&'static str),
    RateLimited,
    /// Every provider failed
    Provider(ProviderFailure),
}

impl From<Busy> for ApiError {
    fn from(busy: Busy) -> Self {
        Self::Busy(busy)
    }
}

impl From<ProviderFailure> for ApiError {
    fn from(failure: ProviderFailure) -> Self {
        Self::Provider(failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::Busy(busy) => (StatusCode::CONFLICT, "busy", busy.to_string()),
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests, please try again later.".to_string(),
            ),
            Self::Provider(failure) => {
                let status = match failure.reason {
                    FailureReason::NoSpeechDetected => StatusCode::UNPROCESSABLE_ENTITY,
                    FailureReason::InputTooLong => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, failure.reason.as_str(), failure.detail)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
