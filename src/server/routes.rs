//! HTTP route handlers for the relay API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::chat::{ChatOutcome, GenerateRequest};
use crate::error::RelayError;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/generate", post(generate))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "airwise-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handle a conversation turn.
///
/// The body is parsed by hand so a malformed request is reported as a
/// validation failure before any upstream call.
async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatOutcome>, RelayError> {
    let conversation = GenerateRequest::from_slice(&body)?.validate()?;
    let outcome = state.orchestrator.respond(&conversation).await?;
    Ok(Json(outcome))
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.kind(), "request failed: {self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error occurred while generating the completion: {self}"),
        )
            .into_response()
    }
}
