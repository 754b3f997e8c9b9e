//! REST handlers and response envelopes.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hark_core::TranscribeRequest;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::server::AppState;

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const TRANSCRIBE_ERROR: &str = "TRANSCRIBE_ERROR";

pub fn respond_success<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            data,
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub fn respond_error(status: StatusCode, code: &'static str, message: &str, details: Option<String>) -> Response {
    error!(status = status.as_u16(), code, reason = message, "request failed");
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            code,
            details,
        }),
    )
        .into_response()
}

/// GET /health
pub async fn health_handler() -> Response {
    respond_success(
        json!({
            "status": "healthy",
            "service": "hark",
            "version": env!("CARGO_PKG_VERSION"),
        }),
        "service is running",
    )
}

/// POST /api/transcribe
pub async fn transcribe_handler(
    State(state): State<AppState>,
    body: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Response {
    let Json(mut req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return respond_error(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                "invalid request parameters",
                Some(rejection.body_text()),
            );
        }
    };

    // Models always come from the server's own directory
    req.models_dir = state.models_dir.clone();
    info!(inputs = req.in_paths.len(), model = %req.model, "transcribe request");

    let cancel = state.shutdown.child_token();
    match state.transcriber.transcribe_batch(&req, &cancel).await {
        Ok(batch) => respond_success(batch, "ok"),
        Err(e) => respond_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            TRANSCRIBE_ERROR,
            "transcription failed",
            Some(e.to_string()),
        ),
    }
}
