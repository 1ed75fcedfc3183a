use crate::error::Pdf2ZipError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Message shown for every server-side failure.
const SERVER_FAILURE_MESSAGE: &str = "Failed to convert PDF to images.";

impl IntoResponse for Pdf2ZipError {
    fn into_response(self) -> Response {
        let (status, body) = if self.is_client_error() {
            tracing::warn!("Rejected request: {}", self);
            (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: client_message(&self),
                    details: None,
                },
            )
        } else {
            tracing::error!("Conversion failed: {}", self);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: SERVER_FAILURE_MESSAGE.to_string(),
                    details: cfg!(debug_assertions).then(|| self.to_string()),
                },
            )
        };
        (status, Json(body)).into_response()
    }
}

/// Client-facing text, without scratch paths.
fn client_message(err: &Pdf2ZipError) -> String {
    match err {
        Pdf2ZipError::MalformedDocument { detail, .. } => format!("Invalid PDF: {}", detail),
        other => other.to_string(),
    }
}
