//! Error types for the HTTP layer.
//!
//! [`WebError`] unifies the admin page failure modes into a single enum
//! that converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. The
//! WebSocket adapters never surface errors to clients; they only log and
//! disconnect.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur while serving an admin request.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage was never reached at startup; the process is degraded.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A storage lookup failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A page template failed to load or render.
    #[error("template error: {0}")]
    Template(String),
}

impl WebError {
    /// Wrap any storage error.
    pub fn storage(e: impl Display) -> Self {
        Self::Storage(e.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
