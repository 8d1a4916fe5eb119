//! Unified error type for the relay.
//!
//! Cache, pump and supervisor failures all funnel into [`Error`], which carries
//! enough context for route handlers to derive an HTTP status code via
//! [`Error::http_status`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No cache entry exists for the filename.
    #[error("no cache entry for {filename}")]
    NotFound { filename: String },

    /// A stream pump waited longer than its idle ceiling without progress.
    #[error("timed out after {waited:?} waiting for {filename}")]
    Timeout { filename: String, waited: Duration },

    /// The entry being streamed was reset by a new upload mid-stream.
    #[error("{filename} was replaced while streaming")]
    Superseded { filename: String },

    /// The transcoder process could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The upload body failed before it was fully received.
    #[error("upload of {filename} aborted: {source}")]
    UploadAborted {
        filename: String,
        #[source]
        source: axum::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(filename: impl Into<String>) -> Self {
        Error::NotFound {
            filename: filename.into(),
        }
    }

    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Superseded { .. } => StatusCode::CONFLICT,
            Error::UploadAborted { .. } => StatusCode::BAD_REQUEST,
            Error::Spawn { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Timeout { .. } => "timeout",
            Error::Superseded { .. } => "superseded",
            Error::Spawn { .. } => "spawn_error",
            Error::UploadAborted { .. } => "upload_aborted",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Server error in handler");
        } else {
            tracing::debug!(status = %status, error = %self, "Request failed");
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}
