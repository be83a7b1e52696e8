//! Error types for the Rapport node.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rapport_graph::GraphError;
use serde::Serialize;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection graph error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Trait implementations over [`crate::Storage`] report node failures as an
/// unavailable backend.
impl From<Error> for GraphError {
    fn from(e: Error) -> Self {
        match e {
            Error::Graph(inner) => inner,
            other => GraphError::Unavailable(other.to_string()),
        }
    }
}

impl Error {
    /// Stable machine-readable kind, echoed in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Graph(inner) => inner.kind(),
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidInput(_) => "invalid_input",
            Error::Storage(_) | Error::Serialization(_) | Error::Config(_) | Error::Io(_) => {
                "unavailable"
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Graph(GraphError::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Graph(GraphError::InvalidOperation(_)) => StatusCode::BAD_REQUEST,
            Error::Graph(GraphError::Conflict(_)) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Graph(GraphError::Unavailable(_))
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    kind: &'static str,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            message,
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
