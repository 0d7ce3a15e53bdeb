//! Error types for ig-engage.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for running the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Document store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        DatabaseError::Serialization(e.to_string())
    }
}

/// Errors surfaced by HTTP handlers.
///
/// Business outcomes such as "no flow assigned" are not errors; they are
/// regular `200` responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Verification failed")]
    Forbidden,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
