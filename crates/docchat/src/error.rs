//! Error types for the document chat backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for docchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by ingestion, retrieval, generation and session lookup
#[derive(Debug, Error)]
pub enum Error {
    /// File extension is neither `.txt` nor `.pdf`
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// File could not be read or parsed
    #[error("Failed to load '{filename}': {message}")]
    Load { filename: String, message: String },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Embedding provider failed or returned a malformed response
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Index build was given no chunks
    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    /// Search was run against an index with no entries
    #[error("Index is empty")]
    EmptyIndex,

    /// Query text or parameters are not usable
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Generation provider failed, possibly after partial output
    #[error("Generation provider error: {0}")]
    GenerationProvider(String),

    /// No session registered under this id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a load error
    pub fn load(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingProvider(message.into())
    }

    /// Create a generation provider error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationProvider(message.into())
    }

    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable tag for this error
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Load { .. } => "load_error",
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::EmbeddingProvider(_) => "embedding_provider_error",
            Error::EmptyCorpus => "empty_corpus",
            Error::EmptyIndex => "empty_index",
            Error::InvalidQuery(_) => "invalid_query",
            Error::GenerationProvider(_) => "generation_provider_error",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// HTTP status used when this error crosses the transport boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnsupportedFormat(_)
            | Error::Load { .. }
            | Error::InvalidConfiguration(_)
            | Error::EmptyCorpus
            | Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::EmbeddingProvider(_) | Error::GenerationProvider(_) => StatusCode::BAD_GATEWAY,
            Error::EmptyIndex | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
