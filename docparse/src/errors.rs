use crate::extract::ExtractError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid upload: missing field, rejected media type, malformed multipart body
    #[error("{message}")]
    BadRequest { message: String },

    /// Uploaded file exceeds the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// File extension has no matching extractor
    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Extractor could not turn the document into text
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// Filesystem failure while staging, reading or persisting a document
    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl Error {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // Size violations are a client error like any other validation failure
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            Error::UnsupportedFormat { .. } | Error::Extraction(_) | Error::Io { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::debug!("Client error: {}", self);
        } else {
            tracing::error!("Document processing failed: {:#}", self);
        }

        let status = self.status_code();
        let body = ErrorResponse { error: self.to_string() };
        (status, Json(body)).into_response()
    }
}

/// Type alias for handler and pipeline results
pub type Result<T> = std::result::Result<T, Error>;
