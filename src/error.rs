//! Error taxonomy for schoolbook.
//!
//! Request-validation failures map to 400 responses with a descriptive
//! message; storage and filesystem failures map to 500 responses with a
//! generic message (details go to the log, not the client).

use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use crate::server::Response;

/// The main error type for request handling.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field or file was missing or unacceptable.
    #[error("{0}")]
    Validation(String),

    /// The multipart body could not be parsed.
    #[error("malformed form submission: {0}")]
    Multipart(String),

    /// A database query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Writing or moving an uploaded image failed.
    #[error("failed to store image: {0}")]
    Media(#[source] std::io::Error),

    /// An internal invariant did not hold.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Multipart(_) => 400,
            Self::Database(_) | Self::Media(_) | Self::Internal(_) => 500,
        }
    }

    /// The message exposed to the client. Validation problems are spelled
    /// out; everything else collapses to a generic message.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Multipart(_) => "Malformed form submission.".to_string(),
            _ => "An error occurred on the server.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status_code() >= 500 {
            log::error!("request failed: {}", self);
        } else {
            log::debug!("request rejected: {}", self);
        }
        Response::json(
            json!({ "success": false, "error": self.client_message() }),
            self.status_code(),
        )
        .into_response()
    }
}
