//! Error types for the mapnote-core library.
//!
//! Every variant maps onto one of the recoverable categories the session
//! controller understands (see [`ErrorCategory`]). The controller never lets an
//! error escape a user interaction; it turns them into notifications instead.

use crate::geometry::{GeometryKind, RecordId};
use thiserror::Error;

/// Errors that can occur within the mapnote-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request did not complete (connection refused, timeout, bad body).
    #[error("Network failure: {0}")]
    Network(String),

    /// Transport error from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The record vanished between selection and action.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Collection the record was looked up in.
        kind: GeometryKind,
        /// The identifier that could not be found.
        id: RecordId,
    },

    /// Empty name, malformed coordinate or too few vertices.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration-related errors (invalid URL, bad values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was invoked while its precondition did not hold.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used when deciding how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request did not complete or returned a non-success status.
    NetworkFailure,
    /// Record vanished between selection and action.
    NotFound,
    /// Input rejected before any request was made.
    ValidationFailure,
    /// Local problem (config, IO, state misuse).
    Internal,
}

impl AppError {
    /// Creates a network error with the given message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid state error with the given message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) | Self::Http(_) | Self::Status { .. } | Self::Json(_) => {
                ErrorCategory::NetworkFailure
            }
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::ValidationFailure,
            Self::Config(_) | Self::InvalidState(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            AppError::network("refused").category(),
            ErrorCategory::NetworkFailure
        );
        assert_eq!(
            AppError::Status {
                status: 500,
                url: "http://x/".into()
            }
            .category(),
            ErrorCategory::NetworkFailure
        );
        assert_eq!(
            AppError::NotFound {
                kind: GeometryKind::Point,
                id: RecordId::from("7")
            }
            .category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AppError::validation("empty name").category(),
            ErrorCategory::ValidationFailure
        );
        assert_eq!(
            AppError::invalid_state("no draft").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::NotFound {
            kind: GeometryKind::LineString,
            id: RecordId::from("12"),
        };
        assert_eq!(err.to_string(), "LineString 12 not found");
    }
}
