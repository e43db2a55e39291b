//! Error types for lectern-player
//!
//! Control-surface operations on the engine never fail (they report
//! `false`/no-op instead); these errors come from configuration, the
//! external services and the HTTP layer.

use crate::backend::BackendError;
use thiserror::Error;

/// Main error type for lectern-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio backend errors
    #[error("Audio backend error: {0}")]
    Backend(#[from] BackendError),

    /// External service answered with an unexpected status
    #[error("Service error: {0}")]
    Service(String),

    /// Transport-level failure talking to an external service
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from lectern-common
    #[error(transparent)]
    Common(#[from] lectern_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using lectern-player Error
pub type Result<T> = std::result::Result<T, Error>;
