//! # AppError
//!
//! Centralized error handling for SoonSite.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all soon-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Release)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., blank title, unparsable date, bad address)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Invalid operator credentials or session
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Mail delivery failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Infrastructure failure (e.g., DB down, unreadable data file)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists (e.g., duplicate release title)
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for SoonSite logic.
pub type Result<T> = std::result::Result<T, AppError>;
