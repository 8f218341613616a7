//! Error types for rescal.

use thiserror::Error;

/// Errors that can occur in rescal operations.
#[derive(Error, Debug)]
pub enum RescalError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RescalError {
    fn from(err: serde_json::Error) -> Self {
        RescalError::Serialization(err.to_string())
    }
}

impl RescalError {
    /// True when the error means "no such row" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RescalError::NotFound(_))
    }
}

/// Result type alias for rescal operations.
pub type RescalResult<T> = Result<T, RescalError>;
