use crate::reminder::ReminderId;
use serde::Serialize;
use thiserror::Error;

/// Application error types surfaced to front ends.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Rejected input; the reminder was not created or changed
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    /// Errors related to local file storage
    #[error("Storage error: {0}")]
    Storage(String),
    /// Errors related to loading configuration
    #[error("Config error: {0}")]
    Config(String),
    /// Errors related to the background scheduler thread
    #[error("Scheduler error: {0}")]
    Scheduler(String),
    #[error("Reminder not found: {0}")]
    NotFound(ReminderId),
}

/// Input problems caught before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("invalid date or time '{0}', expected YYYY-MM-DD HH:MM")]
    InvalidDateTime(String),
    #[error("date and time must be in the future (got {0})")]
    PastDueInput(String),
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Validation(error)
    }
}

// Conversion to String for front ends that only display text
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

// Convenience constructors
impl AppError {
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Config(msg.into())
    }

    pub fn scheduler<S: Into<String>>(msg: S) -> Self {
        AppError::Scheduler(msg.into())
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
