//! Error Types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core domain and storage errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// No user profile exists for the identifier
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No course exists for the identifier
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    /// Caller holds no purchase record for the course
    #[error("Access denied: no purchase record for course {0}")]
    AccessDenied(String),

    /// Direct grant attempted on a priced course
    #[error("Course is not free: {0}")]
    CourseNotFree(String),

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Network failure talking to the store backend
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Document decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Check if the error is a transient backend failure worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Store(_) | CoreError::Network(_))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Store(err.to_string())
    }
}
