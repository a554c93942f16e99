//! Crate Error Types
//!
//! Errors that cross the public API boundary. Delivery and producer failures
//! are handled inside the pipeline and never surface here.

use thiserror::Error;

/// Result type for public rumkit operations
pub type RumResult<T> = Result<T, RumError>;

/// Errors surfaced by client construction and the storage/config layers
#[derive(Error, Debug)]
pub enum RumError {
    /// Missing or invalid client options
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Client construction outside of a Tokio runtime
    #[error("No async runtime available: {message}")]
    Runtime { message: String },

    /// Storage I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event or envelope (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction failure
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RumError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime { message: message.into() }
    }

    /// Check if error is a configuration issue
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, RumError::Config { .. })
    }
}
