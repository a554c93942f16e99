//! Delivery Error Types
//!
//! Failures of a single delivery strategy. They never reach callers of
//! `track`/`flush`; the chain falls through and finally persists.

use thiserror::Error;

/// Result type for a single delivery attempt
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Why a delivery strategy did not accept a batch
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The mechanism cannot be used for this payload or environment
    #[error("Delivery mechanism unavailable: {reason}")]
    Unavailable { reason: String },

    /// The collector answered with a non-success status
    #[error("Collector rejected batch with status {status}")]
    Rejected { status: u16 },

    /// Transport-level failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// The attempt did not finish in time
    #[error("Delivery timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The batch could not be encoded
    #[error("Failed to encode batch: {message}")]
    Encode { message: String },

    /// The chain is empty
    #[error("No delivery strategies configured")]
    NoStrategies,
}

impl DeliveryError {
    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network { message: message.into() }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout { duration_ms: 0 }
        } else if let Some(status) = err.status() {
            DeliveryError::Rejected { status: status.as_u16() }
        } else {
            DeliveryError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        DeliveryError::Encode { message: err.to_string() }
    }
}
