//! Producer Error Types
//!
//! Errors raised by producers during setup and teardown. The manager logs
//! them and moves on; they never reach the caller of `track` or `flush`.

use thiserror::Error;

/// Result type for producer operations
pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// Setup could not attach the producer
    #[error("Plugin setup failed: {message}")]
    SetupFailed { message: String },

    /// Teardown could not reverse every side effect
    #[error("Plugin teardown failed: {message}")]
    TeardownFailed { message: String },

    /// Producer called in the wrong lifecycle state
    #[error("Invalid plugin state: {message}")]
    InvalidState { message: String },

    /// Producer setup or teardown panicked
    #[error("Plugin '{plugin_name}' panicked: {message}")]
    Panicked { plugin_name: String, message: String },

    #[error("Plugin configuration error: {message}")]
    ConfigurationError { message: String },
}

impl PluginError {
    pub fn setup_failed<S: Into<String>>(message: S) -> Self {
        Self::SetupFailed { message: message.into() }
    }

    pub fn teardown_failed<S: Into<String>>(message: S) -> Self {
        Self::TeardownFailed { message: message.into() }
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState { message: message.into() }
    }

    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Build from a caught panic payload
    pub fn panicked<S: Into<String>>(plugin_name: S, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked {
            plugin_name: plugin_name.into(),
            message,
        }
    }

    /// Check if error is related to producer lifecycle
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            PluginError::SetupFailed { .. } | PluginError::TeardownFailed { .. } | PluginError::InvalidState { .. }
        )
    }
}

impl From<std::io::Error> for PluginError {
    fn from(err: std::io::Error) -> Self {
        PluginError::setup_failed(format!("IO error: {}", err))
    }
}
