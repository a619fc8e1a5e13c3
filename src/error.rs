//! Error types for the container grid
//!
//! Structural problems (missing identifiers, bad configuration) are raised as
//! errors. "Already registered" and "not found" are ordinary outcomes and are
//! reported through `Ok(false)` by the registries instead.

use thiserror::Error;

/// Unified error type for the grid
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Registry Errors
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // =========================================================================
    // Listener Errors
    // =========================================================================
    #[error("Listener {listener} failed: {reason}")]
    ListenerFailed { listener: String, reason: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a listener failure
    pub fn listener(listener: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ListenerFailed {
            listener: listener.into(),
            reason: reason.into(),
        }
    }

    /// Check if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::InvalidArgument(_)
                | Error::Configuration(_)
                | Error::YamlParse(_)
                | Error::JsonParse(_)
        )
    }
}

/// Result type alias for the grid
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let err = Error::InvalidArgument("node id must not be empty".into());
        assert!(!err.is_retryable());

        let err = Error::Configuration("bad shard count".into());
        assert!(!err.is_retryable());

        let err = Error::listener("audit", "downstream unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::listener("audit", "boom");
        assert_eq!(err.to_string(), "Listener audit failed: boom");
    }
}
