//! Error types for the instance pool
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pool construction and leasing
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid; raised at construction, never at runtime
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// No lease permit became available in time
    #[error("Timed out after {timeout_ms}ms waiting for a lease permit")]
    Timeout {
        /// The timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The pool has been closed and no longer hands out leases
    #[error("Pool is closed")]
    Closed,

    /// The supplier could not produce an instance
    #[error("No instance available: {reason}")]
    Unavailable {
        /// Why no instance was produced
        reason: String,
    },

    /// A tokio runtime was required but not found
    #[error("Runtime error: {message}")]
    Runtime {
        /// The error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}
