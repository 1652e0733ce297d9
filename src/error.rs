//! Error types for the Turnstile service.

use thiserror::Error;

use crate::ratelimit::Decision;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid construction input, or a request carrying no usable identity
    #[error("Validation error: {0}")]
    Validation(String),

    /// The identifier is currently rejected by the limiter.
    ///
    /// This is an expected outcome, not a failure: callers match on it to
    /// pick the "too many requests" response instead of a server error.
    #[error("identifier {} is blocked", .decision.identifier)]
    Blocked {
        /// The deny decision produced at rejection time
        decision: Decision,
    },

    /// Counter store errors
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TurnstileError {
    /// Whether this error is the block sentinel rather than a failure.
    pub fn is_blocked(&self) -> bool {
        matches!(self, TurnstileError::Blocked { .. })
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
