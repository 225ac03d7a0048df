//! Error types for action-core

use thiserror::Error;

/// Result type alias for action bodies and controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors an action body can settle with
///
/// The controller never surfaces these to its caller. A failed run only
/// bumps the error counter; the error itself is logged and dropped.
#[derive(Error, Debug)]
pub enum Error {
    /// The action failed
    #[error("Action error: {message}")]
    Action {
        /// Error message
        message: String,
    },

    /// The action observed its cancellation token and unwound
    #[error("Action cancelled")]
    Cancelled,

    /// No spawner was configured and no async runtime could be detected
    #[error("No spawner configured and no async runtime detected")]
    NoRuntime,

    /// Any other error raised by the action body
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an action error
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action {
            message: message.into(),
        }
    }

    /// Check whether this error came from observing cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
