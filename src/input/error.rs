//! Pointer Dispatch Error Types
//!
//! Any of these is fatal to the session that hit it and to no one else.

use thiserror::Error;

/// Result type for pointer dispatch
pub type Result<T> = std::result::Result<T, InputError>;

/// Pointer dispatch error types
#[derive(Error, Debug)]
pub enum InputError {
    /// Configured backend cannot be used
    #[error("Pointer backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend refused a command
    #[error("Pointer backend rejected {command}: {reason}")]
    Rejected {
        /// Command name
        command: &'static str,
        /// Backend explanation
        reason: String,
    },

    /// IO error from the underlying device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InputError {
    /// Convenience constructor for [`InputError::Rejected`]
    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        InputError::Rejected {
            command,
            reason: reason.into(),
        }
    }
}
