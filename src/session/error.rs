//! Session Error Types
//!
//! Session errors end the session that raised them. Protocol faults are not
//! session errors; they are handled inside the task and never surface here.

use thiserror::Error;

use crate::input::InputError;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Fatal session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Pointer backend unavailable or rejected a command
    #[error("Pointer dispatch failed: {0}")]
    Dispatch(#[from] InputError),

    /// Camera worker task panicked or was cancelled
    #[error("Frame worker failed: {0}")]
    Worker(String),

    /// Writer side of the connection is gone
    #[error("Outbound channel closed")]
    OutboundClosed,
}
