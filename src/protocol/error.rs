//! Protocol Error Types
//!
//! Every variant here is a *protocol fault*: the offending message is logged
//! and dropped, the session keeps running, and the device may be sent an
//! `error` notification carrying the display text.

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol fault kinds
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Text frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    /// JSON value is not an object
    #[error("Client message must be a JSON object")]
    NotAnObject,

    /// Missing `t` discriminator
    #[error("Missing or invalid 't' field")]
    MissingType,

    /// Discriminator names no known message kind
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// Known kind with missing or mistyped fields
    #[error("Invalid {kind} message: {source}")]
    InvalidMessage {
        /// Message kind as sent
        kind: String,
        /// Field-level decode error
        #[source]
        source: serde_json::Error,
    },

    /// Configuration rejected during negotiation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binary payload arrived with no unconsumed frame header
    #[error("Binary payload without a preceding cam.frame header")]
    OrphanPayload,

    /// Frame header was superseded before its payload arrived
    #[error("Frame header {seq} was not followed by its payload")]
    MissingPayload {
        /// Sequence number of the abandoned header
        seq: u64,
    },

    /// Frame header sequence number did not advance
    #[error("Out-of-sequence frame {seq} (last accepted {last})")]
    OutOfSequence {
        /// Offending sequence number
        seq: u64,
        /// Last accepted sequence number
        last: u64,
    },

    /// Frame encoding is not supported
    #[error("Unsupported frame encoding: {0}")]
    UnsupportedEncoding(String),

    /// Payload could not be decoded as an image
    #[error("Frame decode failed: {0}")]
    FrameDecode(String),

    /// Raw payload length disagrees with the declared dimensions
    #[error("Frame payload is {actual} bytes, expected {expected}")]
    FrameSize {
        /// Length implied by the header
        expected: usize,
        /// Length received
        actual: usize,
    },
}

impl ProtocolError {
    /// Whether the device should receive an `error` notification for this fault
    ///
    /// Frame pairing faults are frequent on lossy links and only matter for
    /// one dropped frame, so they stay server-side.
    pub fn notify_client(&self) -> bool {
        !matches!(
            self,
            ProtocolError::OrphanPayload
                | ProtocolError::MissingPayload { .. }
                | ProtocolError::OutOfSequence { .. }
        )
    }
}
