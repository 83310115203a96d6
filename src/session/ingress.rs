//! Sample ingress
//!
//! Raw transport frames and camera header/payload pairing.
//!
//! A `cam.frame` text frame announces the next binary frame. Pairing is by
//! arrival order only:
//!
//! ```text
//! header(seq=4) ─ payload      → frame 4
//! payload                      → orphan, dropped
//! header(seq=5) ─ header(6)    → frame 5 abandoned, 6 pending
//! header(seq=7) ─ imu.sample   → frame 7 abandoned
//! header(seq=6) after 7        → out of sequence, dropped
//! header(seq=9) ─ header(8)    → frame 9 abandoned, 8 out of sequence
//! ```

use bytes::Bytes;

use crate::protocol::{FrameHeader, ProtocolError, Result};

/// One transport frame, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// JSON control or sensor message
    Text(String),
    /// Camera payload
    Binary(Bytes),
}

/// Camera header/payload pairing state
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    pending: Option<FrameHeader>,
    last_seq: Option<u64>,
}

impl FrameAssembler {
    /// Create an assembler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a frame header
    ///
    /// Returns the faults this header raised, oldest first; empty when it
    /// paired cleanly. An unpaired header it displaces is reported as
    /// [`ProtocolError::MissingPayload`]. An out-of-sequence header is
    /// rejected and nothing is pending afterwards.
    pub fn on_header(&mut self, header: FrameHeader) -> Vec<ProtocolError> {
        let mut faults = Vec::new();
        if let Some(old) = self.pending.take() {
            faults.push(ProtocolError::MissingPayload { seq: old.seq });
        }

        match self.last_seq {
            Some(last) if header.seq <= last => {
                faults.push(ProtocolError::OutOfSequence {
                    seq: header.seq,
                    last,
                });
            }
            _ => {
                self.last_seq = Some(header.seq);
                self.pending = Some(header);
            }
        }
        faults
    }

    /// Pair a binary payload with the pending header
    pub fn on_payload(&mut self) -> Result<FrameHeader> {
        self.pending.take().ok_or(ProtocolError::OrphanPayload)
    }

    /// Note a non-frame message; any pending header is abandoned
    pub fn interrupt(&mut self) -> Result<()> {
        match self.pending.take() {
            Some(old) => Err(ProtocolError::MissingPayload { seq: old.seq }),
            None => Ok(()),
        }
    }

    /// Header waiting for its payload
    pub fn pending(&self) -> Option<&FrameHeader> {
        self.pending.as_ref()
    }

    /// Highest accepted sequence number
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Drop any pending header and sequence history
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_seq = None;
    }
}
