//! Device message protocol
//!
//! Closed set of message kinds exchanged over the session's WebSocket, plus
//! negotiation of the per-session [`SessionConfig`].
//!
//! # Message Flow
//!
//! ```text
//! Device                                  Server
//!   hello ──────────────────────────────>
//!         <────────────────────────────── server.state {ok}
//!   config ─────────────────────────────>
//!         <────────────────────────────── server.state {configured}
//!   imu.sample ─────────────────────────>
//!   cam.frame (text) + payload (binary) ─>
//!   input.click / input.scroll ─────────>
//!         <────────────────────────────── error {message}   (protocol faults only)
//! ```

mod error;
mod messages;
mod session_config;

pub use error::{ProtocolError, Result};
pub use messages::{
    Acceleration, Button, ButtonAction, ClientMessage, ConfigRequest, EnabledSources,
    EulerAngles, FrameHeader, InertialSample, ServerMessage, SourceKind, CLIENT_MESSAGE_TYPES,
};
pub use session_config::{SessionConfig, DEFAULT_CAMERA_FPS, MAX_CAMERA_FPS};
