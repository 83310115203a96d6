//! Device Sessions
//!
//! One session per connected device. A session owns its fusion pipeline,
//! button state and frame pairing; nothing mutable is shared between
//! sessions except the serialized pointer backend.
//!
//! # Lifecycle
//!
//! ```text
//! connect ──> Connected ──hello──> Identified ──config──> Configured
//!                 │                    │                     │  ↺ config (new pipeline)
//!                 └────────────────────┴─────────────────────┴──> teardown
//!                                                                 ├─ release held buttons
//!                                                                 └─ unregister
//! ```
//!
//! `config` is accepted without a preceding `hello`. Sensor data (inertial
//! samples, frame headers, payloads and `move.delta`) is discarded until a
//! configuration is in force.
//!
//! # Status
//!
//! [`SessionRegistry`] keeps a [`SessionSnapshot`] per live session for
//! status display and broadcasts a [`RegistryEvent`] on every change.

mod error;
mod ingress;
mod registry;
mod task;

pub use error::{Result, SessionError};
pub use ingress::{FrameAssembler, Inbound};
pub use registry::{RegistryEvent, SessionId, SessionPhase, SessionRegistry, SessionSnapshot};
pub use task::{SessionContext, SessionTask};
