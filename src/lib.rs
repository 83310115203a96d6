//! # airmouse-server
//!
//! Turns a phone into a desktop pointer. The device streams inertial samples
//! and camera frames over WebSocket; the server fuses them into relative
//! cursor motion and forwards clicks and scrolls.
//!
//! # Architecture
//!
//! ```text
//! airmouse-server
//!   ├─> WebSocket listener (one session per device)
//!   ├─> Session
//!   │     ├─> Ingress (message decode, camera header/payload pairing)
//!   │     ├─> Estimators (accel, gyro, orientation, camera flow)
//!   │     ├─> Vote Arbiter (majority direction across sources)
//!   │     ├─> Temporal Filter (half-life EMA, sensitivity, deadzone)
//!   │     └─> Command Dispatcher (moves, buttons, scroll)
//!   ├─> Session Registry (status snapshots + change events)
//!   └─> Pointer backend (shared, serialized)
//! ```
//!
//! # Data Flow
//!
//! **Motion Path:** Device → Ingress → Estimators → Arbiter → Filter → Dispatcher → Pointer
//!
//! **Control Path:** Device → Ingress → Dispatcher → Pointer
//!
//! **Status Path:** Session → Registry → subscribers

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Server configuration
pub mod config;

/// Device message protocol and session negotiation
pub mod protocol;

/// Per-source motion estimators
///
/// Accelerometer, gyroscope and orientation estimators turn inertial samples
/// into displacements; the camera estimator block-matches consecutive desk
/// frames. All share the single `MotionEstimator` capability.
pub mod estimator;

/// Motion fusion
///
/// Majority-vote arbitration across sources followed by time-based
/// smoothing and output shaping.
pub mod fusion;

/// Pointer command dispatch
pub mod input;

/// Device sessions and the live session registry
pub mod session;

/// Main server implementation
pub mod server;

/// Utility functions
pub mod utils;
