//! Motion Fusion
//!
//! Turns per-source motion vectors into the single delta dispatched each
//! tick.
//!
//! # Pipeline
//!
//! ```text
//! SensorInput ─> estimators ─> VoteArbiter ─> rotate ─> TemporalFilter ─> Delta
//!                 (per source)  (majority)              (EMA, sensitivity,
//!                                                        deadzone, clamp)
//! ```
//!
//! A tick is one `imu.sample` or one complete camera frame. The arbiter only
//! weighs vectors produced in that tick.

mod arbiter;
mod filter;
mod pipeline;

pub use arbiter::{Arbitration, Direction, VoteArbiter};
pub use filter::{smoothing_alpha, TemporalFilter};
pub use pipeline::{FusionPipeline, TickOutcome};
