//! Inertial estimators
//!
//! Accelerometer, gyroscope and absolute-orientation readings each become a
//! per-tick displacement. These are control surfaces, not physical
//! integrators: no double integration, no drift correction.
//!
//! All three share [`SampleClock`] for elapsed-time bookkeeping. A sample
//! that lacks the estimator's field leaves its state untouched.

use tracing::trace;

use super::vector::MotionVector;
use super::{MotionEstimator, SensorInput};
use crate::config::FusionConfig;
use crate::protocol::{EulerAngles, SourceKind};

/// Elapsed-time tracker over device timestamps
#[derive(Debug, Clone)]
pub struct SampleClock {
    last_ts_ms: Option<f64>,
    max_gap_ms: f64,
}

impl SampleClock {
    /// Create a clock that rejects gaps longer than `max_gap_ms`
    pub fn new(max_gap_ms: f64) -> Self {
        Self {
            last_ts_ms: None,
            max_gap_ms,
        }
    }

    /// Record a timestamp and return the usable elapsed time in seconds
    ///
    /// Returns `None` on the first sample, for non-increasing timestamps and
    /// for gaps above the limit. The timestamp is recorded in every case.
    pub fn advance(&mut self, ts_ms: f64) -> Option<f64> {
        let previous = self.last_ts_ms.replace(ts_ms)?;
        let dt_ms = ts_ms - previous;
        if dt_ms <= 0.0 || dt_ms > self.max_gap_ms {
            trace!("Sample gap {:.1}ms outside (0, {}]", dt_ms, self.max_gap_ms);
            return None;
        }
        Some(dt_ms / 1000.0)
    }

    /// Forget the last timestamp
    pub fn reset(&mut self) {
        self.last_ts_ms = None;
    }
}

/// Accelerometer estimator
///
/// Clamped x/y acceleration is treated as proportional to intended cursor
/// speed; z (normal to the desk) is ignored.
#[derive(Debug, Clone)]
pub struct AccelEstimator {
    clock: SampleClock,
    gain: f64,
    clamp: f64,
}

impl AccelEstimator {
    /// Create a new accelerometer estimator
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            clock: SampleClock::new(config.max_sample_gap_ms),
            gain: config.accel_gain,
            clamp: config.accel_clamp,
        }
    }
}

impl MotionEstimator for AccelEstimator {
    fn source(&self) -> SourceKind {
        SourceKind::Accel
    }

    fn estimate(&mut self, input: &SensorInput<'_>) -> Option<MotionVector> {
        let SensorInput::Inertial(sample) = input else {
            return None;
        };
        let accel = sample.accel?;
        let dt = self.clock.advance(sample.ts)?;

        let ax = accel.x.clamp(-self.clamp, self.clamp);
        let ay = accel.y.clamp(-self.clamp, self.clamp);
        Some(MotionVector::new(
            SourceKind::Accel,
            ax * self.gain * dt,
            ay * self.gain * dt,
        ))
    }

    fn reset(&mut self) {
        self.clock.reset();
    }
}

/// Gyroscope estimator
///
/// Rotation rate about z (alpha, yaw) drives x and about x (beta, pitch)
/// drives y. Positive rates are counter-clockwise, so both are negated to
/// point the cursor where the device turns.
#[derive(Debug, Clone)]
pub struct GyroEstimator {
    clock: SampleClock,
    gain: f64,
}

impl GyroEstimator {
    /// Create a new gyroscope estimator
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            clock: SampleClock::new(config.max_sample_gap_ms),
            gain: config.gyro_gain,
        }
    }
}

impl MotionEstimator for GyroEstimator {
    fn source(&self) -> SourceKind {
        SourceKind::Gyro
    }

    fn estimate(&mut self, input: &SensorInput<'_>) -> Option<MotionVector> {
        let SensorInput::Inertial(sample) = input else {
            return None;
        };
        let rate = sample.gyro?;
        let dt = self.clock.advance(sample.ts)?;

        Some(MotionVector::new(
            SourceKind::Gyro,
            -rate.alpha * self.gain * dt,
            -rate.beta * self.gain * dt,
        ))
    }

    fn reset(&mut self) {
        self.clock.reset();
    }
}

/// Signed shortest-arc difference `current - previous` in degrees
pub fn wrapped_angle_delta(current: f64, previous: f64) -> f64 {
    (current - previous + 180.0).rem_euclid(360.0) - 180.0
}

/// Absolute-orientation estimator
///
/// Differences consecutive alpha/beta readings along the shorter arc and
/// divides by elapsed time, yielding an angular rate with the same sign
/// convention as [`GyroEstimator`].
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    clock: SampleClock,
    gain: f64,
    previous: Option<EulerAngles>,
}

impl OrientationEstimator {
    /// Create a new orientation estimator
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            clock: SampleClock::new(config.max_sample_gap_ms),
            gain: config.orientation_gain,
            previous: None,
        }
    }
}

impl MotionEstimator for OrientationEstimator {
    fn source(&self) -> SourceKind {
        SourceKind::Orientation
    }

    fn estimate(&mut self, input: &SensorInput<'_>) -> Option<MotionVector> {
        let SensorInput::Inertial(sample) = input else {
            return None;
        };
        let current = sample.orientation?;
        let previous = self.previous.replace(current);
        let dt = self.clock.advance(sample.ts)?;
        let previous = previous?;

        let rate_alpha = wrapped_angle_delta(current.alpha, previous.alpha) / dt;
        let rate_beta = wrapped_angle_delta(current.beta, previous.beta) / dt;
        Some(MotionVector::new(
            SourceKind::Orientation,
            -rate_alpha * self.gain,
            -rate_beta * self.gain,
        ))
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.previous = None;
    }
}
