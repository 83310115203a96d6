//! Per-Source Motion Estimators
//!
//! Each enabled sensing source gets one stateful estimator that turns raw
//! samples into a [`MotionVector`] for the current tick, or declines.
//!
//! # Sources
//!
//! | Source | Input | No-estimate when |
//! |--------|-------|------------------|
//! | Accel | linear acceleration x/y | first sample, gap too large |
//! | Gyro | rotation rate alpha/beta | first sample, gap too large |
//! | Orientation | absolute alpha/beta | first sample, gap too large |
//! | Camera | decoded luma frame | first frame, size change, no texture |
//!
//! Estimators are created fresh for each negotiated configuration and are
//! never shared between sessions. A new source only has to implement
//! [`MotionEstimator`]; the arbiter never sees source-specific state.

mod camera;
mod inertial;
mod vector;

pub use camera::{decode_frame, CameraEstimator, FlowEstimate, RAW_LUMA_ENCODING};
pub use inertial::{
    wrapped_angle_delta, AccelEstimator, GyroEstimator, OrientationEstimator, SampleClock,
};
pub use vector::{Delta, MotionVector};

use image::GrayImage;

use crate::config::{CameraConfig, FusionConfig};
use crate::protocol::{EnabledSources, InertialSample, SourceKind};

/// New raw data for one tick
#[derive(Debug, Clone, Copy)]
pub enum SensorInput<'a> {
    /// Inertial sample; may carry several sources at once
    Inertial(&'a InertialSample),
    /// Decoded camera frame
    Frame(&'a GrayImage),
}

impl SensorInput<'_> {
    /// Whether this input carries fresh data for `source`
    pub fn carries(&self, source: SourceKind) -> bool {
        match (self, source) {
            (SensorInput::Frame(_), SourceKind::Camera) => true,
            (SensorInput::Inertial(sample), SourceKind::Accel) => sample.accel.is_some(),
            (SensorInput::Inertial(sample), SourceKind::Gyro) => sample.gyro.is_some(),
            (SensorInput::Inertial(sample), SourceKind::Orientation) => {
                sample.orientation.is_some()
            }
            _ => false,
        }
    }
}

/// Capability shared by every source estimator
pub trait MotionEstimator: Send + Sync {
    /// Source this estimator serves
    fn source(&self) -> SourceKind;

    /// Produce this tick's vector, or `None` for no-estimate
    ///
    /// Inputs that carry nothing for this source return `None` without
    /// touching internal state.
    fn estimate(&mut self, input: &SensorInput<'_>) -> Option<MotionVector>;

    /// Drop all history so the next input re-seeds
    fn reset(&mut self);
}

/// Build one estimator per enabled source
pub fn build_estimators(
    enabled: &EnabledSources,
    fusion: &FusionConfig,
    camera: &CameraConfig,
) -> Vec<Box<dyn MotionEstimator>> {
    enabled
        .iter()
        .map(|source| -> Box<dyn MotionEstimator> {
            match source {
                SourceKind::Camera => Box::new(CameraEstimator::new(camera.clone())),
                SourceKind::Accel => Box::new(AccelEstimator::new(fusion)),
                SourceKind::Gyro => Box::new(GyroEstimator::new(fusion)),
                SourceKind::Orientation => Box::new(OrientationEstimator::new(fusion)),
            }
        })
        .collect()
}
