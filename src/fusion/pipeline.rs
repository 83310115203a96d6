//! Fusion pipeline
//!
//! One per configured session. Owns the estimators, the arbiter and the
//! filter built from a single [`SessionConfig`]; a renegotiation replaces the
//! whole pipeline.
//!
//! Each source's latest vector is kept with the timestamp of the tick that
//! produced it. While younger than `vote_max_age_ms` it votes on other
//! sources' ticks, which is how camera frames and inertial samples check
//! each other even though they never arrive together.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

use super::arbiter::{Arbitration, VoteArbiter};
use super::filter::TemporalFilter;
use crate::config::{CameraConfig, FusionConfig};
use crate::estimator::{
    build_estimators, decode_frame, Delta, MotionEstimator, MotionVector, SensorInput,
};
use crate::protocol::{
    EnabledSources, FrameHeader, InertialSample, ProtocolError, SessionConfig, SourceKind,
};

/// Everything one tick produced
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    /// Device timestamp of the tick (ms)
    pub ts_ms: f64,
    /// Per-source estimates produced by this tick
    pub vectors: Vec<MotionVector>,
    /// Fresh estimates from earlier ticks that voted on this one
    pub recent: Vec<MotionVector>,
    /// Arbiter decision
    pub arbitration: Arbitration,
    /// Delta to dispatch (already scaled, deadzoned and clamped)
    pub delta: Delta,
}

/// Estimator bank, arbiter and filter for one negotiated configuration
pub struct FusionPipeline {
    config: SessionConfig,
    estimators: Vec<Box<dyn MotionEstimator>>,
    arbiter: VoteArbiter,
    filter: TemporalFilter,
    latest: HashMap<SourceKind, (MotionVector, f64)>,
    max_age_ms: f64,
    last_arbitrated: Option<Delta>,
    ticks: u64,
}

impl FusionPipeline {
    /// Build a pipeline for an accepted configuration
    pub fn new(config: SessionConfig, fusion: &FusionConfig, camera: &CameraConfig) -> Self {
        let estimators = build_estimators(&config.enabled, fusion, camera);
        let arbiter = VoteArbiter::new(config.enabled, fusion.vote_min_magnitude);
        let filter = TemporalFilter::new(&config, fusion.max_step_px);

        debug!(
            "Fusion pipeline: sources=[{}] sensitivity={} half_life={}ms deadzone={}px rotation={}°",
            config
                .enabled
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(","),
            config.sensitivity,
            config.smoothing_half_life_ms,
            config.deadzone_px,
            config.rotation_deg
        );

        Self {
            config,
            estimators,
            arbiter,
            filter,
            latest: HashMap::new(),
            max_age_ms: fusion.vote_max_age_ms,
            last_arbitrated: None,
            ticks: 0,
        }
    }

    /// Negotiated configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sources this pipeline fuses
    pub fn enabled(&self) -> EnabledSources {
        self.config.enabled
    }

    /// Most recent admitted vector, after rotation
    pub fn last_arbitrated(&self) -> Option<Delta> {
        self.last_arbitrated
    }

    /// Ticks processed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one `imu.sample` tick
    pub fn process_sample(&mut self, sample: &InertialSample) -> TickOutcome {
        self.tick(SensorInput::Inertial(sample), sample.ts)
    }

    /// Decode a camera payload and run one tick
    ///
    /// Decode failures are protocol faults; estimator state is untouched.
    pub fn process_frame(
        &mut self,
        header: &FrameHeader,
        payload: &[u8],
    ) -> Result<TickOutcome, ProtocolError> {
        let frame = decode_frame(header, payload)?;
        Ok(self.tick(SensorInput::Frame(&frame), header.ts))
    }

    /// Scale a device-fused `move.delta` by the session sensitivity
    ///
    /// Bypasses estimation, arbitration and smoothing.
    pub fn direct_delta(&self, dx: f64, dy: f64) -> Delta {
        Delta::new(dx, dy) * self.config.sensitivity
    }

    /// Drop all estimator and filter history
    pub fn reset(&mut self) {
        for estimator in &mut self.estimators {
            estimator.reset();
        }
        self.filter.reset();
        self.latest.clear();
        self.last_arbitrated = None;
    }

    fn tick(&mut self, input: SensorInput<'_>, ts_ms: f64) -> TickOutcome {
        self.ticks += 1;

        let mut vectors = Vec::new();
        for estimator in &mut self.estimators {
            let source = estimator.source();
            if !input.carries(source) {
                continue;
            }
            match estimator.estimate(&input) {
                Some(vector) if vector.delta.is_finite() => {
                    self.latest.insert(source, (vector, ts_ms));
                    vectors.push(vector);
                }
                Some(vector) => {
                    debug!("Dropping non-finite {} estimate {:?}", source, vector.delta);
                    self.latest.remove(&source);
                }
                None => {
                    self.latest.remove(&source);
                }
            }
        }

        let max_age_ms = self.max_age_ms;
        let recent: Vec<MotionVector> = self
            .latest
            .values()
            .filter(|(vector, _)| !vectors.iter().any(|v| v.source == vector.source))
            .filter(|(_, at_ms)| (0.0..=max_age_ms).contains(&(ts_ms - at_ms)))
            .map(|(vector, _)| *vector)
            .collect();

        let arbitration = self.arbiter.arbitrate_with(&vectors, &recent);
        let admitted = arbitration
            .delta()
            .map(|delta| delta.rotated(self.config.rotation_deg));
        if admitted.is_some() {
            self.last_arbitrated = admitted;
        }

        let delta = self.filter.tick(admitted, ts_ms);
        trace!(
            "tick #{} ts={} vectors={} recent={} arbitration={:?} delta=({:.3}, {:.3})",
            self.ticks,
            ts_ms,
            vectors.len(),
            recent.len(),
            arbitration,
            delta.dx,
            delta.dy
        );

        TickOutcome {
            ts_ms,
            vectors,
            recent,
            arbitration,
            delta,
        }
    }
}

impl std::fmt::Debug for FusionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionPipeline")
            .field("config", &self.config)
            .field("estimators", &self.estimators.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}
