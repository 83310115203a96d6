//! Temporal Filter
//!
//! Smooths the arbitrated vector over time and shapes it into the delta
//! handed to the dispatcher.
//!
//! # Smoothing
//!
//! Time-based exponential moving average with a configurable half-life H:
//!
//! ```text
//! alpha    = 1 - 0.5^(dt / H)
//! smoothed = smoothed + alpha * (target - smoothed)
//! ```
//!
//! A constant input reaches half its value after H ms regardless of tick
//! rate. H = 0 passes the input straight through.
//!
//! # Output Shaping
//!
//! ```text
//! out = smoothed * sensitivity
//! out.axis = 0            if |out.axis| < deadzone
//! out.axis = clamp(out.axis, ±max_step)
//! ```
//!
//! Ticks without admitted movement decay the smoothed state toward zero but
//! always dispatch exactly zero.

use tracing::trace;

use crate::estimator::Delta;
use crate::protocol::SessionConfig;

/// EMA blending factor for `dt_ms` elapsed under half-life `half_life_ms`
pub fn smoothing_alpha(dt_ms: f64, half_life_ms: f64) -> f64 {
    if half_life_ms <= 0.0 {
        return 1.0;
    }
    if dt_ms <= 0.0 {
        return 0.0;
    }
    1.0 - 0.5f64.powf(dt_ms / half_life_ms)
}

/// Per-session temporal filter
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    half_life_ms: f64,
    sensitivity: f64,
    deadzone_px: f64,
    max_step_px: f64,
    smoothed: Delta,
    last_tick_ms: Option<f64>,
}

impl TemporalFilter {
    /// Create a filter for a negotiated session
    ///
    /// `max_step_px` of 0 disables the output clamp.
    pub fn new(config: &SessionConfig, max_step_px: f64) -> Self {
        Self {
            half_life_ms: config.smoothing_half_life_ms,
            sensitivity: config.sensitivity,
            deadzone_px: config.deadzone_px,
            max_step_px,
            smoothed: Delta::ZERO,
            last_tick_ms: None,
        }
    }

    /// Advance one tick
    ///
    /// `input` is the arbitrated vector, or `None` when nothing was
    /// admitted. `now_ms` is the device timestamp of the tick. The first
    /// tick only seeds the clock, so smoothing starts from rest.
    pub fn tick(&mut self, input: Option<Delta>, now_ms: f64) -> Delta {
        // A non-finite target would poison the smoothed state for good
        let input = input.filter(Delta::is_finite);
        let dt_ms = match self.last_tick_ms {
            Some(last) => (now_ms - last).max(0.0),
            None => 0.0,
        };
        self.last_tick_ms = Some(now_ms);

        let target = input.unwrap_or(Delta::ZERO);
        let alpha = smoothing_alpha(dt_ms, self.half_life_ms);
        self.smoothed += (target - self.smoothed) * alpha;

        if input.is_none() {
            return Delta::ZERO;
        }

        let shaped = self.shape(self.smoothed * self.sensitivity);
        trace!(
            "filter dt={:.1}ms alpha={:.3} smoothed=({:.3}, {:.3}) out=({:.3}, {:.3})",
            dt_ms,
            alpha,
            self.smoothed.dx,
            self.smoothed.dy,
            shaped.dx,
            shaped.dy
        );
        shaped
    }

    fn shape(&self, delta: Delta) -> Delta {
        Delta::new(
            self.shape_axis(delta.dx),
            self.shape_axis(delta.dy),
        )
    }

    fn shape_axis(&self, value: f64) -> f64 {
        let value = apply_deadzone(value, self.deadzone_px);
        if self.max_step_px > 0.0 {
            value.clamp(-self.max_step_px, self.max_step_px)
        } else {
            value
        }
    }

    /// Current smoothed vector, before sensitivity
    pub fn smoothed(&self) -> Delta {
        self.smoothed
    }

    /// Return to rest and forget the tick clock
    pub fn reset(&mut self) {
        self.smoothed = Delta::ZERO;
        self.last_tick_ms = None;
    }
}

fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EnabledSources;
    use proptest::prelude::*;

    fn session(sensitivity: f64, half_life_ms: f64, deadzone_px: f64) -> SessionConfig {
        SessionConfig {
            sensitivity,
            camera_fps: 15,
            smoothing_half_life_ms: half_life_ms,
            deadzone_px,
            enabled: EnabledSources::default(),
            rotation_deg: 0.0,
        }
    }

    #[test]
    fn test_alpha() {
        assert_eq!(smoothing_alpha(10.0, 0.0), 1.0);
        assert_eq!(smoothing_alpha(0.0, 50.0), 0.0);
        assert!((smoothing_alpha(50.0, 50.0) - 0.5).abs() < 1e-12);
        assert!((smoothing_alpha(100.0, 50.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_passthrough_without_smoothing() {
        let mut filter = TemporalFilter::new(&session(1.0, 0.0, 0.0), 0.0);
        assert_eq!(filter.tick(Some(Delta::new(6.0, 0.0)), 0.0), Delta::new(6.0, 0.0));
        assert_eq!(filter.tick(Some(Delta::new(-2.0, 1.0)), 20.0), Delta::new(-2.0, 1.0));
    }

    #[test]
    fn test_non_finite_input_does_not_poison_state() {
        let mut filter = TemporalFilter::new(&session(1.0, 50.0, 0.0), 0.0);
        filter.tick(Some(Delta::new(4.0, 0.0)), 0.0);
        assert_eq!(filter.tick(Some(Delta::new(f64::INFINITY, 0.0)), 50.0), Delta::ZERO);
        assert!(filter.smoothed().is_finite());

        let out = filter.tick(Some(Delta::new(4.0, 0.0)), 100.0);
        assert!(out.is_finite());
        assert!(out.dx > 0.0);
    }

    #[test]
    fn test_half_life_reaches_half() {
        let mut filter = TemporalFilter::new(&session(1.0, 40.0, 0.0), 0.0);
        let v = Delta::new(10.0, 0.0);
        assert_eq!(filter.tick(Some(v), 1000.0), Delta::ZERO);
        let out = filter.tick(Some(v), 1040.0);
        assert!((out.dx - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensitivity_scales_output() {
        let mut filter = TemporalFilter::new(&session(2.5, 0.0, 0.0), 0.0);
        assert_eq!(filter.tick(Some(Delta::new(2.0, -4.0)), 0.0), Delta::new(5.0, -10.0));
    }

    #[test]
    fn test_deadzone_per_axis() {
        let mut filter = TemporalFilter::new(&session(1.0, 0.0, 0.5), 0.0);
        assert_eq!(filter.tick(Some(Delta::new(0.3, 2.0)), 0.0), Delta::new(0.0, 2.0));
        assert_eq!(filter.tick(Some(Delta::new(0.3, -0.2)), 10.0), Delta::ZERO);
    }

    #[test]
    fn test_suppressed_tick_dispatches_zero_and_decays() {
        let mut filter = TemporalFilter::new(&session(1.0, 50.0, 0.0), 0.0);
        filter.tick(Some(Delta::new(8.0, 0.0)), 0.0);
        filter.tick(Some(Delta::new(8.0, 0.0)), 50.0);
        assert!((filter.smoothed().dx - 4.0).abs() < 1e-9);

        assert_eq!(filter.tick(None, 100.0), Delta::ZERO);
        assert!((filter.smoothed().dx - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_step_clamp() {
        let mut filter = TemporalFilter::new(&session(1.0, 0.0, 0.0), 10.0);
        let out = filter.tick(Some(Delta::new(30.0, -4.0)), 0.0);
        assert_eq!(out, Delta::new(10.0, -4.0));
        let out = filter.tick(Some(Delta::new(-50.0, 12.0)), 10.0);
        assert_eq!(out, Delta::new(-10.0, 10.0));
    }

    #[test]
    fn test_reset_returns_to_rest() {
        let mut filter = TemporalFilter::new(&session(1.0, 30.0, 0.0), 0.0);
        filter.tick(Some(Delta::new(8.0, 0.0)), 0.0);
        filter.tick(Some(Delta::new(8.0, 0.0)), 30.0);
        filter.reset();
        assert_eq!(filter.smoothed(), Delta::ZERO);
        assert_eq!(filter.tick(Some(Delta::new(8.0, 0.0)), 500.0), Delta::ZERO);
    }

    proptest! {
        #[test]
        fn prop_deadzone_zeroes_small_axes(
            dx in -20.0f64..20.0,
            dy in -20.0f64..20.0,
            deadzone in 0.0f64..10.0,
        ) {
            let mut filter = TemporalFilter::new(&session(1.0, 0.0, deadzone), 0.0);
            let out = filter.tick(Some(Delta::new(dx, dy)), 0.0);
            for (input, output) in [(dx, out.dx), (dy, out.dy)] {
                if input.abs() < deadzone {
                    prop_assert_eq!(output, 0.0);
                } else {
                    prop_assert_eq!(output, input);
                }
            }
        }

        #[test]
        fn prop_half_life_converges_halfway(
            v in 0.5f64..100.0,
            half_life in 1.0f64..500.0,
            start in 0.0f64..1.0e6,
        ) {
            let mut filter = TemporalFilter::new(&session(1.0, half_life, 0.0), 0.0);
            filter.tick(Some(Delta::new(v, 0.0)), start);
            let out = filter.tick(Some(Delta::new(v, 0.0)), start + half_life);
            prop_assert!((out.dx - v * 0.5).abs() < 1e-6 * v.max(1.0));
        }
    }
}
