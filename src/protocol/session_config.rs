//! Negotiated per-session configuration

use serde::Serialize;

use super::error::{ProtocolError, Result};
use super::messages::{ConfigRequest, EnabledSources};

/// Default camera sampling rate when the device does not request one
pub const DEFAULT_CAMERA_FPS: u32 = 15;

/// Highest camera sampling rate accepted
pub const MAX_CAMERA_FPS: u32 = 60;

/// Configuration fixed for one negotiation
///
/// Immutable once accepted. A later `config` produces a new value and a new
/// fusion pipeline; it never mutates this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Multiplier applied to the filtered delta (> 0)
    pub sensitivity: f64,
    /// Target camera sampling rate
    pub camera_fps: u32,
    /// EMA half-life in ms (0 disables smoothing)
    pub smoothing_half_life_ms: f64,
    /// Per-axis minimum dispatched magnitude
    pub deadzone_px: f64,
    /// Enabled sensing sources
    pub enabled: EnabledSources,
    /// Screen rotation in degrees, applied to device motion
    pub rotation_deg: f64,
}

impl SessionConfig {
    /// Validate a `config` request
    pub fn negotiate(request: ConfigRequest) -> Result<Self> {
        let sensitivity = request
            .sensitivity
            .ok_or_else(|| ProtocolError::InvalidConfig("missing field 'sensitivity'".into()))?;
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(ProtocolError::InvalidConfig(format!(
                "sensitivity must be a positive number, got {}",
                sensitivity
            )));
        }

        let enabled = request
            .enabled
            .ok_or_else(|| ProtocolError::InvalidConfig("missing field 'enabled'".into()))?;

        let camera_fps = request.camera_fps.unwrap_or(DEFAULT_CAMERA_FPS);
        if camera_fps == 0 || camera_fps > MAX_CAMERA_FPS {
            return Err(ProtocolError::InvalidConfig(format!(
                "cameraFps must be in 1..={}, got {}",
                MAX_CAMERA_FPS, camera_fps
            )));
        }

        let smoothing_half_life_ms = request.smoothing_half_life_ms.unwrap_or(0.0);
        if !smoothing_half_life_ms.is_finite() || smoothing_half_life_ms < 0.0 {
            return Err(ProtocolError::InvalidConfig(format!(
                "smoothingHalfLifeMs must be >= 0, got {}",
                smoothing_half_life_ms
            )));
        }

        let deadzone_px = request.deadzone_px.unwrap_or(0.0);
        if !deadzone_px.is_finite() || deadzone_px < 0.0 {
            return Err(ProtocolError::InvalidConfig(format!(
                "deadzonePx must be >= 0, got {}",
                deadzone_px
            )));
        }

        let rotation_deg = request.rotation_deg.unwrap_or(0.0);
        if !rotation_deg.is_finite() {
            return Err(ProtocolError::InvalidConfig(
                "rotationDeg must be finite".into(),
            ));
        }

        Ok(Self {
            sensitivity,
            camera_fps,
            smoothing_half_life_ms,
            deadzone_px,
            enabled,
            rotation_deg: rotation_deg.rem_euclid(360.0),
        })
    }
}
