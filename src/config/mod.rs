//! Configuration management
//!
//! Handles loading, validation, and merging of server configuration from:
//! - TOML files
//! - Environment variables
//! - CLI arguments
//!
//! Per-device settings (sensitivity, smoothing, enabled sources) are not
//! configured here; they are negotiated per session, see
//! [`crate::protocol::SessionConfig`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub mod types;

pub use types::{CameraConfig, FusionConfig, InputConfig, LoggingConfig, ServerConfig};

/// Largest patch grid per axis accepted for block matching
pub const MAX_CAMERA_GRID: u32 = 32;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Inertial estimator and arbitration tuning
    #[serde(default)]
    pub fusion: FusionConfig,
    /// Camera optical-flow tuning
    #[serde(default)]
    pub camera: CameraConfig,
    /// Pointer injection configuration
    #[serde(default)]
    pub input: InputConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .context("Invalid listen address")?;

        if self.server.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        if self.server.queue_depth == 0 {
            anyhow::bail!("queue_depth must be at least 1");
        }

        let fusion = &self.fusion;
        for (name, value) in [
            ("accel_gain", fusion.accel_gain),
            ("accel_clamp", fusion.accel_clamp),
            ("gyro_gain", fusion.gyro_gain),
            ("orientation_gain", fusion.orientation_gain),
            ("max_sample_gap_ms", fusion.max_sample_gap_ms),
            ("vote_min_magnitude", fusion.vote_min_magnitude),
            ("vote_max_age_ms", fusion.vote_max_age_ms),
            ("max_step_px", fusion.max_step_px),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("fusion.{} must be a non-negative number, got {}", name, value);
            }
        }

        let camera = &self.camera;
        if camera.patch_size == 0 || camera.grid == 0 {
            anyhow::bail!("camera.patch_size and camera.grid must be at least 1");
        }
        if camera.grid > MAX_CAMERA_GRID {
            anyhow::bail!(
                "camera.grid must be at most {}, got {}",
                MAX_CAMERA_GRID,
                camera.grid
            );
        }
        let min_width = camera
            .patch_size
            .saturating_add(camera.search_radius.saturating_mul(2))
            .saturating_add(1);
        if camera.working_width < min_width {
            anyhow::bail!(
                "camera.working_width ({}) must be at least patch_size + 2 * search_radius + 1 ({})",
                camera.working_width,
                min_width
            );
        }
        if !camera.pixel_scale.is_finite() || camera.pixel_scale <= 0.0 {
            anyhow::bail!("camera.pixel_scale must be positive, got {}", camera.pixel_scale);
        }

        match self.input.backend.as_str() {
            "log" | "null" => {}
            _ => anyhow::bail!("Invalid pointer backend: {}", self.input.backend),
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, listen: Option<String>, port: Option<u16>) -> Self {
        if let Some(listen_addr) = listen {
            let port = port.unwrap_or_else(|| {
                self.server
                    .listen_addr
                    .parse::<SocketAddr>()
                    .map(|addr| addr.port())
                    .unwrap_or(8765)
            });
            self.server.listen_addr = format!("{}:{}", listen_addr, port);
        } else if let Some(port) = port {
            if let Ok(mut addr) = self.server.listen_addr.parse::<SocketAddr>() {
                addr.set_port(port);
                self.server.listen_addr = addr.to_string();
            }
        }

        self
    }
}
