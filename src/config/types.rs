//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8765")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Maximum number of concurrent device sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Inbound message queue depth per session
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8765".to_string()
}
fn default_max_connections() -> usize {
    4
}
fn default_queue_depth() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Inertial estimator and arbitration tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Accelerometer gain (px per m/s² per second)
    #[serde(default = "default_accel_gain")]
    pub accel_gain: f64,

    /// Clamp applied to each acceleration axis (m/s²)
    #[serde(default = "default_accel_clamp")]
    pub accel_clamp: f64,

    /// Gyroscope gain (px per degree rotated)
    #[serde(default = "default_gyro_gain")]
    pub gyro_gain: f64,

    /// Orientation gain (px per degree/second)
    #[serde(default = "default_orientation_gain")]
    pub orientation_gain: f64,

    /// Largest gap between inertial samples still used for an estimate (ms)
    #[serde(default = "default_max_sample_gap_ms")]
    pub max_sample_gap_ms: f64,

    /// Vectors shorter than this cast no vote
    #[serde(default = "default_vote_min_magnitude")]
    pub vote_min_magnitude: f64,

    /// How long a source's last vector keeps voting on other sources' ticks (ms)
    #[serde(default = "default_vote_max_age_ms")]
    pub vote_max_age_ms: f64,

    /// Per-axis clamp on the dispatched delta (0 = unlimited)
    #[serde(default = "default_max_step_px")]
    pub max_step_px: f64,
}

fn default_accel_gain() -> f64 {
    120.0
}
fn default_accel_clamp() -> f64 {
    20.0
}
fn default_gyro_gain() -> f64 {
    2.0
}
fn default_orientation_gain() -> f64 {
    0.02
}
fn default_max_sample_gap_ms() -> f64 {
    200.0
}
fn default_vote_min_magnitude() -> f64 {
    0.01
}
fn default_vote_max_age_ms() -> f64 {
    250.0
}
fn default_max_step_px() -> f64 {
    120.0
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            accel_gain: default_accel_gain(),
            accel_clamp: default_accel_clamp(),
            gyro_gain: default_gyro_gain(),
            orientation_gain: default_orientation_gain(),
            max_sample_gap_ms: default_max_sample_gap_ms(),
            vote_min_magnitude: default_vote_min_magnitude(),
            vote_max_age_ms: default_vote_max_age_ms(),
            max_step_px: default_max_step_px(),
        }
    }
}

/// Camera optical-flow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frames wider than this are downsampled before matching (pixels)
    #[serde(default = "default_working_width")]
    pub working_width: u32,

    /// Edge length of each matched patch (pixels, working resolution)
    #[serde(default = "default_patch_size")]
    pub patch_size: u32,

    /// Patches per axis in the sampling grid
    #[serde(default = "default_grid")]
    pub grid: u32,

    /// Maximum displacement searched per axis (pixels, working resolution)
    #[serde(default = "default_search_radius")]
    pub search_radius: u32,

    /// Patches with a smaller luma range are skipped as textureless
    #[serde(default = "default_min_patch_contrast")]
    pub min_patch_contrast: u8,

    /// Minimum textured patches needed for an estimate
    #[serde(default = "default_min_patches")]
    pub min_patches: usize,

    /// Cursor units per source image pixel
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: f64,
}

fn default_working_width() -> u32 {
    80
}
fn default_patch_size() -> u32 {
    8
}
fn default_grid() -> u32 {
    5
}
fn default_search_radius() -> u32 {
    4
}
fn default_min_patch_contrast() -> u8 {
    12
}
fn default_min_patches() -> usize {
    3
}
fn default_pixel_scale() -> f64 {
    2.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            working_width: default_working_width(),
            patch_size: default_patch_size(),
            grid: default_grid(),
            search_radius: default_search_radius(),
            min_patch_contrast: default_min_patch_contrast(),
            min_patches: default_min_patches(),
            pixel_scale: default_pixel_scale(),
        }
    }
}

/// Pointer injection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Pointer backend ("log", "null")
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_backend() -> String {
    "log".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily rolling log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}
