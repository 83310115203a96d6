//! Camera Optical-Flow Estimator
//!
//! Coarse block matching between consecutive luma frames of the desk surface
//! under the device.
//!
//! # Algorithm
//!
//! ```text
//! Payload → decode → luma → downsample (≤ working_width) → patch grid
//!        → SAD search per patch (±search_radius) → median displacement
//!        → negate (desk moves opposite the device) → scale to cursor units
//! ```
//!
//! Textureless patches are skipped. The median over the remaining patches
//! keeps a few mismatches on repeated texture from steering the result.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat};
use tracing::{debug, trace};

use super::vector::MotionVector;
use super::{MotionEstimator, SensorInput};
use crate::config::CameraConfig;
use crate::protocol::{FrameHeader, ProtocolError, SourceKind};

/// Encoding name for raw 8-bit luma payloads
pub const RAW_LUMA_ENCODING: &str = "gray8";

/// Decode a frame payload into a luma image
///
/// Accepts any `image/*` type the `image` crate can decode, or
/// [`RAW_LUMA_ENCODING`] with exactly `width * height` bytes.
pub fn decode_frame(header: &FrameHeader, payload: &[u8]) -> Result<GrayImage, ProtocolError> {
    let encoding = header.encoding.trim().to_ascii_lowercase();

    if encoding == RAW_LUMA_ENCODING {
        let expected = header.width as usize * header.height as usize;
        if payload.len() != expected || expected == 0 {
            return Err(ProtocolError::FrameSize {
                expected,
                actual: payload.len(),
            });
        }
        return GrayImage::from_raw(header.width, header.height, payload.to_vec()).ok_or(
            ProtocolError::FrameSize {
                expected,
                actual: payload.len(),
            },
        );
    }

    if !encoding.starts_with("image/") {
        return Err(ProtocolError::UnsupportedEncoding(header.encoding.clone()));
    }

    let decoded = match ImageFormat::from_mime_type(&encoding) {
        Some(format) => image::load_from_memory_with_format(payload, format),
        None => image::load_from_memory(payload),
    }
    .map_err(|e| ProtocolError::FrameDecode(e.to_string()))?;

    if decoded.width() != header.width || decoded.height() != header.height {
        debug!(
            "Frame {} header says {}x{}, decoded {}x{}",
            header.seq,
            header.width,
            header.height,
            decoded.width(),
            decoded.height()
        );
    }

    Ok(decoded.to_luma8())
}

/// Result of matching one frame pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEstimate {
    /// Median displacement of image content (working pixels)
    pub shift_x: f64,
    /// Median displacement of image content (working pixels)
    pub shift_y: f64,
    /// Patches that contributed
    pub patches: usize,
}

/// Block-matching optical-flow estimator
pub struct CameraEstimator {
    config: CameraConfig,
    /// Previous frame at working resolution
    previous: Option<GrayImage>,
    /// Source dimensions of the previous frame
    previous_dims: Option<(u32, u32)>,
}

impl CameraEstimator {
    /// Create a new camera estimator
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            previous: None,
            previous_dims: None,
        }
    }

    /// Downsample to the working width, preserving aspect ratio
    fn to_working(&self, frame: &GrayImage) -> GrayImage {
        let width = frame.width();
        if width <= self.config.working_width {
            return frame.clone();
        }
        let height = ((frame.height() as u64 * self.config.working_width as u64) / width as u64)
            .max(1) as u32;
        imageops::resize(frame, self.config.working_width, height, FilterType::Triangle)
    }

    /// Match `current` against `previous`, both at working resolution
    pub fn match_frames(&self, previous: &GrayImage, current: &GrayImage) -> Option<FlowEstimate> {
        let patch = self.config.patch_size;
        let radius = self.config.search_radius;
        let grid = self.config.grid;
        let (width, height) = previous.dimensions();

        let margin = radius;
        if width < patch + 2 * margin || height < patch + 2 * margin {
            trace!("Frame {}x{} too small for block matching", width, height);
            return None;
        }

        let span_x = width - patch - 2 * margin;
        let span_y = height - patch - 2 * margin;
        let mut shifts_x = Vec::with_capacity((grid * grid) as usize);
        let mut shifts_y = Vec::with_capacity((grid * grid) as usize);

        for gy in 0..grid {
            for gx in 0..grid {
                let x = margin + grid_offset(gx, grid, span_x);
                let y = margin + grid_offset(gy, grid, span_y);

                if patch_contrast(previous, x, y, patch) < self.config.min_patch_contrast {
                    continue;
                }

                let (ox, oy) = self.best_offset(previous, current, x, y);
                shifts_x.push(ox as f64);
                shifts_y.push(oy as f64);
            }
        }

        if shifts_x.len() < self.config.min_patches.max(1) {
            trace!(
                "Only {} textured patches (need {})",
                shifts_x.len(),
                self.config.min_patches
            );
            return None;
        }

        Some(FlowEstimate {
            shift_x: median(&mut shifts_x),
            shift_y: median(&mut shifts_y),
            patches: shifts_x.len(),
        })
    }

    /// Exhaustive SAD search; ties prefer the smaller displacement
    fn best_offset(&self, previous: &GrayImage, current: &GrayImage, x: u32, y: u32) -> (i32, i32) {
        let radius = self.config.search_radius as i32;
        let mut best = (u32::MAX, i32::MAX, 0, 0);

        for oy in -radius..=radius {
            for ox in -radius..=radius {
                let cx = (x as i32 + ox) as u32;
                let cy = (y as i32 + oy) as u32;
                let sad = patch_sad(previous, current, (x, y), (cx, cy), self.config.patch_size);
                let dist = ox * ox + oy * oy;
                if (sad, dist) < (best.0, best.1) {
                    best = (sad, dist, ox, oy);
                }
            }
        }

        (best.2, best.3)
    }
}

impl MotionEstimator for CameraEstimator {
    fn source(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn estimate(&mut self, input: &SensorInput<'_>) -> Option<MotionVector> {
        let SensorInput::Frame(frame) = input else {
            return None;
        };

        let dims = frame.dimensions();
        let working = self.to_working(frame);
        let previous = self.previous.replace(working);
        let previous_dims = self.previous_dims.replace(dims);

        if previous_dims != Some(dims) {
            if previous_dims.is_some() {
                debug!(
                    "Camera frame size changed {:?} -> {:?}, reseeding",
                    previous_dims, dims
                );
            }
            return None;
        }

        let previous = previous?;
        let current = self.previous.as_ref()?;
        let flow = self.match_frames(&previous, current)?;

        let scale = dims.0 as f64 / current.width() as f64 * self.config.pixel_scale;
        trace!(
            "Camera flow ({:.1}, {:.1}) from {} patches",
            flow.shift_x,
            flow.shift_y,
            flow.patches
        );

        Some(MotionVector::new(
            SourceKind::Camera,
            -flow.shift_x * scale,
            -flow.shift_y * scale,
        ))
    }

    fn reset(&mut self) {
        self.previous = None;
        self.previous_dims = None;
    }
}

/// Evenly spaced patch origin along one axis
fn grid_offset(index: u32, grid: u32, span: u32) -> u32 {
    if grid <= 1 {
        span / 2
    } else {
        index * span / (grid - 1)
    }
}

/// Luma range (max - min) within a patch
fn patch_contrast(image: &GrayImage, x: u32, y: u32, size: u32) -> u8 {
    let width = image.width() as usize;
    let raw = image.as_raw();
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for row in y..y + size {
        let start = row as usize * width + x as usize;
        for &value in &raw[start..start + size as usize] {
            lo = lo.min(value);
            hi = hi.max(value);
        }
    }
    hi.saturating_sub(lo)
}

/// Sum of absolute differences between two equally sized patches
fn patch_sad(a: &GrayImage, b: &GrayImage, at: (u32, u32), bt: (u32, u32), size: u32) -> u32 {
    let width = a.width() as usize;
    let (ra, rb) = (a.as_raw(), b.as_raw());
    let mut sad = 0u32;
    for row in 0..size as usize {
        let sa = (at.1 as usize + row) * width + at.0 as usize;
        let sb = (bt.1 as usize + row) * width + bt.0 as usize;
        sad += ra[sa..sa + size as usize]
            .iter()
            .zip(&rb[sb..sb + size as usize])
            .map(|(&p, &q)| p.abs_diff(q) as u32)
            .sum::<u32>();
    }
    sad
}

/// Median of a non-empty slice (mean of the middle pair for even lengths)
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
