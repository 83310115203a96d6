//! Planar motion vectors

use serde::Serialize;
use std::ops::{Add, AddAssign, Mul, Sub};

use crate::protocol::SourceKind;

/// 2D displacement (x right, y down)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Delta {
    /// Horizontal component
    pub dx: f64,
    /// Vertical component
    pub dy: f64,
}

impl Delta {
    /// Zero displacement
    pub const ZERO: Delta = Delta { dx: 0.0, dy: 0.0 };

    /// Create a new delta
    #[inline]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Euclidean length
    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// True when neither component is NaN or infinite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }

    /// True when both components are exactly zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    /// Rotate counter-clockwise (in screen coordinates) by `degrees`
    ///
    /// Quarter turns are exact so axis-aligned deltas stay axis-aligned.
    pub fn rotated(&self, degrees: f64) -> Delta {
        let quarter = degrees / 90.0;
        if quarter.fract() == 0.0 {
            return match (quarter as i64).rem_euclid(4) {
                0 => *self,
                1 => Delta::new(self.dy, -self.dx),
                2 => Delta::new(-self.dx, -self.dy),
                _ => Delta::new(-self.dy, self.dx),
            };
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        Delta::new(
            self.dx * cos + self.dy * sin,
            -self.dx * sin + self.dy * cos,
        )
    }
}

impl Add for Delta {
    type Output = Delta;

    fn add(self, rhs: Delta) -> Delta {
        Delta::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl AddAssign for Delta {
    fn add_assign(&mut self, rhs: Delta) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

impl Sub for Delta {
    type Output = Delta;

    fn sub(self, rhs: Delta) -> Delta {
        Delta::new(self.dx - rhs.dx, self.dy - rhs.dy)
    }
}

impl Mul<f64> for Delta {
    type Output = Delta;

    fn mul(self, rhs: f64) -> Delta {
        Delta::new(self.dx * rhs, self.dy * rhs)
    }
}

/// One source's motion estimate for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionVector {
    /// Producing source
    pub source: SourceKind,
    /// Estimated displacement
    pub delta: Delta,
}

impl MotionVector {
    /// Create a new motion vector
    pub fn new(source: SourceKind, dx: f64, dy: f64) -> Self {
        Self {
            source,
            delta: Delta::new(dx, dy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_rotations_are_exact() {
        let right = Delta::new(3.0, 0.0);
        assert_eq!(right.rotated(0.0), right);
        assert_eq!(right.rotated(90.0), Delta::new(0.0, -3.0));
        assert_eq!(right.rotated(180.0), Delta::new(-3.0, 0.0));
        assert_eq!(right.rotated(270.0), Delta::new(0.0, 3.0));
        assert_eq!(right.rotated(-90.0), Delta::new(0.0, 3.0));
    }

    #[test]
    fn test_arbitrary_rotation_preserves_length() {
        let d = Delta::new(3.0, 4.0);
        let r = d.rotated(33.0);
        assert!((r.magnitude() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_arithmetic() {
        let mut d = Delta::new(1.0, 2.0) + Delta::new(0.5, -1.0);
        assert_eq!(d, Delta::new(1.5, 1.0));
        d += Delta::new(1.0, 1.0);
        assert_eq!(d * 2.0, Delta::new(5.0, 4.0));
        assert_eq!(d - d, Delta::ZERO);
        assert!(Delta::ZERO.is_zero());
    }
}
