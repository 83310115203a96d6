//! Vote Arbiter
//!
//! Reconciles the vectors produced by enabled sources in one tick.
//!
//! # Policy
//!
//! - One enabled source: its vector passes through unmodified.
//! - Several: each vector votes for a coarse direction bin (dominant axis,
//!   then sign). Movement is admitted only when a strict majority of the
//!   sources that voted agree; the result points along the winning bin with
//!   the mean of the agreeing vectors' components on that axis.
//! - Ties, splits, and ticks with no votes produce no movement.
//!
//! Sources without an estimate this tick, and vectors shorter than the vote
//! threshold, are left out of the denominator.
//!
//! Sources report on different ticks (camera frames and inertial samples
//! arrive separately), so a still-fresh vector from another source also
//! votes. It only validates: the dispatched length comes from this tick's
//! vectors.

use serde::Serialize;
use std::fmt;

use crate::estimator::{Delta, MotionVector};
use crate::protocol::EnabledSources;

/// Coarse direction bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Negative y
    Up,
    /// Positive y
    Down,
    /// Negative x
    Left,
    /// Positive x
    Right,
}

impl Direction {
    /// Bin a vector; `None` when shorter than `min_magnitude`
    ///
    /// Equal |dx| and |dy| bins horizontally.
    pub fn of(delta: &Delta, min_magnitude: f64) -> Option<Direction> {
        if delta.magnitude() < min_magnitude || delta.is_zero() {
            return None;
        }
        Some(if delta.dx.abs() >= delta.dy.abs() {
            if delta.dx > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if delta.dy > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        })
    }

    /// Component of `delta` along this bin's axis, as an unsigned length
    pub fn component(&self, delta: &Delta) -> f64 {
        match self {
            Direction::Left | Direction::Right => delta.dx.abs(),
            Direction::Up | Direction::Down => delta.dy.abs(),
        }
    }

    /// Axis-aligned delta of the given length pointing this way
    pub fn scaled(&self, length: f64) -> Delta {
        match self {
            Direction::Up => Delta::new(0.0, -length),
            Direction::Down => Delta::new(0.0, length),
            Direction::Left => Delta::new(-length, 0.0),
            Direction::Right => Delta::new(length, 0.0),
        }
    }

    fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

/// Outcome of one arbitration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arbitration {
    /// Single enabled source, vector passed through
    PassThrough {
        /// Source vector
        delta: Delta,
    },
    /// Strict majority agreed
    Admitted {
        /// Winning bin
        direction: Direction,
        /// Arbitrated vector
        delta: Delta,
        /// Votes for the winning bin
        votes: usize,
        /// Votes cast
        cast: usize,
    },
    /// Votes were cast but no bin won with a vector from this tick
    Suppressed {
        /// Votes cast
        cast: usize,
    },
    /// Nothing to arbitrate this tick
    Idle,
}

impl Arbitration {
    /// Movement to feed the filter, if any
    pub fn delta(&self) -> Option<Delta> {
        match self {
            Arbitration::PassThrough { delta } | Arbitration::Admitted { delta, .. } => {
                Some(*delta)
            }
            Arbitration::Suppressed { .. } | Arbitration::Idle => None,
        }
    }
}

/// Majority-direction arbiter for one negotiated source set
#[derive(Debug, Clone)]
pub struct VoteArbiter {
    enabled: EnabledSources,
    min_magnitude: f64,
}

impl VoteArbiter {
    /// Create an arbiter for the given enabled set
    pub fn new(enabled: EnabledSources, min_magnitude: f64) -> Self {
        Self {
            enabled,
            min_magnitude,
        }
    }

    /// Arbitrate this tick's vectors
    pub fn arbitrate(&self, vectors: &[MotionVector]) -> Arbitration {
        self.arbitrate_with(vectors, &[])
    }

    /// Arbitrate this tick's vectors together with recent ones
    ///
    /// `recent` holds still-fresh vectors that other sources produced on
    /// earlier ticks. They vote but never contribute magnitude, so motion
    /// is dispatched only once. A source present in `vectors` is not counted
    /// again from `recent`, and the winning bin must contain at least one of
    /// this tick's vectors.
    pub fn arbitrate_with(&self, vectors: &[MotionVector], recent: &[MotionVector]) -> Arbitration {
        let current: Vec<&MotionVector> = vectors
            .iter()
            .filter(|v| self.enabled.contains(v.source))
            .collect();

        if self.enabled.count() <= 1 {
            return match current.first() {
                Some(v) => Arbitration::PassThrough { delta: v.delta },
                None => Arbitration::Idle,
            };
        }

        let ballots: Vec<(Direction, &MotionVector)> = current
            .into_iter()
            .filter_map(|v| Direction::of(&v.delta, self.min_magnitude).map(|d| (d, v)))
            .collect();
        if ballots.is_empty() {
            return Arbitration::Idle;
        }

        let carried: Vec<Direction> = recent
            .iter()
            .filter(|v| self.enabled.contains(v.source))
            .filter(|v| !vectors.iter().any(|c| c.source == v.source))
            .filter_map(|v| Direction::of(&v.delta, self.min_magnitude))
            .collect();

        let cast = ballots.len() + carried.len();
        let mut tally = [0usize; 4];
        for direction in ballots.iter().map(|(d, _)| d).chain(&carried) {
            tally[direction.index()] += 1;
        }

        let Some(winner) = Direction::ALL
            .into_iter()
            .find(|d| tally[d.index()] * 2 > cast)
        else {
            return Arbitration::Suppressed { cast };
        };

        let agreeing: Vec<f64> = ballots
            .iter()
            .filter(|(d, _)| *d == winner)
            .map(|(_, v)| winner.component(&v.delta))
            .collect();
        if agreeing.is_empty() {
            // Majority came from earlier ticks only
            return Arbitration::Suppressed { cast };
        }
        let length = agreeing.iter().sum::<f64>() / agreeing.len() as f64;

        Arbitration::Admitted {
            direction: winner,
            delta: winner.scaled(length),
            votes: tally[winner.index()],
            cast,
        }
    }
}
