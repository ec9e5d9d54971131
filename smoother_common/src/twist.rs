//! Planar velocity types shared by the smoother and its producers/consumers.
//!
//! A [`Twist3`] carries linear-x, linear-y and angular-z velocities. A
//! [`StampedTwist`] adds the time at which the sample became valid. Both are
//! `Copy` snapshots: a newer sample replaces an older one wholesale.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of controlled axes (x, y, angular).
pub const AXIS_COUNT: usize = 3;

/// Controlled axis, in the fixed evaluation order used by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    /// Linear velocity along x [m/s].
    X = 0,
    /// Linear velocity along y [m/s].
    Y = 1,
    /// Angular velocity about z [rad/s].
    Angular = 2,
}

impl Axis {
    /// All axes in evaluation order.
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y, Axis::Angular];

    /// Index into per-axis arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parameter-style name (used in diagnostics).
    pub const fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Angular => "theta",
        }
    }
}

/// Velocity triple: linear-x, linear-y, angular-z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist3 {
    /// Linear x [m/s].
    pub x: f64,
    /// Linear y [m/s].
    pub y: f64,
    /// Angular z [rad/s].
    pub angular: f64,
}

impl Twist3 {
    /// The all-zero twist.
    pub const ZERO: Twist3 = Twist3 {
        x: 0.0,
        y: 0.0,
        angular: 0.0,
    };

    pub const fn new(x: f64, y: f64, angular: f64) -> Self {
        Self { x, y, angular }
    }

    /// Build from an `[x, y, angular]` array.
    #[inline]
    pub const fn from_array(v: [f64; AXIS_COUNT]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    /// `[x, y, angular]`.
    #[inline]
    pub const fn to_array(self) -> [f64; AXIS_COUNT] {
        [self.x, self.y, self.angular]
    }

    /// Component for the given axis.
    #[inline]
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Angular => self.angular,
        }
    }

    /// Set the component for the given axis.
    #[inline]
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Angular => self.angular = value,
        }
    }

    /// Apply `f` to each axis, producing a new twist.
    #[inline]
    pub fn map_axes(self, mut f: impl FnMut(Axis, f64) -> f64) -> Self {
        let mut out = Self::ZERO;
        for axis in Axis::ALL {
            out.set(axis, f(axis, self.get(axis)));
        }
        out
    }

    /// True when all three components are finite (no NaN / ±Inf).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angular.is_finite()
    }

    /// Exactly zero on every axis.
    #[inline]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[f64; AXIS_COUNT]> for Twist3 {
    fn from(v: [f64; AXIS_COUNT]) -> Self {
        Self::from_array(v)
    }
}

/// A [`Twist3`] with the time it was produced.
///
/// `stamp` is measured on the smoother's monotonic clock. A zero stamp on an
/// inbound command means "unset"; the ingester replaces it with receipt time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StampedTwist {
    pub twist: Twist3,
    pub stamp: Duration,
}

impl StampedTwist {
    pub const fn new(twist: Twist3, stamp: Duration) -> Self {
        Self { twist, stamp }
    }

    /// Zero twist at `stamp`.
    pub const fn zero_at(stamp: Duration) -> Self {
        Self::new(Twist3::ZERO, stamp)
    }
}

static_assertions::assert_eq_size!(Twist3, [f64; AXIS_COUNT]);
static_assertions::assert_impl_all!(StampedTwist: Send, Sync, Copy);
