//! Cross-axis acceleration constraint solver.
//!
//! Maps "current velocity + requested velocity" to one feasible output sample
//! for a single tick of length `1 / f`.
//!
//! ## Direction
//! An axis is *accelerating* when `|v_cmd| >= |v_curr|` and
//! `v_curr · v_cmd >= 0` (magnitude grows without crossing zero). The
//! one-tick delta is then bounded by `±accel / f`; otherwise by
//! `[decel / f, -decel / f]`.
//!
//! ## Eta
//! When velocity scaling is enabled, every axis whose delta falls outside
//! its bounds proposes `eta = bound / dv`. The proposal furthest from 1.0 is
//! applied to all three axes, so the requested change shrinks uniformly
//! and keeps its direction. A final per-axis clamp keeps each axis inside
//! its own bounds even when the shared eta was chosen by another axis.

use smoother_common::smoother::config::{AxisLimits, KinematicLimits};
use smoother_common::twist::{AXIS_COUNT, Axis, Twist3};

/// One-tick delta window for an axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaBounds {
    pub lower: f64,
    pub upper: f64,
}

impl DeltaBounds {
    /// Bounds for moving from `v_curr` to `v_cmd` at loop frequency `frequency`.
    #[inline]
    pub fn new(v_curr: f64, v_cmd: f64, accel: f64, decel: f64, frequency: f64) -> Self {
        if is_accelerating(v_curr, v_cmd) {
            Self {
                lower: -accel / frequency,
                upper: accel / frequency,
            }
        } else {
            Self {
                lower: decel / frequency,
                upper: -decel / frequency,
            }
        }
    }

    #[inline]
    pub fn clamp(&self, dv: f64) -> f64 {
        dv.clamp(self.lower, self.upper)
    }
}

/// Speed is growing without passing through zero.
#[inline]
pub fn is_accelerating(v_curr: f64, v_cmd: f64) -> bool {
    v_cmd.abs() >= v_curr.abs() && v_curr * v_cmd >= 0.0
}

/// Scale factor this axis needs to stay within its delta bounds.
///
/// `None` when the requested change already fits.
pub fn find_eta_constraint(
    v_curr: f64,
    v_cmd: f64,
    accel: f64,
    decel: f64,
    frequency: f64,
) -> Option<f64> {
    let dv = v_cmd - v_curr;
    let bounds = DeltaBounds::new(v_curr, v_cmd, accel, decel, frequency);

    if dv > bounds.upper {
        Some(bounds.upper / dv)
    } else if dv < bounds.lower {
        Some(bounds.lower / dv)
    } else {
        None
    }
}

/// Output velocity for one axis after scaling the delta by `eta` and
/// clamping it to the axis' own bounds.
pub fn apply_constraints(
    v_curr: f64,
    v_cmd: f64,
    accel: f64,
    decel: f64,
    eta: f64,
    frequency: f64,
) -> f64 {
    let dv = v_cmd - v_curr;
    let bounds = DeltaBounds::new(v_curr, v_cmd, accel, decel, frequency);
    v_curr + bounds.clamp(eta * dv)
}

/// Pick the most restrictive proposal, in axis order.
///
/// Only strictly positive proposals count: an axis with a zero bound
/// proposes `eta = 0`, which would freeze every other axis, so it is left
/// to its own clamp instead.
pub fn select_eta(proposals: [Option<f64>; AXIS_COUNT]) -> f64 {
    let mut eta = 1.0_f64;
    for candidate in proposals.into_iter().flatten() {
        if candidate > 0.0 && (1.0 - candidate).abs() > (1.0 - eta).abs() {
            eta = candidate;
        }
    }
    eta
}

/// Per-tick solver configured from the live parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSolver {
    frequency: f64,
    scale_velocities: bool,
}

impl ConstraintSolver {
    pub fn new(frequency: f64, scale_velocities: bool) -> Self {
        Self {
            frequency,
            scale_velocities,
        }
    }

    /// Eta proposal for one axis.
    #[inline]
    fn probe(&self, limits: &AxisLimits, v_curr: f64, v_cmd: f64) -> Option<f64> {
        find_eta_constraint(v_curr, v_cmd, limits.max_accel, limits.max_decel, self.frequency)
    }

    /// Global scale factor; 1.0 when scaling is disabled.
    pub fn eta(&self, current: Twist3, command: Twist3, limits: &KinematicLimits) -> f64 {
        if !self.scale_velocities {
            return 1.0;
        }
        select_eta(
            Axis::ALL.map(|axis| self.probe(limits.axis(axis), current.get(axis), command.get(axis))),
        )
    }

    /// Smoothed output sample for one tick.
    ///
    /// `command` must already be clamped to the absolute velocity limits.
    pub fn solve(&self, current: Twist3, command: Twist3, limits: &KinematicLimits) -> Twist3 {
        let eta = self.eta(current, command, limits);
        command.map_axes(|axis, v_cmd| {
            let lim = limits.axis(axis);
            apply_constraints(
                current.get(axis),
                v_cmd,
                lim.max_accel,
                lim.max_decel,
                eta,
                self.frequency,
            )
        })
    }
}
