//! Parameter surface of the velocity smoother.
//!
//! [`SmootherConfig`] is the serde/TOML view (one field per tunable).
//! [`LiveConfig`] is the validated, immutable snapshot the loop reads each
//! tick; it is only ever built through [`LiveConfig::new`], so every live
//! snapshot satisfies the kinematic invariants:
//!
//! - `min_velocity <= 0 <= max_velocity`
//! - `max_accel >= 0`, `max_decel <= 0`, `deadband >= 0`
//! - `smoothing_frequency > 0`, `velocity_timeout >= 0`, `odom_duration > 0`
//!
//! The same checks run at startup and on every live reconfiguration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{
    DEADBAND_VELOCITY_DEFAULT, MAX_ACCEL_DEFAULT, MAX_DECEL_DEFAULT, MAX_VELOCITY_DEFAULT,
    MIN_VELOCITY_DEFAULT, ODOM_DURATION_DEFAULT, SMOOTHING_FREQUENCY_DEFAULT,
    VELOCITY_TIMEOUT_DEFAULT,
};
use crate::twist::{AXIS_COUNT, Axis};

// ─── Feedback Mode ──────────────────────────────────────────────────

/// Source of the "current velocity" estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackMode {
    /// Last commanded output is the current velocity.
    #[default]
    OpenLoop,
    /// Time-averaged external odometry is the current velocity.
    ClosedLoop,
}

impl FeedbackMode {
    /// Parse the parameter string (`OPEN_LOOP` / `CLOSED_LOOP`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN_LOOP" => Some(Self::OpenLoop),
            "CLOSED_LOOP" => Some(Self::ClosedLoop),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenLoop => "OPEN_LOOP",
            Self::ClosedLoop => "CLOSED_LOOP",
        }
    }
}

// ─── Per-Axis Limits ────────────────────────────────────────────────

/// Kinematic bounds for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub min_velocity: f64,
    pub max_velocity: f64,
    /// Acceleration magnitude (>= 0).
    pub max_accel: f64,
    /// Deceleration (<= 0).
    pub max_decel: f64,
    /// Outputs with smaller magnitude are forced to zero.
    pub deadband: f64,
}

impl AxisLimits {
    /// Check the per-axis invariants.
    pub fn validate(&self, axis: Axis) -> Result<(), ConfigError> {
        let name = axis.name();
        let fields = [
            ("min_velocity", self.min_velocity),
            ("max_velocity", self.max_velocity),
            ("max_accel", self.max_accel),
            ("max_decel", self.max_decel),
            ("deadband_velocity", self.deadband),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(invalid(format!("{field}[{name}] = {value} is not finite")));
            }
        }
        if self.max_decel > 0.0 {
            return Err(invalid(format!(
                "max_decel[{name}] = {} is positive; deceleration must be <= 0 to slow down",
                self.max_decel
            )));
        }
        if self.max_accel < 0.0 {
            return Err(invalid(format!(
                "max_accel[{name}] = {} is negative; acceleration must be >= 0 to speed up",
                self.max_accel
            )));
        }
        if self.min_velocity > 0.0 {
            return Err(invalid(format!(
                "min_velocity[{name}] = {} is positive; must be <= 0",
                self.min_velocity
            )));
        }
        if self.max_velocity < 0.0 {
            return Err(invalid(format!(
                "max_velocity[{name}] = {} is negative; must be >= 0",
                self.max_velocity
            )));
        }
        if self.min_velocity > self.max_velocity {
            return Err(invalid(format!(
                "min_velocity[{name}] = {} exceeds max_velocity[{name}] = {}",
                self.min_velocity, self.max_velocity
            )));
        }
        if self.deadband < 0.0 {
            return Err(invalid(format!(
                "deadband_velocity[{name}] = {} is negative; must be >= 0",
                self.deadband
            )));
        }
        Ok(())
    }

    /// Clamp an absolute velocity into `[min_velocity, max_velocity]`.
    #[inline]
    pub fn clamp_velocity(&self, v: f64) -> f64 {
        v.clamp(self.min_velocity, self.max_velocity)
    }

    /// Zero the value if its magnitude is below the deadband.
    #[inline]
    pub fn apply_deadband(&self, v: f64) -> f64 {
        if v.abs() < self.deadband { 0.0 } else { v }
    }
}

/// Per-axis bounds for x, y and angular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicLimits {
    axes: [AxisLimits; AXIS_COUNT],
}

impl KinematicLimits {
    /// Assemble limits from `[x, y, angular]` parameter arrays, validating each axis.
    pub fn from_arrays(
        min_velocity: [f64; AXIS_COUNT],
        max_velocity: [f64; AXIS_COUNT],
        max_accel: [f64; AXIS_COUNT],
        max_decel: [f64; AXIS_COUNT],
        deadband: [f64; AXIS_COUNT],
    ) -> Result<Self, ConfigError> {
        let axes = Axis::ALL.map(|axis| {
            let i = axis.index();
            AxisLimits {
                min_velocity: min_velocity[i],
                max_velocity: max_velocity[i],
                max_accel: max_accel[i],
                max_decel: max_decel[i],
                deadband: deadband[i],
            }
        });
        for axis in Axis::ALL {
            axes[axis.index()].validate(axis)?;
        }
        Ok(Self { axes })
    }

    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisLimits {
        &self.axes[axis.index()]
    }
}

// ─── Serde Surface ──────────────────────────────────────────────────

/// Smoother parameters as they appear in TOML and in reconfiguration.
///
/// Missing keys take the defaults from [`crate::consts`]. Per-axis arrays
/// must have exactly three elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmootherConfig {
    /// Tick rate [Hz].
    pub smoothing_frequency: f64,
    pub feedback: FeedbackMode,
    /// Scale all axes by the most restrictive axis' factor.
    pub scale_velocities: bool,
    pub max_velocity: [f64; AXIS_COUNT],
    pub min_velocity: [f64; AXIS_COUNT],
    pub max_accel: [f64; AXIS_COUNT],
    pub max_decel: [f64; AXIS_COUNT],
    pub deadband_velocity: [f64; AXIS_COUNT],
    /// Closed-loop averaging window [s].
    pub odom_duration: f64,
    /// Command staleness timeout [s].
    pub velocity_timeout: f64,
    /// Request SCHED_FIFO for the tick thread (startup only).
    pub use_realtime_priority: bool,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            smoothing_frequency: SMOOTHING_FREQUENCY_DEFAULT,
            feedback: FeedbackMode::default(),
            scale_velocities: false,
            max_velocity: MAX_VELOCITY_DEFAULT,
            min_velocity: MIN_VELOCITY_DEFAULT,
            max_accel: MAX_ACCEL_DEFAULT,
            max_decel: MAX_DECEL_DEFAULT,
            deadband_velocity: DEADBAND_VELOCITY_DEFAULT,
            odom_duration: ODOM_DURATION_DEFAULT,
            velocity_timeout: VELOCITY_TIMEOUT_DEFAULT,
            use_realtime_priority: false,
        }
    }
}

impl SmootherConfig {
    /// Validate all invariants without building a snapshot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        LiveConfig::new(self.clone()).map(|_| ())
    }

    /// Per-axis limits (validated).
    pub fn kinematic_limits(&self) -> Result<KinematicLimits, ConfigError> {
        KinematicLimits::from_arrays(
            self.min_velocity,
            self.max_velocity,
            self.max_accel,
            self.max_decel,
            self.deadband_velocity,
        )
    }
}

// ─── Live Snapshot ──────────────────────────────────────────────────

/// Validated, immutable parameter snapshot read by the loop each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    params: SmootherConfig,
    limits: KinematicLimits,
    period: Duration,
    velocity_timeout: Duration,
    odom_window: Duration,
}

impl LiveConfig {
    /// Validate `params` and build the snapshot.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` naming the first violated invariant.
    pub fn new(params: SmootherConfig) -> Result<Self, ConfigError> {
        let f = params.smoothing_frequency;
        if !f.is_finite() || f <= 0.0 {
            return Err(invalid(format!(
                "smoothing_frequency = {f} must be finite and > 0"
            )));
        }
        let period = seconds("smoothing period", 1.0 / f)?;
        if period.is_zero() {
            return Err(invalid(format!(
                "smoothing_frequency = {f} is too high (period rounds to zero)"
            )));
        }

        let limits = params.kinematic_limits()?;

        if !params.velocity_timeout.is_finite() || params.velocity_timeout < 0.0 {
            return Err(invalid(format!(
                "velocity_timeout = {} must be finite and >= 0",
                params.velocity_timeout
            )));
        }
        let velocity_timeout = seconds("velocity_timeout", params.velocity_timeout)?;

        if !params.odom_duration.is_finite() || params.odom_duration <= 0.0 {
            return Err(invalid(format!(
                "odom_duration = {} must be finite and > 0",
                params.odom_duration
            )));
        }
        let odom_window = seconds("odom_duration", params.odom_duration)?;

        Ok(Self {
            params,
            limits,
            period,
            velocity_timeout,
            odom_window,
        })
    }

    /// Raw parameters this snapshot was built from.
    #[inline]
    pub fn params(&self) -> &SmootherConfig {
        &self.params
    }

    #[inline]
    pub fn limits(&self) -> &KinematicLimits {
        &self.limits
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.params.smoothing_frequency
    }

    /// Timer period (`1 / smoothing_frequency`).
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn feedback(&self) -> FeedbackMode {
        self.params.feedback
    }

    #[inline]
    pub fn scale_velocities(&self) -> bool {
        self.params.scale_velocities
    }

    #[inline]
    pub fn velocity_timeout(&self) -> Duration {
        self.velocity_timeout
    }

    #[inline]
    pub fn odom_window(&self) -> Duration {
        self.odom_window
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| invalid(format!("{name} = {value} is not a valid duration: {e}")))
}
