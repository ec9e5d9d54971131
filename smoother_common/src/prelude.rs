//! Prelude module for common re-exports.
//!
//! ```rust
//! use smoother_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Smoother ───────────────────────────────────────────────────────
pub use crate::smoother::config::{
    AxisLimits, FeedbackMode, KinematicLimits, LiveConfig, SmootherConfig,
};
pub use crate::smoother::state::SmootherState;

// ─── Velocity Types ─────────────────────────────────────────────────
pub use crate::twist::{AXIS_COUNT, Axis, StampedTwist, Twist3};
