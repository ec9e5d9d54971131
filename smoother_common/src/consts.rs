//! Default parameter values for the velocity smoother.
//!
//! Single source of truth for startup defaults. Per-axis arrays are ordered
//! `[x, y, angular]`.

/// Default service name.
pub const DEFAULT_SERVICE_NAME: &str = "velocity_smoother";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/velocity_smoother.toml";

/// Default smoothing loop frequency [Hz].
pub const SMOOTHING_FREQUENCY_DEFAULT: f64 = 20.0;

/// Default upper velocity bound per axis.
pub const MAX_VELOCITY_DEFAULT: [f64; 3] = [0.50, 0.0, 2.5];

/// Default lower velocity bound per axis.
pub const MIN_VELOCITY_DEFAULT: [f64; 3] = [-0.50, 0.0, -2.5];

/// Default acceleration magnitude per axis [unit/s²].
pub const MAX_ACCEL_DEFAULT: [f64; 3] = [2.5, 0.0, 3.2];

/// Default deceleration per axis (non-positive) [unit/s²].
pub const MAX_DECEL_DEFAULT: [f64; 3] = [-2.5, 0.0, -3.2];

/// Default deadband per axis (disabled).
pub const DEADBAND_VELOCITY_DEFAULT: [f64; 3] = [0.0, 0.0, 0.0];

/// Default closed-loop odometry averaging window [s].
pub const ODOM_DURATION_DEFAULT: f64 = 0.1;

/// Default command staleness timeout [s].
pub const VELOCITY_TIMEOUT_DEFAULT: f64 = 1.0;

/// Capacity of the closed-loop odometry window (oldest evicted when full).
pub const ODOM_WINDOW_CAPACITY: usize = 256;

/// SCHED_FIFO priority used when soft real-time priority is requested.
pub const RT_PRIORITY_DEFAULT: i32 = 49;
