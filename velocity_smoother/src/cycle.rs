//! Per-tick smoothing algorithm.
//!
//! [`VelocitySmoother`] owns the latest command, the last emitted output,
//! the stop latch and the feedback estimator. Each call to
//! [`VelocitySmoother::tick`] is pure computation over that state:
//!
//! 1. No command ever received → no output.
//! 2. Stale and already stopped → no output.
//! 3. Stale → the effective command is zero stamped "now", and the
//!    stored command is zeroed so it cannot come back.
//! 4. Clamp the command into `[min_velocity, max_velocity]`.
//! 5. Estimate current velocity (open or closed loop).
//! 6. Solve the cross-axis constraint problem.
//! 7. Apply the per-axis deadband to the published sample.
//! 8. Remember the pre-deadband output for feedback and the stop latch.
//! 9. Latch `stopped` once a stale tick has produced zero.
//!
//! Thread pacing and synchronization live in [`crate::runner`].

use std::sync::Arc;
use std::time::Duration;

use smoother_common::config::ConfigError;
use smoother_common::smoother::config::LiveConfig;
use smoother_common::smoother::state::SmootherState;
use smoother_common::twist::{StampedTwist, Twist3};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{self, ChangedParams, ParameterUpdate, ReloadOutcome};
use crate::feedback::FeedbackEstimator;
use crate::ingest::CommandIngester;
use crate::solver::ConstraintSolver;

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors while starting or running the smoothing loop.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// Startup configuration rejected.
    #[error("invalid startup configuration: {0}")]
    Config(#[from] ConfigError),
    /// Tick thread could not be started.
    #[error("failed to spawn tick thread: {0}")]
    ThreadSpawn(String),
}

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick counters and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks executed (including no-op ticks).
    pub ticks: u64,
    /// Ticks that produced an output sample.
    pub emitted: u64,
    /// Ticks whose computation exceeded the period.
    pub overruns: u64,
    /// Last tick duration [ns].
    pub last_tick_ns: u64,
    /// Maximum tick duration [ns].
    pub max_tick_ns: u64,
}

impl TickStats {
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            emitted: 0,
            overruns: 0,
            last_tick_ns: 0,
            max_tick_ns: 0,
        }
    }

    /// Record a measured tick duration against the period budget.
    /// Returns `true` on overrun.
    #[inline]
    pub fn record_duration(&mut self, duration: Duration, budget: Duration) -> bool {
        let ns = duration.as_nanos() as u64;
        self.last_tick_ns = ns;
        if ns > self.max_tick_ns {
            self.max_tick_ns = ns;
        }
        let overrun = duration > budget;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Smoother ───────────────────────────────────────────────────────

/// Single-threaded smoothing loop state.
#[derive(Debug)]
pub struct VelocitySmoother {
    config: Arc<LiveConfig>,
    solver: ConstraintSolver,
    ingester: CommandIngester,
    feedback: FeedbackEstimator,
    /// Last solved output, before deadband.
    last_output: StampedTwist,
    /// Already emitted zero while stale.
    stopped: bool,
    /// State observed by the previous tick (transition logging only).
    last_state: SmootherState,
    stats: TickStats,
}

impl VelocitySmoother {
    pub fn new(config: LiveConfig) -> Self {
        let config = Arc::new(config);
        let solver = ConstraintSolver::new(config.frequency(), config.scale_velocities());
        let feedback = FeedbackEstimator::new(config.feedback(), config.odom_window(), Twist3::ZERO);
        info!(
            frequency = config.frequency(),
            feedback = config.feedback().as_str(),
            scale_velocities = config.scale_velocities(),
            "velocity smoother configured"
        );
        Self {
            config,
            solver,
            ingester: CommandIngester::new(),
            feedback,
            last_output: StampedTwist::default(),
            stopped: false,
            last_state: SmootherState::Idle,
            stats: TickStats::new(),
        }
    }

    /// Active configuration snapshot.
    #[inline]
    pub fn config(&self) -> &Arc<LiveConfig> {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    #[inline]
    pub fn stats_mut(&mut self) -> &mut TickStats {
        &mut self.stats
    }

    /// Last solved output (pre-deadband).
    #[inline]
    pub fn last_output(&self) -> StampedTwist {
        self.last_output
    }

    /// Current feedback estimate.
    #[inline]
    pub fn current_estimate(&self) -> Twist3 {
        self.feedback.estimate()
    }

    /// Ingest a command. A zero or absent `stamp` is replaced with `now`.
    ///
    /// Accepting a command always clears the stop latch.
    pub fn submit_command(&mut self, command: Twist3, stamp: Option<Duration>, now: Duration) -> bool {
        let accepted = self.ingester.submit(command, stamp, now);
        if accepted {
            self.stopped = false;
        }
        accepted
    }

    /// Feed an odometry observation (used in closed-loop mode only).
    pub fn submit_odometry(&mut self, odom: StampedTwist) -> bool {
        self.feedback.observe(odom)
    }

    /// Install a new validated snapshot.
    ///
    /// `changed` tells which groups differ from the previous snapshot; the
    /// estimator is rebuilt when the feedback mode or window changed.
    pub fn apply_config(&mut self, config: Arc<LiveConfig>, changed: ChangedParams) {
        self.solver = ConstraintSolver::new(config.frequency(), config.scale_velocities());
        if changed.intersects(ChangedParams::FEEDBACK | ChangedParams::ODOM_WINDOW) {
            self.feedback = FeedbackEstimator::new(
                config.feedback(),
                config.odom_window(),
                self.last_output.twist,
            );
            debug!(
                feedback = config.feedback().as_str(),
                window_s = config.odom_window().as_secs_f64(),
                "feedback estimator rebuilt"
            );
        }
        self.config = config;
    }

    /// Validate `update` and, if accepted, install it before the next tick.
    pub fn reconfigure(&mut self, update: &ParameterUpdate) -> ReloadOutcome {
        let mut snapshot = Arc::clone(&self.config);
        let outcome = config::reconfigure(&mut snapshot, update);
        if let ReloadOutcome::Accepted(changed) = outcome
            && !changed.is_empty()
        {
            self.apply_config(snapshot, changed);
        }
        outcome
    }

    /// Whether the latest command is older than `velocity_timeout` at `now`.
    pub fn is_stale(&self, now: Duration) -> bool {
        self.ingester
            .age(now)
            .is_some_and(|age| age > self.config.velocity_timeout())
    }

    /// Loop state as of `now`.
    pub fn state(&self, now: Duration) -> SmootherState {
        if self.ingester.latest().is_none() {
            SmootherState::Idle
        } else if !self.is_stale(now) {
            SmootherState::Streaming
        } else if self.stopped || self.last_output.twist.is_zero() {
            SmootherState::Stopped
        } else {
            SmootherState::StaleTransition
        }
    }

    /// Run one tick at time `now`.
    ///
    /// Returns the sample to publish, or `None` when idle or stopped.
    pub fn tick(&mut self, now: Duration) -> Option<StampedTwist> {
        self.stats.ticks += 1;

        let state = self.state(now);
        self.note_state(state);

        if matches!(state, SmootherState::StaleTransition | SmootherState::Stopped) {
            self.ingester.expire();
        }
        if !state.emits() {
            self.stopped |= state == SmootherState::Stopped;
            return None;
        }
        let command = match state {
            SmootherState::StaleTransition => StampedTwist::zero_at(now),
            _ => self.ingester.latest()?,
        };

        let limits = self.config.limits();
        let target = command
            .twist
            .map_axes(|axis, v| limits.axis(axis).clamp_velocity(v));
        let current = self.feedback.estimate();
        let solved = self.solver.solve(current, target, limits);

        self.last_output = StampedTwist::new(solved, command.stamp);
        self.feedback.record_output(solved);
        self.stopped = state == SmootherState::StaleTransition && solved.is_zero();

        let published = solved.map_axes(|axis, v| limits.axis(axis).apply_deadband(v));
        self.stats.emitted += 1;
        Some(StampedTwist::new(published, command.stamp))
    }

    fn note_state(&mut self, state: SmootherState) {
        if state != self.last_state {
            debug!(from = ?self.last_state, to = ?state, "smoother state change");
            self.last_state = state;
        }
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

/// Set SCHED_FIFO with the given priority on the calling thread.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}; \
             ensure the user has rtprio permission"
        )));
    }
    Ok(())
}

/// Soft real-time setup for the tick thread.
///
/// Without the `rt` feature this is a no-op that logs a warning.
#[cfg(feature = "rt")]
pub fn rt_setup(priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    rt_set_scheduler(priority)
}

#[cfg(not(feature = "rt"))]
pub fn rt_setup(priority: i32) -> Result<(), CycleError> {
    tracing::warn!(
        priority,
        "use_realtime_priority requested but built without the `rt` feature; ignoring"
    );
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
