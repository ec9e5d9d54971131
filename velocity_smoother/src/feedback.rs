//! Current-velocity estimation.
//!
//! Two variants behind one `estimate()`:
//! - **Open loop**: the loop's own last output (the base is assumed to
//!   track commands closely).
//! - **Closed loop**: per-axis mean of external odometry over a sliding
//!   time window.
//!
//! The variant is chosen from configuration. Switching modes or changing the
//! window width rebuilds the estimator; no window state carries over.

use std::time::Duration;

use heapless::Deque;
use smoother_common::consts::ODOM_WINDOW_CAPACITY;
use smoother_common::smoother::config::FeedbackMode;
use smoother_common::twist::{StampedTwist, Twist3};
use tracing::{trace, warn};

// ─── Odometry Window ────────────────────────────────────────────────

/// Fixed-capacity sliding window of odometry observations.
///
/// Samples older than `width` relative to the newest sample are evicted on
/// insert. When the buffer is full the oldest sample is evicted regardless
/// of age.
#[derive(Debug, Clone)]
pub struct OdometryWindow {
    width: Duration,
    samples: Deque<StampedTwist, ODOM_WINDOW_CAPACITY>,
}

impl OdometryWindow {
    pub fn new(width: Duration) -> Self {
        Self {
            width,
            samples: Deque::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Insert an observation. Non-finite observations are dropped.
    pub fn push(&mut self, sample: StampedTwist) -> bool {
        if !sample.twist.is_finite() {
            warn!(odom = ?sample.twist, "Odometry contains NaNs or Infs! Ignoring as invalid");
            return false;
        }

        while let Some(front) = self.samples.front() {
            if sample.stamp.saturating_sub(front.stamp) > self.width {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Space was made above.
        let _ = self.samples.push_back(sample);
        true
    }

    /// Per-axis arithmetic mean; zero when empty.
    pub fn mean(&self) -> Twist3 {
        let n = self.samples.len();
        if n == 0 {
            return Twist3::ZERO;
        }
        let mut sum = [0.0; 3];
        for s in self.samples.iter() {
            for (total, v) in sum.iter_mut().zip(s.twist.to_array()) {
                *total += v;
            }
        }
        Twist3::from_array(sum.map(|total| total / n as f64))
    }
}

// ─── Estimator ──────────────────────────────────────────────────────

/// Source of the current-velocity estimate fed to the solver.
#[derive(Debug, Clone)]
pub enum FeedbackEstimator {
    OpenLoop { last_output: Twist3 },
    ClosedLoop(OdometryWindow),
}

impl FeedbackEstimator {
    /// Build an estimator for `mode`.
    ///
    /// `last_output` seeds the open-loop variant; the closed-loop variant
    /// starts with an empty window of width `odom_window`.
    pub fn new(mode: FeedbackMode, odom_window: Duration, last_output: Twist3) -> Self {
        match mode {
            FeedbackMode::OpenLoop => Self::OpenLoop { last_output },
            FeedbackMode::ClosedLoop => Self::ClosedLoop(OdometryWindow::new(odom_window)),
        }
    }

    #[inline]
    pub fn mode(&self) -> FeedbackMode {
        match self {
            Self::OpenLoop { .. } => FeedbackMode::OpenLoop,
            Self::ClosedLoop(_) => FeedbackMode::ClosedLoop,
        }
    }

    /// Current velocity estimate. Never fails; zero if no data yet.
    pub fn estimate(&self) -> Twist3 {
        match self {
            Self::OpenLoop { last_output } => *last_output,
            Self::ClosedLoop(window) => window.mean(),
        }
    }

    /// Record the loop's newest output (pre-deadband). Open loop only.
    #[inline]
    pub fn record_output(&mut self, output: Twist3) {
        if let Self::OpenLoop { last_output } = self {
            *last_output = output;
        }
    }

    /// Feed an external velocity observation. Closed loop only.
    pub fn observe(&mut self, odom: StampedTwist) -> bool {
        match self {
            Self::ClosedLoop(window) => window.push(odom),
            Self::OpenLoop { .. } => {
                trace!("odometry ignored in open-loop feedback mode");
                false
            }
        }
    }
}
