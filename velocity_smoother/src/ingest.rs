//! Command ingestion.
//!
//! Holds the single most recent valid command ("latest value wins", no
//! queue). Commands with a non-finite component are dropped before they can
//! reach the solver.

use std::time::Duration;

use smoother_common::twist::{StampedTwist, Twist3};
use tracing::warn;

/// Latest-command slot fed by the upstream producer.
#[derive(Debug, Clone, Default)]
pub struct CommandIngester {
    latest: Option<StampedTwist>,
}

impl CommandIngester {
    pub const fn new() -> Self {
        Self { latest: None }
    }

    /// Accept a command, replacing the previous one.
    ///
    /// `stamp` of `None` or zero means "unset": the command is stamped with
    /// `now` instead. Returns `false` (and leaves the slot untouched) if any
    /// component is NaN or infinite.
    pub fn submit(&mut self, command: Twist3, stamp: Option<Duration>, now: Duration) -> bool {
        if !command.is_finite() {
            warn!(
                ?command,
                "Velocity command contains NaNs or Infs! Ignoring as invalid"
            );
            return false;
        }

        let stamp = match stamp {
            Some(s) if !s.is_zero() => s,
            _ => now,
        };
        self.latest = Some(StampedTwist::new(command, stamp));
        true
    }

    /// Most recent accepted command, if one has ever arrived.
    #[inline]
    pub fn latest(&self) -> Option<StampedTwist> {
        self.latest
    }

    /// Replace the latest command with zero, keeping its stamp.
    ///
    /// An expired command stays stale under the same timeout and never
    /// resumes if the timeout is later raised.
    pub fn expire(&mut self) {
        if let Some(latest) = &mut self.latest {
            latest.twist = Twist3::ZERO;
        }
    }

    /// Age of the latest command at `now` (zero for future stamps).
    pub fn age(&self, now: Duration) -> Option<Duration> {
        self.latest.map(|c| now.saturating_sub(c.stamp))
    }
}
