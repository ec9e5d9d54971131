//! Smoothing loop states.
//!
//! `Idle → Streaming` on the first accepted command.
//! `Streaming ⇄ StaleTransition` on command age vs. `velocity_timeout`.
//! `StaleTransition → Stopped` once the output has reached zero.
//! `Stopped → Streaming` as soon as a fresh command is ingested.

use serde::{Deserialize, Serialize};

/// Observable state of the smoothing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum SmootherState {
    /// No command ever ingested; ticks are no-ops.
    #[default]
    Idle = 0,
    /// Normal operation.
    Streaming = 1,
    /// Input timed out; decelerating toward zero.
    StaleTransition = 2,
    /// Fully stopped while stale; ticks emit nothing.
    Stopped = 3,
}

impl SmootherState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Streaming),
            2 => Some(Self::StaleTransition),
            3 => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Whether a tick in this state produces an output sample.
    #[inline]
    pub const fn emits(self) -> bool {
        matches!(self, Self::Streaming | Self::StaleTransition)
    }
}
