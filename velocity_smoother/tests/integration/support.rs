//! Shared helpers for integration tests.

use std::time::Duration;

use smoother_common::prelude::*;
use velocity_smoother::clock::{Clock, ManualClock};
use velocity_smoother::cycle::VelocitySmoother;
use velocity_smoother::runner::drive;

pub const EPS: f64 = 1e-9;

/// Smoother plus the clock that drives it.
pub struct Rig {
    pub smoother: VelocitySmoother,
    pub clock: ManualClock,
    pub period: Duration,
}

impl Rig {
    pub fn new(params: SmootherConfig) -> Self {
        let live = LiveConfig::new(params).unwrap();
        let period = live.period();
        Self {
            smoother: VelocitySmoother::new(live),
            clock: ManualClock::new(),
            period,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SmootherConfig::default())
    }

    /// Submit an unstamped command at the current clock time.
    pub fn command(&mut self, x: f64, y: f64, angular: f64) -> bool {
        let now = self.clock.now();
        self.smoother
            .submit_command(Twist3::new(x, y, angular), None, now)
    }

    /// Advance one period and tick.
    pub fn step(&mut self) -> Option<StampedTwist> {
        self.clock.advance(self.period);
        self.smoother.tick(self.clock.now())
    }

    /// Advance to an absolute time and tick.
    pub fn tick_at(&mut self, t: Duration) -> Option<StampedTwist> {
        self.clock.set(t);
        self.smoother.tick(t)
    }

    /// Run `n` ticks, collecting what was emitted.
    pub fn run(&mut self, n: usize) -> Vec<StampedTwist> {
        let mut out = Vec::with_capacity(n);
        let mut sink = |sample: StampedTwist| out.push(sample);
        drive(&mut self.smoother, &self.clock, self.period, n, &mut sink);
        out
    }

    pub fn state(&self) -> SmootherState {
        self.smoother.state(self.clock.now())
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}
