//! Threaded fixed-rate driver for [`VelocitySmoother`].
//!
//! One tick thread paces itself on absolute deadlines (`next += period`) so
//! the rate does not drift with tick duration. All loop state lives behind a
//! single `parking_lot::Mutex`; ingestion, odometry and reconfiguration
//! calls from other threads take the same lock, so a tick always sees a
//! complete configuration snapshot.
//!
//! A frequency change bumps a timer epoch and wakes the tick thread, which
//! re-anchors its deadline on the new period before the next tick. Stopping
//! clears `running`, wakes the thread and joins it; an in-flight tick
//! (including its publish) finishes first.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use smoother_common::consts::RT_PRIORITY_DEFAULT;
use smoother_common::smoother::config::LiveConfig;
use smoother_common::smoother::state::SmootherState;
use smoother_common::twist::{StampedTwist, Twist3};
use static_assertions::assert_impl_all;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{ChangedParams, Parameter, ParameterUpdate, ReloadOutcome};
use crate::cycle::{CycleError, TickStats, VelocitySmoother, rt_setup};

// ─── Output ─────────────────────────────────────────────────────────

/// Destination for smoothed samples.
///
/// Called on the tick thread with the loop lock held: implementations must
/// not call back into [`SmootherHandle`].
pub trait CommandSink: Send {
    fn publish(&mut self, sample: StampedTwist);
}

impl<F> CommandSink for F
where
    F: FnMut(StampedTwist) + Send,
{
    fn publish(&mut self, sample: StampedTwist) {
        self(sample)
    }
}

// ─── Shared State ───────────────────────────────────────────────────

struct Inner {
    smoother: VelocitySmoother,
    sink: Box<dyn CommandSink>,
    running: bool,
    /// Incremented whenever the tick period changes.
    timer_epoch: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    clock: Arc<dyn Clock>,
}

/// Thread-safe entry points into a running smoother.
#[derive(Clone)]
pub struct SmootherHandle {
    shared: Arc<Shared>,
}

assert_impl_all!(SmootherHandle: Send, Sync, Clone);

impl SmootherHandle {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock()
    }

    /// Submit an unstamped command (stamped at receipt).
    pub fn submit_command(&self, command: Twist3) -> bool {
        let now = self.shared.clock.now();
        self.lock().smoother.submit_command(command, None, now)
    }

    /// Submit a command carrying its own stamp. A zero stamp counts as unset.
    pub fn submit_stamped(&self, command: StampedTwist) -> bool {
        let now = self.shared.clock.now();
        self.lock()
            .smoother
            .submit_command(command.twist, Some(command.stamp), now)
    }

    /// Feed an odometry observation (closed-loop feedback only).
    pub fn submit_odometry(&self, odom: StampedTwist) -> bool {
        self.lock().smoother.submit_odometry(odom)
    }

    /// Apply a partial update atomically relative to the tick.
    pub fn reconfigure(&self, update: &ParameterUpdate) -> ReloadOutcome {
        let mut inner = self.lock();
        let outcome = inner.smoother.reconfigure(update);
        if let ReloadOutcome::Accepted(changed) = &outcome
            && changed.contains(ChangedParams::FREQUENCY)
        {
            inner.timer_epoch = inner.timer_epoch.wrapping_add(1);
            self.shared.wake.notify_all();
        }
        outcome
    }

    /// Apply a batch of named parameters.
    pub fn set_parameters(&self, params: &[Parameter]) -> ReloadOutcome {
        match ParameterUpdate::from_params(params) {
            Ok(update) => self.reconfigure(&update),
            Err(e) => {
                warn!(error = %e, "reconfiguration rejected; keeping active parameters");
                ReloadOutcome::Rejected(e.to_string())
            }
        }
    }

    /// Loop state as of the clock's current time.
    pub fn state(&self) -> SmootherState {
        let now = self.shared.clock.now();
        self.lock().smoother.state(now)
    }

    pub fn stats(&self) -> TickStats {
        *self.lock().smoother.stats()
    }

    /// Active configuration snapshot.
    pub fn config(&self) -> Arc<LiveConfig> {
        Arc::clone(self.lock().smoother.config())
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Owns the tick thread. Dropping the runner stops it.
pub struct SmootherRunner {
    handle: SmootherHandle,
    thread: Option<JoinHandle<()>>,
}

impl SmootherRunner {
    /// Spawn the tick thread and return once it is ready to tick.
    ///
    /// # Errors
    /// `ThreadSpawn` if the thread cannot be created; `RtSetup` if
    /// `use_realtime_priority` is set and the scheduler call fails.
    pub fn start(
        config: LiveConfig,
        sink: impl CommandSink + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CycleError> {
        let realtime = config.params().use_realtime_priority;
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                smoother: VelocitySmoother::new(config),
                sink: Box::new(sink),
                running: true,
                timer_epoch: 0,
            }),
            wake: Condvar::new(),
            clock,
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), CycleError>>(1);
        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("smoother-tick".to_string())
            .spawn(move || {
                if realtime {
                    if let Err(e) = rt_setup(RT_PRIORITY_DEFAULT) {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                    info!(priority = RT_PRIORITY_DEFAULT, "tick thread running with realtime priority");
                }
                let _ = ready_tx.send(Ok(()));
                tick_loop(&thread_shared);
            })
            .map_err(|e| CycleError::ThreadSpawn(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|e| Err(CycleError::ThreadSpawn(e.to_string())));
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        Ok(Self {
            handle: SmootherHandle { shared },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SmootherHandle {
        self.handle.clone()
    }

    /// Withdraw the timer and wait for the in-flight tick to finish.
    pub fn stop(&mut self) {
        {
            let mut inner = self.handle.lock();
            if !inner.running && self.thread.is_none() {
                return;
            }
            inner.running = false;
        }
        self.handle.shared.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("tick thread panicked");
            }
            let stats = self.handle.stats();
            info!(
                ticks = stats.ticks,
                emitted = stats.emitted,
                overruns = stats.overruns,
                max_tick_ns = stats.max_tick_ns,
                "smoother stopped"
            );
        }
    }
}

impl Drop for SmootherRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_loop(shared: &Shared) {
    let mut inner = shared.inner.lock();
    let mut epoch = inner.timer_epoch;
    let mut period = inner.smoother.config().period();
    let mut next = Instant::now() + period;
    debug!(period_us = period.as_micros() as u64, "tick timer started");

    loop {
        while inner.running && inner.timer_epoch == epoch {
            if shared.wake.wait_until(&mut inner, next).timed_out() {
                break;
            }
        }
        if !inner.running {
            break;
        }
        if inner.timer_epoch != epoch {
            epoch = inner.timer_epoch;
            period = inner.smoother.config().period();
            next = Instant::now() + period;
            info!(
                frequency = inner.smoother.config().frequency(),
                "tick timer restarted with new period"
            );
            continue;
        }

        let started = Instant::now();
        let now = shared.clock.now();
        let Inner { smoother, sink, .. } = &mut *inner;
        if let Some(sample) = smoother.tick(now) {
            sink.publish(sample);
        }
        let elapsed = started.elapsed();
        if smoother.stats_mut().record_duration(elapsed, period) {
            warn!(
                elapsed_us = elapsed.as_micros() as u64,
                budget_us = period.as_micros() as u64,
                "tick overrun"
            );
        }

        next += period;
        let late = Instant::now().saturating_duration_since(next);
        if late > period {
            debug!(late_us = late.as_micros() as u64, "tick timer fell behind; re-anchoring");
            next = Instant::now() + period;
        }
    }
}

/// Run `ticks` ticks synchronously against `clock`, advancing it by
/// `dt` before each one. For deterministic tests and tools.
pub fn drive(
    smoother: &mut VelocitySmoother,
    clock: &crate::clock::ManualClock,
    dt: Duration,
    ticks: usize,
    sink: &mut dyn CommandSink,
) {
    for _ in 0..ticks {
        clock.advance(dt);
        if let Some(sample) = smoother.tick(clock.now()) {
            sink.publish(sample);
        }
    }
}
