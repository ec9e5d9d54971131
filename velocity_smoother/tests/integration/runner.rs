//! Threaded runner: timer pacing, cross-thread ingestion, shutdown.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use smoother_common::prelude::*;
use velocity_smoother::clock::MonotonicClock;
use velocity_smoother::config::{Parameter, ReloadOutcome};
use velocity_smoother::runner::SmootherRunner;

fn start(params: SmootherConfig) -> (SmootherRunner, Arc<Mutex<Vec<StampedTwist>>>) {
    let samples = Arc::new(Mutex::new(Vec::new()));
    let sink_samples = Arc::clone(&samples);
    let runner = SmootherRunner::start(
        LiveConfig::new(params).unwrap(),
        move |s: StampedTwist| sink_samples.lock().push(s),
        Arc::new(MonotonicClock::new()),
    )
    .unwrap();
    (runner, samples)
}

#[test]
fn commands_from_many_threads_are_smoothed() {
    let (mut runner, samples) = start(SmootherConfig {
        smoothing_frequency: 200.0,
        ..Default::default()
    });
    let handle = runner.handle();

    let producers: Vec<_> = (0..4)
        .map(|i| {
            let h = handle.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    h.submit_command(Twist3::new(0.1 * i as f64, 0.0, 0.0));
                    thread::sleep(Duration::from_millis(2));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    thread::sleep(Duration::from_millis(50));
    runner.stop();

    let samples = samples.lock();
    assert!(!samples.is_empty());
    let bound = 2.5 / 200.0 + 1e-9;
    let mut prev = 0.0_f64;
    for s in samples.iter() {
        assert!((s.twist.x - prev).abs() <= bound);
        prev = s.twist.x;
    }
}

#[test]
fn stop_waits_for_tick_thread() {
    let (mut runner, samples) = start(SmootherConfig {
        smoothing_frequency: 500.0,
        ..Default::default()
    });
    let handle = runner.handle();
    handle.submit_command(Twist3::new(0.2, 0.0, 0.0));
    thread::sleep(Duration::from_millis(30));
    runner.stop();
    let count = samples.lock().len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(samples.lock().len(), count);
    assert!(!handle.is_running());
    // Stopping twice is harmless.
    runner.stop();
}

#[test]
fn set_parameters_through_handle() {
    let (runner, _samples) = start(SmootherConfig::default());
    let handle = runner.handle();
    let outcome = handle.set_parameters(&[Parameter::new("scale_velocities", true)]);
    assert!(outcome.is_accepted());
    assert!(handle.config().scale_velocities());

    let outcome = handle.set_parameters(&[Parameter::new("scale_velocities", 1.0)]);
    assert!(matches!(outcome, ReloadOutcome::Rejected(_)));
    assert!(handle.config().scale_velocities());
}

#[test]
fn dropping_runner_stops_it() {
    let (runner, _samples) = start(SmootherConfig::default());
    let handle = runner.handle();
    assert!(handle.is_running());
    drop(runner);
    assert!(!handle.is_running());
}
