//! End-to-end tick scenarios.
//!
//! - First-tick acceleration limit from rest.
//! - No emission before the first command.
//! - Staleness: bounded deceleration, then latch, then resume.
//! - Deadband and steady-state pass-through.

use std::time::Duration;

use velocity_smoother::clock::Clock;

use smoother_common::prelude::*;

use super::support::{Rig, approx};

#[test]
fn first_tick_from_rest_respects_accel() {
    let mut rig = Rig::new(SmootherConfig {
        max_velocity: [2.0, 0.0, 2.5],
        ..Default::default()
    });
    rig.command(1.0, 0.0, 0.0);
    let out = rig.step().unwrap();
    assert!(out.twist.x <= 2.5 / 20.0 + 1e-12);
    assert!(approx(out.twist.x, 0.125));
}

#[test]
fn ramp_reaches_command_and_holds() {
    let mut rig = Rig::with_defaults();
    rig.command(0.5, 0.0, -1.0);
    let samples = rig.run(12);
    let xs: Vec<f64> = samples.iter().map(|s| s.twist.x).collect();
    assert!(approx(xs[0], 0.125));
    assert!(approx(xs[3], 0.5));
    assert!(samples.iter().skip(4).all(|s| approx(s.twist.x, 0.5)));
    // Angular ramps at 3.2 / 20 = 0.16 per tick.
    assert!(approx(samples[0].twist.angular, -0.16));
    assert!(approx(samples[6].twist.angular, -1.0));
}

#[test]
fn never_emits_without_a_command() {
    let mut rig = Rig::with_defaults();
    assert!(rig.run(200).is_empty());
    assert_eq!(rig.state(), SmootherState::Idle);
}

#[test]
fn invalid_commands_are_not_a_first_command() {
    let mut rig = Rig::with_defaults();
    assert!(!rig.command(f64::NAN, 0.0, 0.0));
    assert!(!rig.command(0.0, f64::NEG_INFINITY, 0.0));
    assert!(rig.run(10).is_empty());
    assert_eq!(rig.state(), SmootherState::Idle);
}

#[test]
fn stale_command_decelerates_then_stops() {
    let mut rig = Rig::new(SmootherConfig {
        velocity_timeout: 1.0,
        ..Default::default()
    });
    rig.command(0.5, 0.0, 1.0);

    // Streaming up to the timeout: the output holds the command.
    let mut t = Duration::ZERO;
    while t < Duration::from_millis(1000) {
        t += rig.period;
        let out = rig.tick_at(t).unwrap();
        assert_eq!(out.stamp, Duration::ZERO);
    }
    assert!(approx(rig.smoother.last_output().twist.x, 0.5));

    // Past the timeout: a decelerating sequence stamped "now".
    let mut t = Duration::from_millis(1100);
    let mut emitted = Vec::new();
    while let Some(out) = rig.tick_at(t) {
        assert_eq!(out.stamp, t);
        emitted.push(out.twist);
        t += rig.period;
        assert!(emitted.len() < 50, "never latched");
    }
    assert!(!emitted.is_empty());
    for pair in emitted.windows(2) {
        assert!(pair[1].x <= pair[0].x);
        assert!((pair[0].x - pair[1].x) <= 2.5 / 20.0 + 1e-12);
        assert!((pair[0].angular - pair[1].angular) <= 3.2 / 20.0 + 1e-12);
    }
    let last = emitted.last().unwrap();
    assert!(last.is_zero());
    assert_eq!(rig.state(), SmootherState::Stopped);
}

#[test]
fn stopped_is_idempotent_until_new_command() {
    let mut rig = Rig::with_defaults();
    rig.command(0.2, 0.0, 0.0);
    rig.run(5);
    rig.clock.advance(Duration::from_secs(2));
    // Drain the deceleration.
    let drained = rig.run(20);
    assert!(drained.last().unwrap().twist.is_zero());
    assert!(rig.run(100).is_empty());
    assert_eq!(rig.smoother.stats().emitted, 5 + drained.len() as u64);

    assert!(rig.command(0.1, 0.0, 0.0));
    assert_eq!(rig.state(), SmootherState::Streaming);
    let out = rig.step().unwrap();
    assert!(approx(out.twist.x, 0.1));
}

#[test]
fn stamped_command_in_the_past_can_be_stale_on_arrival() {
    let mut rig = Rig::with_defaults();
    rig.clock.set(Duration::from_secs(10));
    let now = rig.clock.now();
    rig.smoother
        .submit_command(Twist3::new(0.3, 0.0, 0.0), Some(Duration::from_secs(5)), now);
    // Nothing was ever emitted, so the stale command stops immediately.
    assert_eq!(rig.step(), None);
    assert_eq!(rig.state(), SmootherState::Stopped);
}

#[test]
fn command_at_current_velocity_passes_through() {
    for scale in [false, true] {
        let mut rig = Rig::new(SmootherConfig {
            scale_velocities: scale,
            ..Default::default()
        });
        rig.command(0.3, 0.0, 0.8);
        rig.run(10);
        let before = rig.smoother.last_output().twist;
        let out = rig.step().unwrap();
        assert_eq!(out.twist, before);
        assert_eq!(out.twist, Twist3::new(0.3, 0.0, 0.8));
    }
}

#[test]
fn deadband_forces_exact_zero() {
    let mut rig = Rig::new(SmootherConfig {
        deadband_velocity: [0.3, 0.0, 0.2],
        ..Default::default()
    });
    rig.command(0.5, 0.0, 0.1);
    let samples = rig.run(6);
    // x: 0.125, 0.25 fall below 0.3; angular 0.1 never clears 0.2.
    assert_eq!(samples[0].twist.x, 0.0);
    assert_eq!(samples[1].twist.x, 0.0);
    assert!(approx(samples[2].twist.x, 0.375));
    for s in &samples {
        assert_eq!(s.twist.angular, 0.0);
        assert!(s.twist.x == 0.0 || s.twist.x.abs() >= 0.3);
    }
}

#[test]
fn command_is_clamped_to_absolute_limits() {
    let mut rig = Rig::with_defaults();
    rig.command(5.0, 1.0, -10.0);
    let samples = rig.run(40);
    let last = samples.last().unwrap().twist;
    assert!(approx(last.x, 0.5));
    assert_eq!(last.y, 0.0);
    assert!(approx(last.angular, -2.5));
}

#[test]
fn scaling_keeps_direction_from_rest() {
    let mut rig = Rig::new(SmootherConfig {
        scale_velocities: true,
        max_velocity: [0.5, 0.0, 2.5],
        ..Default::default()
    });
    rig.command(0.5, 0.0, 0.5);
    let out = rig.step().unwrap();
    // x limits eta to 0.25; angular follows at the same ratio.
    assert!(approx(out.twist.x, 0.125));
    assert!(approx(out.twist.angular, 0.125));
}
