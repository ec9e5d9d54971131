//! Closed-loop feedback: odometry averaging drives the solver's notion of
//! current velocity.

use std::time::Duration;

use smoother_common::prelude::*;
use velocity_smoother::config::{ChangedParams, Parameter, ParameterUpdate, ReloadOutcome};

use super::support::{Rig, approx};

fn closed_loop() -> Rig {
    Rig::new(SmootherConfig {
        feedback: FeedbackMode::ClosedLoop,
        odom_duration: 0.1,
        ..Default::default()
    })
}

fn odom(rig: &mut Rig, x: f64, ms: u64) {
    let sample = StampedTwist::new(Twist3::new(x, 0.0, 0.0), Duration::from_millis(ms));
    assert!(rig.smoother.submit_odometry(sample));
}

#[test]
fn no_odometry_means_zero_estimate() {
    let mut rig = closed_loop();
    rig.command(0.5, 0.0, 0.0);
    // Without odometry every tick starts from zero again.
    for out in rig.run(5) {
        assert!(approx(out.twist.x, 0.125));
    }
}

#[test]
fn output_is_relative_to_averaged_odometry() {
    let mut rig = closed_loop();
    odom(&mut rig, 0.2, 0);
    odom(&mut rig, 0.3, 40);
    rig.command(0.5, 0.0, 0.0);
    let out = rig.step().unwrap();
    // Mean 0.25, then +0.125.
    assert!(approx(out.twist.x, 0.375));
}

#[test]
fn window_forgets_old_samples() {
    let mut rig = closed_loop();
    odom(&mut rig, 0.4, 0);
    odom(&mut rig, 0.0, 150);
    assert!(approx(rig.smoother.current_estimate().x, 0.0));
}

#[test]
fn non_finite_odometry_is_ignored() {
    let mut rig = closed_loop();
    odom(&mut rig, 0.2, 0);
    let bad = StampedTwist::new(Twist3::new(f64::NAN, 0.0, 0.0), Duration::from_millis(10));
    assert!(!rig.smoother.submit_odometry(bad));
    assert!(approx(rig.smoother.current_estimate().x, 0.2));
}

#[test]
fn odometry_is_ignored_in_open_loop() {
    let mut rig = Rig::with_defaults();
    let sample = StampedTwist::new(Twist3::new(0.4, 0.0, 0.0), Duration::ZERO);
    assert!(!rig.smoother.submit_odometry(sample));
    assert_eq!(rig.smoother.current_estimate(), Twist3::ZERO);
}

#[test]
fn window_change_rebuilds_estimator() {
    let mut rig = closed_loop();
    odom(&mut rig, 0.4, 0);
    assert!(approx(rig.smoother.current_estimate().x, 0.4));

    let update =
        ParameterUpdate::from_params(&[Parameter::new("odom_duration", 0.5)]).unwrap();
    assert_eq!(
        rig.smoother.reconfigure(&update),
        ReloadOutcome::Accepted(ChangedParams::ODOM_WINDOW)
    );
    assert_eq!(rig.smoother.current_estimate(), Twist3::ZERO);
}

#[test]
fn switching_to_open_loop_seeds_last_output() {
    let mut rig = closed_loop();
    odom(&mut rig, 0.25, 0);
    rig.command(0.5, 0.0, 0.0);
    let out = rig.step().unwrap();
    assert!(approx(out.twist.x, 0.375));

    let update =
        ParameterUpdate::from_params(&[Parameter::new("feedback", "OPEN_LOOP")]).unwrap();
    assert_eq!(
        rig.smoother.reconfigure(&update),
        ReloadOutcome::Accepted(ChangedParams::FEEDBACK)
    );
    assert!(approx(rig.smoother.current_estimate().x, 0.375));
    let out = rig.step().unwrap();
    assert!(approx(out.twist.x, 0.5));
}
