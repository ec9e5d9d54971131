//! Property tests: per-tick deltas never exceed the axis bound, with or
//! without cross-axis scaling, for arbitrary command sequences.

use proptest::prelude::*;
use smoother_common::prelude::*;
use velocity_smoother::solver::{ConstraintSolver, is_accelerating};

use super::support::Rig;

const SLACK: f64 = 1e-9;

fn axis_value() -> impl Strategy<Value = f64> {
    -5.0..5.0_f64
}

fn twist() -> impl Strategy<Value = Twist3> {
    (axis_value(), axis_value(), axis_value()).prop_map(|(x, y, a)| Twist3::new(x, y, a))
}

fn limits() -> impl Strategy<Value = SmootherConfig> {
    (
        prop::array::uniform3(0.1..3.0_f64),
        prop::array::uniform3(0.0..5.0_f64),
        prop::array::uniform3(-5.0..0.0_f64),
        any::<bool>(),
        5.0..100.0_f64,
    )
        .prop_map(|(max_v, accel, decel, scale, f)| SmootherConfig {
            smoothing_frequency: f,
            scale_velocities: scale,
            max_velocity: max_v,
            min_velocity: max_v.map(|v| -v),
            max_accel: accel,
            max_decel: decel,
            ..Default::default()
        })
}

/// Bound on `|out - current|` for one axis.
fn step_bound(current: f64, target: f64, accel: f64, decel: f64, f: f64) -> f64 {
    if is_accelerating(current, target) {
        accel / f
    } else {
        -decel / f
    }
}

proptest! {
    #[test]
    fn solver_respects_per_axis_bounds(
        cfg in limits(),
        current in twist(),
        command in twist(),
    ) {
        let live = LiveConfig::new(cfg).unwrap();
        let solver = ConstraintSolver::new(live.frequency(), live.scale_velocities());
        let out = solver.solve(current, command, live.limits());
        for axis in Axis::ALL {
            let lim = live.limits().axis(axis);
            let bound = step_bound(
                current.get(axis),
                command.get(axis),
                lim.max_accel,
                lim.max_decel,
                live.frequency(),
            );
            let delta = (out.get(axis) - current.get(axis)).abs();
            prop_assert!(delta <= bound + SLACK, "{axis:?}: delta {delta} > {bound}");
        }
    }

    #[test]
    fn loop_output_never_jumps(
        cfg in limits(),
        commands in prop::collection::vec(twist(), 1..40),
    ) {
        let accel = cfg.max_accel;
        let decel = cfg.max_decel;
        let f = cfg.smoothing_frequency;
        let mut rig = Rig::new(cfg);
        let mut prev = Twist3::ZERO;
        for cmd in commands {
            rig.command(cmd.x, cmd.y, cmd.angular);
            let out = rig.step().unwrap().twist;
            for axis in Axis::ALL {
                let i = axis.index();
                let worst = accel[i].max(-decel[i]) / f;
                let delta = (out.get(axis) - prev.get(axis)).abs();
                prop_assert!(delta <= worst + SLACK);
            }
            prev = out;
        }
    }

    #[test]
    fn scaling_never_exceeds_target(
        current in twist(),
        command in twist(),
    ) {
        let live = LiveConfig::new(SmootherConfig {
            scale_velocities: true,
            max_velocity: [5.0; 3],
            min_velocity: [-5.0; 3],
            max_accel: [2.0; 3],
            max_decel: [-2.0; 3],
            ..Default::default()
        })
        .unwrap();
        let solver = ConstraintSolver::new(live.frequency(), true);
        let eta = solver.eta(current, command, live.limits());
        prop_assert!(eta > 0.0 && eta <= 1.0);
        let out = solver.solve(current, command, live.limits());
        for axis in Axis::ALL {
            let (c, t, o) = (current.get(axis), command.get(axis), out.get(axis));
            // The output lies between current and target.
            prop_assert!(o >= c.min(t) - SLACK && o <= c.max(t) + SLACK);
        }
    }
}
