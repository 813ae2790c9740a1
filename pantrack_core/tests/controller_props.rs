//! Properties of the offset controller over random observations and setpoints.
use pantrack_core::controller::compute;
use pantrack_core::{BoundingBox, Direction, Observation, Setpoint};
use proptest::prelude::*;

fn obs_at(x: i32) -> Observation {
    Observation::from_box(
        BoundingBox {
            x,
            y: 10,
            width: 1,
            height: 1,
        },
        1_000,
        true,
    )
}

prop_compose! {
    fn setpoint_strategy()(
        x in 0i32..640,
        deadband in 0u32..100,
        gain in 0.001f32..2.0,
        min_step in 1u32..5,
        extra in 0u32..20,
    ) -> Setpoint {
        Setpoint { x, deadband, gain, min_step, max_step: min_step + extra }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 512, .. ProptestConfig::default() })]

    #[test]
    fn inside_deadband_never_moves(
        (sp, delta) in setpoint_strategy().prop_flat_map(|sp| {
            let db = sp.deadband as i32;
            (Just(sp), -db..=db)
        })
    ) {
        prop_assert_eq!(compute(&obs_at(sp.x + delta), &sp), None);
    }

    #[test]
    fn direction_follows_offset_sign(sp in setpoint_strategy(), delta in -400i32..400) {
        prop_assume!(delta.unsigned_abs() > sp.deadband);
        let cmd = compute(&obs_at(sp.x + delta), &sp).expect("outside deadband");
        let expect = if delta > 0 { Direction::Right } else { Direction::Left };
        prop_assert_eq!(cmd.direction, expect);
        prop_assert!(cmd.magnitude >= sp.min_step && cmd.magnitude <= sp.max_step);
    }

    #[test]
    fn magnitude_is_monotonic_in_offset(sp in setpoint_strategy(), a in 0u32..400, b in 0u32..400) {
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assume!(near > sp.deadband);
        let m_near = compute(&obs_at(sp.x + near as i32), &sp).expect("outside deadband").magnitude;
        let m_far = compute(&obs_at(sp.x + far as i32), &sp).expect("outside deadband").magnitude;
        prop_assert!(m_near <= m_far);
        let l_near = compute(&obs_at(sp.x - near as i32), &sp).expect("outside deadband").magnitude;
        prop_assert_eq!(l_near, m_near);
    }

    #[test]
    fn invalid_observation_is_always_stop(sp in setpoint_strategy(), x in -1000i32..1000) {
        let mut o = obs_at(x);
        o.valid = false;
        prop_assert_eq!(compute(&o, &sp), None);
    }
}

#[test]
fn worked_example() {
    let sp = Setpoint {
        x: 150,
        deadband: 20,
        gain: 0.05,
        min_step: 1,
        max_step: 10,
    };
    let cmd = compute(&obs_at(200), &sp).expect("outside deadband");
    assert_eq!(cmd.direction, Direction::Right);
    assert_eq!(cmd.magnitude, 2);
}
