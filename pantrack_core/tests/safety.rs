//! Interlock and coordinator together, driven poll by poll on a manual clock.
use std::sync::Arc;
use std::time::Duration;

use pantrack_core::interlock::SafetyInterlock;
use pantrack_core::{
    Coordinator, Direction, InterlockCfg, InterlockStatus, LimitSwitchState, Motion, MotorCommand,
    MotorState, PulseCfg, RejectReason, Submission,
};
use pantrack_traits::{Clock, ManualClock, SwitchLevel};
use rstest::rstest;

const P: SwitchLevel = SwitchLevel::Pressed;
const R: SwitchLevel = SwitchLevel::Released;
const RESET: Duration = Duration::from_millis(2100);

struct Rig {
    clock: ManualClock,
    coord: Coordinator,
    interlock: SafetyInterlock,
}

impl Rig {
    fn new(end_reset_on_release: bool) -> Self {
        Self::with_cfg(InterlockCfg {
            reset_duration: RESET,
            end_reset_on_release,
            ..InterlockCfg::default()
        })
    }

    fn with_cfg(cfg: InterlockCfg) -> Self {
        let clock = ManualClock::new();
        Self {
            coord: Coordinator::new(PulseCfg::default(), &cfg, Arc::new(clock.clone())),
            interlock: SafetyInterlock::new(cfg),
            clock,
        }
    }

    /// One monitor iteration.
    fn poll(&mut self, left: SwitchLevel, right: SwitchLevel) {
        let ov = self
            .interlock
            .poll(LimitSwitchState { left, right }, self.clock.now());
        self.coord.apply_interlock(self.interlock.engaged(), ov);
    }

    fn track(&self, direction: Direction) -> Submission {
        self.coord.submit(Some(MotorCommand {
            direction,
            magnitude: 3,
        }))
    }
}

#[test]
fn left_switch_while_running_right_retreats_right() {
    let mut rig = Rig::new(false);
    assert_eq!(rig.track(Direction::Right), Submission::Applied);
    let t0 = rig.clock.now();
    rig.poll(P, R);
    assert_eq!(
        rig.coord.motor_state(),
        MotorState::Resetting(Direction::Right, t0 + RESET)
    );
    assert_eq!(
        rig.coord.next_motion(),
        Motion::Drive {
            direction: Direction::Right,
            half_period: Duration::from_micros(1500)
        }
    );
}

#[test]
fn tracking_is_refused_during_reset_and_resumes_after() {
    let mut rig = Rig::new(false);
    rig.track(Direction::Left);
    rig.poll(P, R);
    rig.poll(R, R);

    assert_eq!(
        rig.track(Direction::Left),
        Submission::Rejected(RejectReason::OverrideActive)
    );
    assert_eq!(
        rig.coord.stop(),
        Submission::Rejected(RejectReason::OverrideActive)
    );
    // without end_reset_on_release the retreat runs its full duration
    assert!(rig.coord.motor_state().is_resetting());

    rig.clock.advance(RESET);
    rig.poll(R, R);
    assert_eq!(rig.coord.motor_state(), MotorState::Idle);
    assert_eq!(rig.track(Direction::Left), Submission::Applied);
}

#[test]
fn release_ends_reset_early_when_configured() {
    let mut rig = Rig::new(true);
    rig.track(Direction::Right);
    rig.poll(R, P);
    assert!(rig.coord.motor_state().is_resetting());
    rig.clock.advance(Duration::from_millis(300));
    rig.poll(R, R);
    assert_eq!(rig.coord.motor_state(), MotorState::Idle);
    assert_eq!(rig.coord.snapshot().interlock, InterlockStatus::Clear);
}

#[test]
fn opposite_switch_retargets_the_retreat() {
    let mut rig = Rig::new(false);
    rig.poll(P, R);
    assert_eq!(rig.coord.motor_state().direction(), Some(Direction::Right));
    rig.clock.advance(Duration::from_millis(500));
    rig.poll(R, P);
    let t = rig.clock.now();
    assert_eq!(
        rig.coord.motor_state(),
        MotorState::Resetting(Direction::Left, t + RESET)
    );
    assert_eq!(rig.coord.snapshot().interlock_trips, 2);
}

#[test]
fn double_press_faults_and_blocks_tracking() {
    let mut rig = Rig::new(false);
    rig.track(Direction::Right);
    rig.poll(P, P);

    let snap = rig.coord.snapshot();
    assert_eq!(snap.motor, MotorState::Idle);
    assert_eq!(snap.interlock, InterlockStatus::Fault);
    assert_eq!(snap.faults, 1);
    assert_eq!(rig.coord.next_motion(), Motion::Idle);
    assert_eq!(
        rig.track(Direction::Right),
        Submission::Rejected(RejectReason::Fault)
    );

    // holding both does not count again
    rig.poll(P, P);
    assert_eq!(rig.coord.snapshot().faults, 1);

    rig.poll(R, R);
    assert_eq!(rig.coord.snapshot().interlock, InterlockStatus::Clear);
    assert_eq!(rig.track(Direction::Right), Submission::Applied);
}

#[test]
fn held_switch_starts_a_new_retreat_after_deadline() {
    let mut rig = Rig::new(false);
    rig.poll(R, P);
    rig.clock.advance(RESET);
    rig.poll(R, P);
    assert!(rig.coord.motor_state().is_resetting());
    assert_eq!(rig.coord.snapshot().interlock_trips, 2);
}

#[rstest]
#[case(P, R)]
#[case(R, P)]
#[case(P, P)]
fn never_running_while_a_switch_is_pressed(#[case] left: SwitchLevel, #[case] right: SwitchLevel) {
    let mut rig = Rig::new(false);
    rig.track(Direction::Left);
    rig.poll(left, right);
    for _ in 0..5 {
        rig.track(Direction::Right);
        rig.track(Direction::Left);
        assert!(!rig.coord.motor_state().is_running());
        rig.clock.advance(Duration::from_millis(700));
        rig.poll(left, right);
    }
}

#[test]
fn debounced_interlock_still_stops_a_running_motor_on_the_first_press() {
    let mut rig = Rig::with_cfg(InterlockCfg {
        poll: Duration::from_millis(20),
        debounce_n: 3,
        reset_duration: RESET,
        ..InterlockCfg::default()
    });
    assert_eq!(rig.track(Direction::Left), Submission::Applied);

    let mut running_polls = 0;
    for _ in 0..3 {
        rig.poll(P, R);
        if rig.coord.motor_state().is_running() {
            running_polls += 1;
        }
        assert!(matches!(
            rig.track(Direction::Left),
            Submission::Rejected(RejectReason::SwitchEngaged | RejectReason::OverrideActive)
        ));
        rig.clock.advance(Duration::from_millis(20));
    }
    assert_eq!(running_polls, 0);

    // the third consecutive sample settles the debounce and starts the retreat
    assert_eq!(rig.coord.motor_state().direction(), Some(Direction::Right));
    assert!(rig.coord.motor_state().is_resetting());
}

#[test]
fn loss_of_target_stops_the_motor() {
    let rig = Rig::new(false);
    rig.track(Direction::Right);
    assert_eq!(rig.coord.submit(None), Submission::Applied);
    assert_eq!(rig.coord.motor_state(), MotorState::Idle);
    assert_eq!(rig.coord.submit(None), Submission::Unchanged);
}
