//! Closed-loop tracking against the simulated rig.
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use pantrack_core::mocks::{QueuedFrames, RecordingStepper, ScriptedSwitches};
use pantrack_core::{
    BuildError, InterlockCfg, MaskParams, PanError, PanTracker, PanTrackerBuilder, PulseCfg,
    RunLimits, Set, Setpoint, StopReason,
};
use pantrack_hardware::{SimRig, SimRigCfg};
use pantrack_traits::Frame;

fn small_rig(target_world_x: i64, travel_limit_steps: i64) -> SimRig {
    SimRig::new(SimRigCfg {
        width: 160,
        height: 120,
        target_world_x,
        target_y: 60,
        target_size: 20,
        steps_per_px: 2,
        travel_limit_steps,
        ..SimRigCfg::default()
    })
}

fn builder_for(rig: &SimRig) -> PanTrackerBuilder<Set, Set, Set> {
    PanTracker::builder()
        .with_frames(rig.camera())
        .with_stepper(rig.stepper())
        .with_switches(rig.switches())
        .with_mask(MaskParams {
            min_area: 100,
            ..MaskParams::default()
        })
        .with_setpoint(Setpoint {
            x: 80,
            deadband: 10,
            gain: 0.1,
            min_step: 1,
            max_step: 8,
        })
        .with_pulse(PulseCfg {
            fastest_half_period_us: 50,
            slowest_half_period_us: 500,
            reset_half_period_us: 100,
        })
        .with_interlock(InterlockCfg {
            poll: Duration::from_millis(1),
            reset_duration: Duration::from_millis(40),
            ..InterlockCfg::default()
        })
}

#[test]
fn converges_on_target_then_stops_when_it_disappears() {
    let rig = small_rig(120, 10_000);
    let mut tracker = builder_for(&rig).build().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let cycle = tracker.step().unwrap();
        assert!(cycle.observation.valid);
        if (rig.apparent_target_x() - 80).abs() <= 10 && tracker.snapshot().motor.is_idle() {
            break;
        }
        assert!(Instant::now() < deadline, "did not converge");
    }
    assert!(rig.position() > 0, "panned right toward the target");

    rig.move_target_to(-1_000);
    let cycle = tracker.step().unwrap();
    assert!(!cycle.observation.valid);
    assert!(tracker.snapshot().motor.is_idle());
    assert!(!tracker.snapshot().last_observation.valid);
}

#[test]
fn frame_limit_ends_the_run() {
    let rig = small_rig(80, 10_000);
    let tracker = builder_for(&rig)
        .with_limits(RunLimits {
            max_frames: Some(5),
            collect_latency: true,
            ..RunLimits::default()
        })
        .build()
        .unwrap();
    let summary = tracker.run(&AtomicBool::new(false)).unwrap();
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.frames_with_target, 5);
    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert!(summary.latency.is_some());
}

#[test]
fn raised_flag_interrupts_before_the_first_frame() {
    let rig = small_rig(80, 10_000);
    let tracker = builder_for(&rig).build().unwrap();
    let summary = tracker.run(&AtomicBool::new(true)).unwrap();
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.stop_reason, StopReason::Interrupted);
}

#[test]
fn capture_failure_is_returned_from_run() {
    let rig = SimRig::new(SimRigCfg {
        width: 160,
        height: 120,
        target_size: 20,
        fail_after_frames: Some(3),
        ..SimRigCfg::default()
    });
    let tracker = builder_for(&rig).build().unwrap();
    let err = tracker.run(&AtomicBool::new(false)).unwrap_err();
    match err.downcast_ref::<PanError>() {
        Some(PanError::Capture(msg)) => assert!(msg.contains("capture failure")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(rig.frames(), 3);
}

#[test]
fn travel_limit_triggers_a_retreat() {
    // target needs ~80 steps right; the right switch presses at 15
    let rig = small_rig(120, 15);
    let tracker = builder_for(&rig)
        .with_limits(RunLimits {
            max_run: Some(Duration::from_millis(300)),
            ..RunLimits::default()
        })
        .build()
        .unwrap();
    let status = tracker.status_handle();
    let summary = tracker.run(&AtomicBool::new(false)).unwrap();
    assert_eq!(summary.stop_reason, StopReason::TimeLimit);
    assert!(summary.interlock_trips >= 1);
    assert!(summary.commands_rejected >= 1);
    assert!(!status.snapshot().motor.is_running());
}

#[test]
fn missing_pieces_are_reported() {
    let err = PanTracker::builder()
        .with_stepper(RecordingStepper::new())
        .with_switches(ScriptedSwitches::new())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingFrames)
    ));
}

#[test]
fn invalid_runtime_config_is_rejected() {
    let err = PanTracker::builder()
        .with_frames(QueuedFrames::repeating(Frame::filled(8, 8, [0, 0, 0])))
        .with_stepper(RecordingStepper::new())
        .with_switches(ScriptedSwitches::new())
        .with_setpoint(Setpoint {
            min_step: 4,
            max_step: 2,
            ..Setpoint::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn switch_detection_slower_than_the_reset_is_rejected() {
    let err = PanTracker::builder()
        .with_frames(QueuedFrames::repeating(Frame::filled(8, 8, [0, 0, 0])))
        .with_stepper(RecordingStepper::new())
        .with_switches(ScriptedSwitches::new())
        .with_interlock(InterlockCfg {
            poll: Duration::from_millis(20),
            debounce_n: 5,
            reset_duration: Duration::from_millis(100),
            ..InterlockCfg::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn replaced_mask_applies_on_the_next_frame() {
    let rig = small_rig(80, 10_000);
    let mut tracker = builder_for(&rig).build().unwrap();
    assert!(tracker.step().unwrap().observation.valid);
    let original = *tracker.mask_handle().snapshot();

    // blue band: neither the red target nor the green background falls in it
    tracker
        .mask_handle()
        .replace(MaskParams {
            hue_low: 100,
            hue_high: 120,
            ..original
        })
        .unwrap();
    let cycle = tracker.step().unwrap();
    assert!(!cycle.observation.valid);
    assert_eq!(cycle.command, None);

    tracker.mask_handle().replace(original).unwrap();
    assert!(tracker.step().unwrap().observation.valid);
}
