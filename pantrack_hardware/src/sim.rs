//! Closed-loop simulated rig.
//!
//! One shared state backs three handles: the stepper moves a position counter on
//! every rising step edge, the camera renders the target shifted by that position,
//! and each limit switch reads pressed once the position reaches its travel bound.
//! Handles are `Send` so each can live on its own thread like real hardware.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use pantrack_traits::{
    BoxError, Direction, Frame, FrameSource, Level, LimitSwitches, StepperDriver, SwitchId,
    SwitchLevel,
};

use crate::error::HwError;

#[derive(Debug, Clone)]
pub struct SimRigCfg {
    pub width: u32,
    pub height: u32,
    /// Target center in pixels when the pan position is 0
    pub target_world_x: i64,
    pub target_y: i64,
    /// Side length of the square target (pixels)
    pub target_size: u32,
    pub target_rgb: [u8; 3],
    pub background_rgb: [u8; 3],
    /// Steps needed to shift the image by one pixel
    pub steps_per_px: i64,
    /// Switches press at +/- this many steps from the start position
    pub travel_limit_steps: i64,
    /// Sleep inside `next_frame` to emulate a camera's capture rate
    pub frame_period: Duration,
    /// Fail `next_frame` once this many frames were delivered
    pub fail_after_frames: Option<u64>,
}

impl Default for SimRigCfg {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            target_world_x: 230,
            target_y: 120,
            target_size: 40,
            // hue ~172 on the OpenCV scale: inside the default red mask
            target_rgb: [230, 20, 75],
            background_rgb: [30, 60, 30],
            steps_per_px: 4,
            travel_limit_steps: 2000,
            frame_period: Duration::ZERO,
            fail_after_frames: None,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    position: AtomicI64,
    dir_right: AtomicBool,
    step_high: AtomicBool,
    pulses: AtomicU64,
    target_world_x: AtomicI64,
    forced_left: AtomicBool,
    forced_right: AtomicBool,
    frames: AtomicU64,
}

/// Owner of the shared simulation state; hands out the three device handles.
#[derive(Debug, Clone)]
pub struct SimRig {
    cfg: Arc<SimRigCfg>,
    state: Arc<SimState>,
}

impl SimRig {
    pub fn new(cfg: SimRigCfg) -> Self {
        let state = SimState::default();
        state
            .target_world_x
            .store(cfg.target_world_x, Ordering::Relaxed);
        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(state),
        }
    }

    pub fn stepper(&self) -> SimStepper {
        SimStepper {
            state: self.state.clone(),
        }
    }

    pub fn switches(&self) -> SimSwitches {
        SimSwitches {
            cfg: self.cfg.clone(),
            state: self.state.clone(),
        }
    }

    pub fn camera(&self) -> SimCamera {
        SimCamera {
            cfg: self.cfg.clone(),
            state: self.state.clone(),
        }
    }

    /// Pan position in steps; positive is to the right.
    pub fn position(&self) -> i64 {
        self.state.position.load(Ordering::Relaxed)
    }

    /// Rising step edges seen so far.
    pub fn pulses(&self) -> u64 {
        self.state.pulses.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> u64 {
        self.state.frames.load(Ordering::Relaxed)
    }

    /// Current direction line as last written by the driver.
    pub fn direction(&self) -> Direction {
        if self.state.dir_right.load(Ordering::Relaxed) {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Where the target appears in the image for the current pan position.
    pub fn apparent_target_x(&self) -> i64 {
        apparent_x(&self.cfg, &self.state)
    }

    pub fn move_target_to(&self, world_x: i64) {
        self.state.target_world_x.store(world_x, Ordering::Relaxed);
    }

    /// Hold a switch pressed regardless of position (wiring fault, manual test).
    pub fn force_switch(&self, id: SwitchId, pressed: bool) {
        match id {
            SwitchId::Left => self.state.forced_left.store(pressed, Ordering::Relaxed),
            SwitchId::Right => self.state.forced_right.store(pressed, Ordering::Relaxed),
        }
    }
}

fn apparent_x(cfg: &SimRigCfg, state: &SimState) -> i64 {
    let world = state.target_world_x.load(Ordering::Relaxed);
    let shift = state.position.load(Ordering::Relaxed) / cfg.steps_per_px.max(1);
    world - shift
}

pub struct SimStepper {
    state: Arc<SimState>,
}

impl StepperDriver for SimStepper {
    fn set_direction(&mut self, direction: Direction) -> Result<(), BoxError> {
        self.state
            .dir_right
            .store(direction == Direction::Right, Ordering::Relaxed);
        Ok(())
    }

    fn set_step(&mut self, level: Level) -> Result<(), BoxError> {
        let high = level == Level::High;
        let was_high = self.state.step_high.swap(high, Ordering::Relaxed);
        if high && !was_high {
            let delta = if self.state.dir_right.load(Ordering::Relaxed) {
                1
            } else {
                -1
            };
            self.state.position.fetch_add(delta, Ordering::Relaxed);
            self.state.pulses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

pub struct SimSwitches {
    cfg: Arc<SimRigCfg>,
    state: Arc<SimState>,
}

impl LimitSwitches for SimSwitches {
    fn read_switch(&mut self, id: SwitchId) -> Result<SwitchLevel, BoxError> {
        let pos = self.state.position.load(Ordering::Relaxed);
        let limit = self.cfg.travel_limit_steps;
        let pressed = match id {
            SwitchId::Left => self.state.forced_left.load(Ordering::Relaxed) || pos <= -limit,
            SwitchId::Right => self.state.forced_right.load(Ordering::Relaxed) || pos >= limit,
        };
        Ok(if pressed {
            SwitchLevel::Pressed
        } else {
            SwitchLevel::Released
        })
    }
}

pub struct SimCamera {
    cfg: Arc<SimRigCfg>,
    state: Arc<SimState>,
}

impl FrameSource for SimCamera {
    fn next_frame(&mut self) -> Result<Frame, BoxError> {
        let delivered = self.state.frames.load(Ordering::Relaxed);
        if let Some(limit) = self.cfg.fail_after_frames
            && delivered >= limit
        {
            return Err(Box::new(HwError::SimCaptureFailure(delivered)));
        }
        if !self.cfg.frame_period.is_zero() {
            std::thread::sleep(self.cfg.frame_period);
        }

        let cfg = &self.cfg;
        let mut frame = Frame::filled(cfg.width, cfg.height, cfg.background_rgb);
        let half = i64::from(cfg.target_size / 2);
        let cx = apparent_x(cfg, &self.state);
        frame.fill_rect(
            cx - half,
            cfg.target_y - half,
            cfg.target_size,
            cfg.target_size,
            cfg.target_rgb,
        );
        self.state.frames.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target_x = cx, frame = delivered, "sim frame");
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rig() -> SimRig {
        SimRig::new(SimRigCfg {
            travel_limit_steps: 3,
            ..SimRigCfg::default()
        })
    }

    #[test]
    fn rising_edges_move_in_commanded_direction() {
        let rig = rig();
        let mut s = rig.stepper();
        s.set_direction(Direction::Right).unwrap();
        s.pulse_step().unwrap();
        s.pulse_step().unwrap();
        assert_eq!(rig.position(), 2);
        s.set_direction(Direction::Left).unwrap();
        s.pulse_step().unwrap();
        assert_eq!(rig.position(), 1);
        assert_eq!(rig.pulses(), 3);
    }

    #[test]
    fn repeated_high_is_a_single_edge() {
        let rig = rig();
        let mut s = rig.stepper();
        s.set_direction(Direction::Right).unwrap();
        s.set_step(Level::High).unwrap();
        s.set_step(Level::High).unwrap();
        assert_eq!(rig.position(), 1);
    }

    #[rstest]
    #[case(Direction::Left, 2, SwitchLevel::Released, SwitchLevel::Released)]
    #[case(Direction::Left, 3, SwitchLevel::Pressed, SwitchLevel::Released)]
    #[case(Direction::Right, 3, SwitchLevel::Released, SwitchLevel::Pressed)]
    #[case(Direction::Right, 5, SwitchLevel::Released, SwitchLevel::Pressed)]
    fn switches_press_at_travel_bounds(
        #[case] direction: Direction,
        #[case] steps: u32,
        #[case] left: SwitchLevel,
        #[case] right: SwitchLevel,
    ) {
        let rig = rig();
        let mut s = rig.stepper();
        let mut sw = rig.switches();
        s.set_direction(direction).unwrap();
        for _ in 0..steps {
            s.pulse_step().unwrap();
        }
        assert_eq!(sw.read_switch(SwitchId::Left).unwrap(), left);
        assert_eq!(sw.read_switch(SwitchId::Right).unwrap(), right);
    }

    #[test]
    fn forced_switch_reads_pressed() {
        let rig = rig();
        let mut sw = rig.switches();
        rig.force_switch(SwitchId::Right, true);
        assert!(sw.read_switch(SwitchId::Right).unwrap().is_pressed());
        rig.force_switch(SwitchId::Right, false);
        assert!(!sw.read_switch(SwitchId::Right).unwrap().is_pressed());
    }

    #[test]
    fn camera_draws_target_and_fails_on_schedule() {
        let rig = SimRig::new(SimRigCfg {
            fail_after_frames: Some(1),
            ..SimRigCfg::default()
        });
        let mut cam = rig.camera();
        let f = cam.next_frame().unwrap();
        assert_eq!(f.pixel(230, 120), [230, 20, 75]);
        assert_eq!(f.pixel(10, 10), [30, 60, 30]);
        let err = cam.next_frame().expect_err("second frame fails");
        assert!(err.to_string().contains("capture failure"));
    }

    #[test]
    fn panning_right_shifts_target_left_in_image() {
        let rig = rig();
        let before = rig.apparent_target_x();
        let mut s = rig.stepper();
        s.set_direction(Direction::Right).unwrap();
        for _ in 0..8 {
            s.pulse_step().unwrap();
        }
        assert_eq!(rig.apparent_target_x(), before - 2);
    }
}
