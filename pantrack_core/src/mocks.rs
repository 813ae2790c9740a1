//! Test and helper mocks for pantrack_core
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use pantrack_traits::{
    BoxError, Direction, Frame, FrameSource, Level, LimitSwitches, StepperDriver, SwitchId,
    SwitchLevel,
};

use crate::types::LimitSwitchState;

/// Line activity seen by a `RecordingStepper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Dir(Direction),
    Step(Level),
}

/// Stepper that records every write; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingStepper {
    events: Arc<Mutex<Vec<LineEvent>>>,
}

impl RecordingStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LineEvent> {
        self.events.lock().clone()
    }

    /// Rising edges recorded so far.
    pub fn rising_edges(&self) -> usize {
        let ev = self.events.lock();
        let mut high = false;
        let mut n = 0;
        for e in ev.iter() {
            if let LineEvent::Step(level) = e {
                let now_high = *level == Level::High;
                if now_high && !high {
                    n += 1;
                }
                high = now_high;
            }
        }
        n
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl StepperDriver for RecordingStepper {
    fn set_direction(&mut self, direction: Direction) -> Result<(), BoxError> {
        self.events.lock().push(LineEvent::Dir(direction));
        Ok(())
    }

    fn set_step(&mut self, level: Level) -> Result<(), BoxError> {
        self.events.lock().push(LineEvent::Step(level));
        Ok(())
    }
}

/// Limit switches whose levels are set from the test; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSwitches {
    state: Arc<Mutex<LimitSwitchState>>,
}

impl ScriptedSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: SwitchId, pressed: bool) {
        let level = if pressed {
            SwitchLevel::Pressed
        } else {
            SwitchLevel::Released
        };
        let mut st = self.state.lock();
        match id {
            SwitchId::Left => st.left = level,
            SwitchId::Right => st.right = level,
        }
    }
}

impl LimitSwitches for ScriptedSwitches {
    fn read_switch(&mut self, id: SwitchId) -> Result<SwitchLevel, BoxError> {
        Ok(self.state.lock().get(id))
    }
}

/// Plays back a fixed list of frames, then fails like a closed stream.
#[derive(Debug, Default)]
pub struct QueuedFrames {
    frames: VecDeque<Frame>,
    /// Repeat the last frame instead of failing once the queue is empty
    hold_last: Option<Frame>,
}

impl QueuedFrames {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            hold_last: None,
        }
    }

    /// The same frame forever.
    pub fn repeating(frame: Frame) -> Self {
        Self {
            frames: VecDeque::new(),
            hold_last: Some(frame),
        }
    }
}

impl FrameSource for QueuedFrames {
    fn next_frame(&mut self) -> Result<Frame, BoxError> {
        if let Some(f) = self.frames.pop_front() {
            return Ok(f);
        }
        match &self.hold_last {
            Some(f) => Ok(f.clone()),
            None => Err(Box::new(std::io::Error::other("no more frames"))),
        }
    }
}
