//! Boundary traits between the pan-tracking core and its collaborators.
//!
//! Everything the core touches outside its own state goes through one of these:
//! a camera (`FrameSource`), the two stepper driver lines (`StepperDriver`), the
//! limit switches (`LimitSwitches`) and time (`Clock`). This crate has no
//! dependencies so simulated and hardware backends can both implement it.

pub mod clock;
pub mod frame;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use frame::Frame;

/// Error type used at trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pan direction as seen from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logic level of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Which end-of-travel switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchId {
    Left,
    Right,
}

/// Debounce-free reading of a single limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchLevel {
    Pressed,
    #[default]
    Released,
}

impl SwitchLevel {
    #[inline]
    pub fn is_pressed(self) -> bool {
        matches!(self, SwitchLevel::Pressed)
    }
}

/// Pull-based camera. The core calls `next_frame` once per processing cycle and
/// never opens, configures or releases the device itself.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, BoxError>;
}

/// Two-line stepper driver (direction + step). Write-only.
pub trait StepperDriver {
    fn set_direction(&mut self, direction: Direction) -> Result<(), BoxError>;
    fn set_step(&mut self, level: Level) -> Result<(), BoxError>;

    /// One full step edge pair without any delay between them.
    fn pulse_step(&mut self) -> Result<(), BoxError> {
        self.set_step(Level::High)?;
        self.set_step(Level::Low)
    }
}

/// Polled limit switches. No interrupt or edge contract is assumed.
pub trait LimitSwitches {
    fn read_switch(&mut self, id: SwitchId) -> Result<SwitchLevel, BoxError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Frame, BoxError> {
        (**self).next_frame()
    }
}

impl<T: StepperDriver + ?Sized> StepperDriver for Box<T> {
    fn set_direction(&mut self, direction: Direction) -> Result<(), BoxError> {
        (**self).set_direction(direction)
    }
    fn set_step(&mut self, level: Level) -> Result<(), BoxError> {
        (**self).set_step(level)
    }
}

impl<T: LimitSwitches + ?Sized> LimitSwitches for Box<T> {
    fn read_switch(&mut self, id: SwitchId) -> Result<SwitchLevel, BoxError> {
        (**self).read_switch(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_flips() {
        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn default_pulse_step_goes_high_then_low() {
        #[derive(Default)]
        struct Lines(Vec<Level>);
        impl StepperDriver for Lines {
            fn set_direction(&mut self, _d: Direction) -> Result<(), BoxError> {
                Ok(())
            }
            fn set_step(&mut self, level: Level) -> Result<(), BoxError> {
                self.0.push(level);
                Ok(())
            }
        }
        let mut l = Lines::default();
        l.pulse_step().unwrap();
        assert_eq!(l.0, vec![Level::High, Level::Low]);
    }
}
