//! Value types flowing through the control path.

use std::time::{Duration, Instant};

pub use pantrack_traits::{Direction, SwitchId, SwitchLevel};

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Center of the box, rounded down (`x + w/2`, `y + h/2`).
    #[inline]
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

/// Result of one localization pass. `valid == true` implies `area >= min_area`;
/// when `valid` is false the centroid and box are meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    pub centroid_x: i32,
    pub centroid_y: i32,
    pub bounding_box: BoundingBox,
    pub area: u32,
    pub valid: bool,
}

impl Observation {
    /// No target this frame.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_box(bounding_box: BoundingBox, area: u32, valid: bool) -> Self {
        let (centroid_x, centroid_y) = bounding_box.center();
        Self {
            centroid_x,
            centroid_y,
            bounding_box,
            area,
            valid,
        }
    }
}

/// One tracking decision; superseded by the next control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub direction: Direction,
    /// Speed level, `min_step..=max_step`
    pub magnitude: u32,
}

/// The single piece of cross-thread motor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Idle,
    Running(Direction),
    /// Timed retreat forced by the interlock; ends at the deadline.
    Resetting(Direction, Instant),
}

impl MotorState {
    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, MotorState::Idle)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, MotorState::Running(_))
    }

    #[inline]
    pub fn is_resetting(&self) -> bool {
        matches!(self, MotorState::Resetting(..))
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            MotorState::Idle => None,
            MotorState::Running(d) | MotorState::Resetting(d, _) => Some(*d),
        }
    }
}

/// Both limit switches as sampled in one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitSwitchState {
    pub left: SwitchLevel,
    pub right: SwitchLevel,
}

impl LimitSwitchState {
    pub const RELEASED: Self = Self {
        left: SwitchLevel::Released,
        right: SwitchLevel::Released,
    };

    #[inline]
    pub fn any_pressed(&self) -> bool {
        self.left.is_pressed() || self.right.is_pressed()
    }

    #[inline]
    pub fn both_pressed(&self) -> bool {
        self.left.is_pressed() && self.right.is_pressed()
    }

    #[inline]
    pub fn get(&self, id: SwitchId) -> SwitchLevel {
        match id {
            SwitchId::Left => self.left,
            SwitchId::Right => self.right,
        }
    }
}

/// Safety-path request to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    /// Drive away from a pressed switch for a fixed time.
    Retreat {
        direction: Direction,
        duration: Duration,
    },
    /// Both switches pressed: stop and do not attempt a reset.
    Fault,
    /// Every switch released after a press or fault.
    Cleared,
}
