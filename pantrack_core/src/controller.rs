//! Proportional offset controller.
//!
//! Stateless: each call looks only at the current observation. The offset is
//! always measured from the setpoint.
use crate::config::Setpoint;
use crate::types::{Direction, MotorCommand, Observation};

/// Decide the motor command for one observation.
///
/// Returns `None` (stop) when there is no valid target or the target sits
/// inside the deadband.
pub fn compute(observation: &Observation, setpoint: &Setpoint) -> Option<MotorCommand> {
    if !observation.valid {
        return None;
    }
    let offset = i64::from(observation.centroid_x) - i64::from(setpoint.x);
    let abs = offset.unsigned_abs();
    if abs <= u64::from(setpoint.deadband) {
        return None;
    }
    let direction = if offset > 0 {
        Direction::Right
    } else {
        Direction::Left
    };
    Some(MotorCommand {
        direction,
        magnitude: magnitude_for(abs, setpoint),
    })
}

/// `clamp(floor(gain * |offset|), min_step, max_step)`
#[inline]
pub fn magnitude_for(abs_offset: u64, setpoint: &Setpoint) -> u32 {
    let raw = (f64::from(setpoint.gain) * abs_offset as f64).floor();
    let lo = setpoint.min_step;
    let hi = setpoint.max_step.max(lo);
    if raw.is_nan() || raw < f64::from(lo) {
        lo
    } else if raw > f64::from(hi) {
        hi
    } else {
        raw as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn obs_at(x: i32) -> Observation {
        Observation::from_box(
            BoundingBox {
                x: x - 5,
                y: 0,
                width: 10,
                height: 10,
            },
            1000,
            true,
        )
    }

    fn sp() -> Setpoint {
        Setpoint {
            x: 150,
            deadband: 20,
            gain: 0.05,
            min_step: 1,
            max_step: 10,
        }
    }

    #[test]
    fn right_of_setpoint_drives_right() {
        let cmd = compute(&obs_at(200), &sp()).expect("outside deadband");
        assert_eq!(cmd.direction, Direction::Right);
        assert_eq!(cmd.magnitude, 2);
    }

    #[test]
    fn left_of_setpoint_drives_left_with_min_step() {
        let cmd = compute(&obs_at(120), &sp()).expect("outside deadband");
        assert_eq!(cmd.direction, Direction::Left);
        // floor(0.05 * 30) = 1
        assert_eq!(cmd.magnitude, 1);
    }

    #[test]
    fn deadband_edge_is_inclusive() {
        assert_eq!(compute(&obs_at(170), &sp()), None);
        assert!(compute(&obs_at(171), &sp()).is_some());
    }

    #[test]
    fn invalid_observation_stops() {
        assert_eq!(compute(&Observation::none(), &sp()), None);
    }

    #[test]
    fn large_offset_saturates_at_max_step() {
        let cmd = compute(&obs_at(10_000), &sp()).expect("outside deadband");
        assert_eq!(cmd.magnitude, 10);
    }
}
