//! Timing helpers shared by the actuator and the runner.
use std::time::Duration;

use crate::config::PulseCfg;

/// Half-period for a tracking magnitude: `slowest / magnitude`, never faster
/// than `fastest_half_period_us`. Magnitude 0 is treated as 1.
#[inline]
pub fn tracking_half_period(magnitude: u32, pulse: &PulseCfg) -> Duration {
    let us = (pulse.slowest_half_period_us / u64::from(magnitude.max(1)))
        .max(pulse.fastest_half_period_us)
        .max(1);
    Duration::from_micros(us)
}

/// Half-period used while retreating from a limit switch.
#[inline]
pub fn reset_half_period(pulse: &PulseCfg) -> Duration {
    Duration::from_micros(pulse.reset_half_period_us.max(1))
}

/// Saturating milliseconds of a duration, for log fields and error values.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 3000)]
    #[case(1, 3000)]
    #[case(2, 1500)]
    #[case(4, 750)]
    #[case(6, 500)]
    #[case(10, 500)]
    fn half_period_scales_with_magnitude(#[case] magnitude: u32, #[case] expect_us: u64) {
        let p = PulseCfg::default();
        assert_eq!(
            tracking_half_period(magnitude, &p),
            Duration::from_micros(expect_us)
        );
    }

    #[test]
    fn reset_uses_its_own_period() {
        assert_eq!(
            reset_half_period(&PulseCfg::default()),
            Duration::from_micros(1500)
        );
    }
}
