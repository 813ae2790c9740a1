//! `From` implementations bridging `pantrack_config` types to runtime types.

use std::time::Duration;

use crate::config::{ActuatorCfg, InterlockCfg, MaskParams, PulseCfg, RunLimits, Setpoint};

impl From<&pantrack_config::MaskCfg> for MaskParams {
    fn from(c: &pantrack_config::MaskCfg) -> Self {
        Self {
            hue_low: c.hue_low,
            hue_high: c.hue_high,
            sat_low: c.sat_low,
            sat_high: c.sat_high,
            val_low: c.val_low,
            val_high: c.val_high,
            min_area: c.min_area,
        }
    }
}

// The setpoint needs the frame width for its default, so it comes from the whole config.
impl From<&pantrack_config::Config> for Setpoint {
    fn from(c: &pantrack_config::Config) -> Self {
        Self {
            x: c.effective_setpoint_x(),
            deadband: c.control.deadband,
            gain: c.control.gain,
            min_step: c.control.min_step,
            max_step: c.control.max_step,
        }
    }
}

impl From<&pantrack_config::PulseCfg> for PulseCfg {
    fn from(c: &pantrack_config::PulseCfg) -> Self {
        Self {
            fastest_half_period_us: c.fastest_half_period_us,
            slowest_half_period_us: c.slowest_half_period_us,
            reset_half_period_us: c.reset_half_period_us,
        }
    }
}

impl From<&pantrack_config::InterlockCfg> for InterlockCfg {
    fn from(c: &pantrack_config::InterlockCfg) -> Self {
        Self {
            poll: Duration::from_millis(c.poll_ms),
            debounce_n: c.debounce_n.max(1),
            reset_duration: Duration::from_millis(c.reset_ms),
            end_reset_on_release: c.end_reset_on_release,
        }
    }
}

impl From<&pantrack_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &pantrack_config::ActuatorCfg) -> Self {
        Self {
            join_timeout: Duration::from_millis(c.join_timeout_ms),
        }
    }
}

impl From<&pantrack_config::RunnerCfg> for RunLimits {
    fn from(c: &pantrack_config::RunnerCfg) -> Self {
        Self {
            max_frames: c.max_frames,
            max_run: c.max_run_ms.map(Duration::from_millis),
            collect_latency: false,
        }
    }
}
