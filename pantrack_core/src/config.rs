//! Runtime configuration structs used by the tracker.
//!
//! These are separate from the TOML-deserialized config in `pantrack_config`;
//! `conversions.rs` maps one onto the other.
use std::time::Duration;

/// HSV bounds (OpenCV scale: hue 0..=179, sat/val 0..=255) plus the minimum
/// region size. Swapped only as a whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskParams {
    pub hue_low: u8,
    pub hue_high: u8,
    pub sat_low: u8,
    pub sat_high: u8,
    pub val_low: u8,
    pub val_high: u8,
    /// Regions must be strictly larger than this to be a target.
    pub min_area: u32,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            hue_low: 168,
            hue_high: 179,
            sat_low: 101,
            sat_high: 255,
            val_low: 45,
            val_high: 255,
            min_area: 500,
        }
    }
}

impl MaskParams {
    /// Bounds check shared by the builder and `MaskHandle::replace`.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.hue_low > 179 || self.hue_high > 179 {
            return Err("hue bounds must be <= 179");
        }
        if self.sat_low > self.sat_high {
            return Err("sat_low must be <= sat_high");
        }
        if self.val_low > self.val_high {
            return Err("val_low must be <= val_high");
        }
        Ok(())
    }

    /// Inclusive in-range test; a hue range with `low > high` wraps through 0.
    #[inline]
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        let hue_ok = if self.hue_low <= self.hue_high {
            (self.hue_low..=self.hue_high).contains(&h)
        } else {
            h >= self.hue_low || h <= self.hue_high
        };
        hue_ok
            && (self.sat_low..=self.sat_high).contains(&s)
            && (self.val_low..=self.val_high).contains(&v)
    }
}

/// Where the target should sit and how hard to correct toward it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    /// Target x coordinate (pixels)
    pub x: i32,
    /// No correction while `|offset| <= deadband`
    pub deadband: u32,
    /// Speed levels per pixel of offset
    pub gain: f32,
    pub min_step: u32,
    pub max_step: u32,
}

impl Default for Setpoint {
    fn default() -> Self {
        Self {
            x: 160,
            deadband: 30,
            gain: 0.05,
            min_step: 1,
            max_step: 10,
        }
    }
}

/// Step pulse timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseCfg {
    pub fastest_half_period_us: u64,
    pub slowest_half_period_us: u64,
    pub reset_half_period_us: u64,
}

impl Default for PulseCfg {
    fn default() -> Self {
        Self {
            fastest_half_period_us: 500,
            slowest_half_period_us: 3000,
            reset_half_period_us: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterlockCfg {
    pub poll: Duration,
    /// Consecutive identical polls before a level change is accepted (>= 1).
    pub debounce_n: u8,
    /// Length of the timed retreat away from a pressed switch.
    pub reset_duration: Duration,
    /// A release of every switch ends the retreat early.
    pub end_reset_on_release: bool,
}

impl Default for InterlockCfg {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(20),
            debounce_n: 1,
            reset_duration: Duration::from_millis(2100),
            end_reset_on_release: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCfg {
    /// Bound on joining the pulse loop and the interlock monitor.
    pub join_timeout: Duration,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_millis(500),
        }
    }
}

/// Optional bounds on a tracking run; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunLimits {
    pub max_frames: Option<u64>,
    pub max_run: Option<Duration>,
    /// Collect per-frame processing latency for the run summary.
    pub collect_latency: bool,
}
