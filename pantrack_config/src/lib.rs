#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the pan tracker.
//!
//! - `Config` and its sections are deserialized from TOML and validated once at
//!   startup. Nothing here is mutated afterwards; the core receives its own
//!   runtime structs built from these through `From` impls.
//! - Only `[pins]` is mandatory. Every other section falls back to values tuned
//!   for a 320x240 camera tracking a red target.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub motor_step: u8,
    pub motor_dir: u8,
    /// Optional driver enable line (held active while the tracker runs)
    pub motor_en: Option<u8>,
    pub limit_left: u8,
    pub limit_right: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraCfg {
    pub width: u32,
    pub height: u32,
    /// Requested capture rate; the frame source owns the actual pacing.
    pub fps: u32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 10,
        }
    }
}

/// HSV bounds on the OpenCV scale (hue 0..=179, sat/val 0..=255).
/// `hue_low > hue_high` selects a range that wraps through 0.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MaskCfg {
    pub hue_low: u8,
    pub hue_high: u8,
    pub sat_low: u8,
    pub sat_high: u8,
    pub val_low: u8,
    pub val_high: u8,
    /// Regions must be strictly larger than this (pixels) to count as a target.
    pub min_area: u32,
}

impl Default for MaskCfg {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Target x coordinate in pixels. Defaults to the horizontal frame center.
    pub setpoint_x: Option<i32>,
    /// No correction while |offset| <= deadband (pixels)
    pub deadband: u32,
    /// Speed levels per pixel of offset
    pub gain: f32,
    pub min_step: u32,
    pub max_step: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            setpoint_x: None,
            deadband: 30,
            gain: 0.05,
            min_step: 1,
            max_step: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PulseCfg {
    /// Half-period at the highest speed level (microseconds)
    pub fastest_half_period_us: u64,
    /// Half-period at speed level 1 (microseconds)
    pub slowest_half_period_us: u64,
    /// Half-period used while retreating from a limit switch
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InterlockCfg {
    /// Switches pull the input low when pressed
    pub active_low: bool,
    pub poll_ms: u64,
    /// Consecutive polls required before a level change is believed
    pub debounce_n: u8,
    /// Duration of the timed retreat away from a pressed switch
    pub reset_ms: u64,
    /// End a retreat as soon as every switch reads released
    pub end_reset_on_release: bool,
}

impl Default for InterlockCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            poll_ms: 20,
            debounce_n: 1,
            reset_ms: 2100,
            end_reset_on_release: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Upper bound on waiting for the pulse loop to exit at shutdown
    pub join_timeout_ms: u64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            join_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RunnerCfg {
    /// Stop after this many frames (unset: run until interrupted)
    pub max_frames: Option<u64>,
    /// Stop after this much wall time (unset: run until interrupted)
    pub max_run_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub camera: CameraCfg,
    #[serde(default)]
    pub mask: MaskCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub pulse: PulseCfg,
    #[serde(default)]
    pub interlock: InterlockCfg,
    #[serde(default)]
    pub actuator: ActuatorCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Setpoint after applying the frame-center default.
    pub fn effective_setpoint_x(&self) -> i32 {
        self.control
            .setpoint_x
            .unwrap_or((self.camera.width / 2) as i32)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let mut pins = vec![
            ("motor_step", self.pins.motor_step),
            ("motor_dir", self.pins.motor_dir),
            ("limit_left", self.pins.limit_left),
            ("limit_right", self.pins.limit_right),
        ];
        if let Some(en) = self.pins.motor_en {
            pins.push(("motor_en", en));
        }
        for (i, (name_a, a)) in pins.iter().enumerate() {
            for (name_b, b) in pins.iter().skip(i + 1) {
                if a == b {
                    eyre::bail!("pins.{name_a} and pins.{name_b} share GPIO {a}");
                }
            }
        }

        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            eyre::bail!("camera.width and camera.height must be > 0");
        }
        if self.camera.fps == 0 {
            eyre::bail!("camera.fps must be > 0");
        }

        // Mask
        if self.mask.hue_low > 179 || self.mask.hue_high > 179 {
            eyre::bail!("mask.hue_low/hue_high must be in [0, 179]");
        }
        if self.mask.sat_low > self.mask.sat_high {
            eyre::bail!("mask.sat_low must be <= mask.sat_high");
        }
        if self.mask.val_low > self.mask.val_high {
            eyre::bail!("mask.val_low must be <= mask.val_high");
        }
        let frame_px = u64::from(self.camera.width) * u64::from(self.camera.height);
        if u64::from(self.mask.min_area) >= frame_px {
            eyre::bail!("mask.min_area must be smaller than the frame ({frame_px} px)");
        }

        // Control
        let sp = self.effective_setpoint_x();
        if sp < 0 || sp >= self.camera.width as i32 {
            eyre::bail!(
                "control.setpoint_x must be within the frame [0, {})",
                self.camera.width
            );
        }
        if !self.control.gain.is_finite() || self.control.gain <= 0.0 {
            eyre::bail!("control.gain must be a finite value > 0");
        }
        if self.control.min_step == 0 {
            eyre::bail!("control.min_step must be >= 1");
        }
        if self.control.max_step < self.control.min_step {
            eyre::bail!("control.max_step must be >= control.min_step");
        }
        if self.control.deadband >= self.camera.width {
            eyre::bail!("control.deadband must be smaller than camera.width");
        }

        // Pulse
        if self.pulse.fastest_half_period_us == 0 {
            eyre::bail!("pulse.fastest_half_period_us must be >= 1");
        }
        if self.pulse.slowest_half_period_us < self.pulse.fastest_half_period_us {
            eyre::bail!("pulse.slowest_half_period_us must be >= pulse.fastest_half_period_us");
        }
        if self.pulse.reset_half_period_us == 0 {
            eyre::bail!("pulse.reset_half_period_us must be >= 1");
        }

        // Interlock
        if self.interlock.poll_ms == 0 {
            eyre::bail!("interlock.poll_ms must be >= 1");
        }
        if self.interlock.debounce_n == 0 {
            eyre::bail!("interlock.debounce_n must be >= 1");
        }
        if self.interlock.reset_ms == 0 {
            eyre::bail!("interlock.reset_ms must be >= 1");
        }
        let detect_ms = self
            .interlock
            .poll_ms
            .saturating_mul(u64::from(self.interlock.debounce_n));
        if detect_ms >= self.interlock.reset_ms {
            eyre::bail!(
                "interlock.poll_ms * interlock.debounce_n ({detect_ms} ms) must be shorter than interlock.reset_ms"
            );
        }

        // Actuator
        if self.actuator.join_timeout_ms == 0 {
            eyre::bail!("actuator.join_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Runner
        if self.runner.max_frames == Some(0) {
            eyre::bail!("runner.max_frames must be >= 1 when set");
        }
        if self.runner.max_run_ms == Some(0) {
            eyre::bail!("runner.max_run_ms must be >= 1 when set");
        }

        Ok(())
    }
}
