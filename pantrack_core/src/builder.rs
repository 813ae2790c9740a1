//! Type-state builder for `PanTracker`.
//!
//! The builder enforces at compile time that a frame source, a stepper driver
//! and limit switches are provided before `build()` is available. `try_build()`
//! is always available for dynamic checks. Building validates every runtime
//! config value and spawns the pulse loop and the interlock monitor.

use std::marker::PhantomData;
use std::sync::Arc;

use pantrack_traits::clock::{Clock, MonotonicClock};
use pantrack_traits::{FrameSource, LimitSwitches, StepperDriver};

use crate::actuator::Actuator;
use crate::config::*;
use crate::coordinator::Coordinator;
use crate::error::{BuildError, Result};
use crate::interlock::{InterlockMonitor, SafetyInterlock};
use crate::localizer::{Localizer, MaskHandle};
use crate::runner::PanTracker;
use crate::segment::RegionExtractor;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct PanTrackerBuilder<F = Missing, D = Missing, L = Missing> {
    frames: Option<Box<dyn FrameSource + Send>>,
    stepper: Option<Box<dyn StepperDriver + Send>>,
    switches: Option<Box<dyn LimitSwitches + Send>>,
    mask: Option<MaskHandle>,
    setpoint: Option<Setpoint>,
    pulse: Option<PulseCfg>,
    interlock: Option<InterlockCfg>,
    actuator: Option<ActuatorCfg>,
    limits: Option<RunLimits>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    extractor: Option<Box<dyn RegionExtractor + Send>>,
    _f: PhantomData<F>,
    _d: PhantomData<D>,
    _l: PhantomData<L>,
}

impl Default for PanTrackerBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            frames: None,
            stepper: None,
            switches: None,
            mask: None,
            setpoint: None,
            pulse: None,
            interlock: None,
            actuator: None,
            limits: None,
            clock: None,
            extractor: None,
            _f: PhantomData,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(
    mask: &MaskParams,
    setpoint: &Setpoint,
    pulse: &PulseCfg,
    interlock: &InterlockCfg,
    actuator: &ActuatorCfg,
) -> Result<()> {
    mask.check().map_err(invalid)?;
    if !setpoint.gain.is_finite() || setpoint.gain <= 0.0 {
        return Err(invalid("gain must be finite and > 0"));
    }
    if setpoint.min_step == 0 {
        return Err(invalid("min_step must be >= 1"));
    }
    if setpoint.max_step < setpoint.min_step {
        return Err(invalid("max_step must be >= min_step"));
    }
    if pulse.fastest_half_period_us == 0 || pulse.reset_half_period_us == 0 {
        return Err(invalid("pulse half-periods must be > 0"));
    }
    if pulse.slowest_half_period_us < pulse.fastest_half_period_us {
        return Err(invalid(
            "slowest_half_period_us must be >= fastest_half_period_us",
        ));
    }
    if interlock.poll.is_zero() {
        return Err(invalid("interlock poll must be > 0"));
    }
    if interlock.debounce_n == 0 {
        return Err(invalid("debounce_n must be >= 1"));
    }
    if interlock.reset_duration.is_zero() {
        return Err(invalid("reset duration must be > 0"));
    }
    if interlock.poll.saturating_mul(u32::from(interlock.debounce_n)) >= interlock.reset_duration {
        return Err(invalid(
            "poll * debounce_n must be shorter than the reset duration",
        ));
    }
    if actuator.join_timeout.is_zero() {
        return Err(invalid("join timeout must be > 0"));
    }
    Ok(())
}

impl<F, D, L> PanTrackerBuilder<F, D, L> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<PanTracker> {
        let frames = self
            .frames
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFrames))?;
        let stepper = self
            .stepper
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStepper))?;
        let switches = self
            .switches
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSwitches))?;

        let mask = self.mask.unwrap_or_default();
        let setpoint = self.setpoint.unwrap_or_default();
        let pulse = self.pulse.unwrap_or_default();
        let interlock = self.interlock.unwrap_or_default();
        let actuator_cfg = self.actuator.unwrap_or_default();
        validate(
            &mask.snapshot(),
            &setpoint,
            &pulse,
            &interlock,
            &actuator_cfg,
        )?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let localizer = match self.extractor {
            Some(x) => Localizer::new(x),
            None => Localizer::default(),
        };

        let coordinator = Coordinator::new(pulse, &interlock, clock.clone());
        let actuator = Actuator::spawn(stepper, coordinator.clone(), clock.clone())?;
        let monitor = match InterlockMonitor::spawn(
            switches,
            SafetyInterlock::new(interlock),
            coordinator.clone(),
            clock.clone(),
        ) {
            Ok(m) => m,
            Err(e) => {
                coordinator.request_shutdown();
                let _ = actuator.shutdown(actuator_cfg.join_timeout);
                return Err(e);
            }
        };

        Ok(PanTracker {
            frames,
            localizer,
            mask,
            setpoint,
            coordinator,
            actuator: Some(actuator),
            monitor: Some(monitor),
            limits: self.limits.unwrap_or_default(),
            join_timeout: actuator_cfg.join_timeout,
            clock,
            frames_seen: 0,
            frames_with_target: 0,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<F, D, L> PanTrackerBuilder<F, D, L> {
    pub fn with_mask(mut self, mask: MaskParams) -> Self {
        self.mask = Some(MaskHandle::new(mask));
        self
    }
    /// Share a mask handle so the caller can replace the parameters while running.
    pub fn with_mask_handle(mut self, handle: MaskHandle) -> Self {
        self.mask = Some(handle);
        self
    }
    pub fn with_setpoint(mut self, setpoint: Setpoint) -> Self {
        self.setpoint = Some(setpoint);
        self
    }
    pub fn with_pulse(mut self, pulse: PulseCfg) -> Self {
        self.pulse = Some(pulse);
        self
    }
    pub fn with_interlock(mut self, interlock: InterlockCfg) -> Self {
        self.interlock = Some(interlock);
        self
    }
    pub fn with_actuator(mut self, actuator: ActuatorCfg) -> Self {
        self.actuator = Some(actuator);
        self
    }
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = Some(limits);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Replace the default HSV region extractor.
    pub fn with_extractor(mut self, extractor: impl RegionExtractor + Send + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }
    /// Apply every section of a validated TOML config.
    pub fn with_config(self, cfg: &pantrack_config::Config) -> Self {
        self.with_mask((&cfg.mask).into())
            .with_setpoint(cfg.into())
            .with_pulse((&cfg.pulse).into())
            .with_interlock((&cfg.interlock).into())
            .with_actuator((&cfg.actuator).into())
            .with_limits((&cfg.runner).into())
    }
}

// Setters that advance type-state
impl<D, L> PanTrackerBuilder<Missing, D, L> {
    pub fn with_frames(
        self,
        frames: impl FrameSource + Send + 'static,
    ) -> PanTrackerBuilder<Set, D, L> {
        PanTrackerBuilder {
            frames: Some(Box::new(frames)),
            stepper: self.stepper,
            switches: self.switches,
            mask: self.mask,
            setpoint: self.setpoint,
            pulse: self.pulse,
            interlock: self.interlock,
            actuator: self.actuator,
            limits: self.limits,
            clock: self.clock,
            extractor: self.extractor,
            _f: PhantomData,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<F, L> PanTrackerBuilder<F, Missing, L> {
    pub fn with_stepper(
        self,
        stepper: impl StepperDriver + Send + 'static,
    ) -> PanTrackerBuilder<F, Set, L> {
        PanTrackerBuilder {
            frames: self.frames,
            stepper: Some(Box::new(stepper)),
            switches: self.switches,
            mask: self.mask,
            setpoint: self.setpoint,
            pulse: self.pulse,
            interlock: self.interlock,
            actuator: self.actuator,
            limits: self.limits,
            clock: self.clock,
            extractor: self.extractor,
            _f: PhantomData,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<F, D> PanTrackerBuilder<F, D, Missing> {
    pub fn with_switches(
        self,
        switches: impl LimitSwitches + Send + 'static,
    ) -> PanTrackerBuilder<F, D, Set> {
        PanTrackerBuilder {
            frames: self.frames,
            stepper: self.stepper,
            switches: Some(Box::new(switches)),
            mask: self.mask,
            setpoint: self.setpoint,
            pulse: self.pulse,
            interlock: self.interlock,
            actuator: self.actuator,
            limits: self.limits,
            clock: self.clock,
            extractor: self.extractor,
            _f: PhantomData,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

impl PanTrackerBuilder<Set, Set, Set> {
    /// Validate and start the tracker. Only available once frames, stepper and
    /// switches are set.
    pub fn build(self) -> Result<PanTracker> {
        self.try_build()
    }
}
