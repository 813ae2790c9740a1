//! Limit-switch safety interlock.
//!
//! `SafetyInterlock` is the decision logic: debounce raw readings and turn
//! switch edges into overrides. `InterlockMonitor` runs it on its own thread
//! at the configured poll rate and feeds the coordinator.
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use pantrack_traits::{Clock, LimitSwitches};

use crate::config::InterlockCfg;
use crate::coordinator::Coordinator;
use crate::error::{PanError, Result};
use crate::hw_error::map_hw_error;
use crate::types::{Direction, LimitSwitchState, Override, SwitchId, SwitchLevel};
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Clear,
    /// Retreat issued away from `from`; re-issued if still pressed after `until`
    Retreating { from: SwitchId, until: Instant },
    Fault,
}

#[derive(Debug, Clone, Copy, Default)]
struct Debounce {
    candidate: SwitchLevel,
    count: u8,
}

impl Debounce {
    /// Feed one raw level; returns the new accepted level if it changed.
    fn feed(&mut self, raw: SwitchLevel, accepted: SwitchLevel, n: u8) -> Option<SwitchLevel> {
        if raw == accepted {
            self.count = 0;
            return None;
        }
        if raw == self.candidate {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = raw;
            self.count = 1;
        }
        if self.count >= n {
            self.count = 0;
            Some(raw)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct SafetyInterlock {
    cfg: InterlockCfg,
    raw: LimitSwitchState,
    debounced: LimitSwitchState,
    left: Debounce,
    right: Debounce,
    latch: Latch,
}

impl SafetyInterlock {
    pub fn new(cfg: InterlockCfg) -> Self {
        Self {
            cfg,
            raw: LimitSwitchState::RELEASED,
            debounced: LimitSwitchState::RELEASED,
            left: Debounce::default(),
            right: Debounce::default(),
            latch: Latch::Clear,
        }
    }

    /// Switch levels after debouncing.
    pub fn debounced(&self) -> LimitSwitchState {
        self.debounced
    }

    /// Levels the coordinator enforces: a side counts as pressed when either
    /// the last raw sample or the debounced level reads pressed. Debounce only
    /// delays retreat and release decisions, never the stop of a running motor.
    pub fn engaged(&self) -> LimitSwitchState {
        let side = |raw: SwitchLevel, debounced: SwitchLevel| {
            if raw.is_pressed() || debounced.is_pressed() {
                SwitchLevel::Pressed
            } else {
                SwitchLevel::Released
            }
        };
        LimitSwitchState {
            left: side(self.raw.left, self.debounced.left),
            right: side(self.raw.right, self.debounced.right),
        }
    }

    /// Feed one raw sample of both switches taken at `now`.
    ///
    /// - left only pressed: retreat right for the reset duration
    /// - right only pressed: retreat left
    /// - both pressed: fault
    /// - everything released after a press or fault: cleared (once)
    ///
    /// A held switch produces no new override until the previous retreat's
    /// deadline has passed.
    pub fn poll(&mut self, raw: LimitSwitchState, now: Instant) -> Option<Override> {
        self.raw = raw;
        let n = self.cfg.debounce_n.max(1);
        if let Some(level) = self.left.feed(raw.left, self.debounced.left, n) {
            self.debounced.left = level;
        }
        if let Some(level) = self.right.feed(raw.right, self.debounced.right, n) {
            self.debounced.right = level;
        }

        let s = self.debounced;
        match (s.left.is_pressed(), s.right.is_pressed()) {
            (true, true) => {
                if self.latch == Latch::Fault {
                    None
                } else {
                    self.latch = Latch::Fault;
                    Some(Override::Fault)
                }
            }
            (true, false) => self.retreat_from(SwitchId::Left, now),
            (false, true) => self.retreat_from(SwitchId::Right, now),
            (false, false) => {
                if self.latch == Latch::Clear {
                    None
                } else {
                    self.latch = Latch::Clear;
                    Some(Override::Cleared)
                }
            }
        }
    }

    fn retreat_from(&mut self, from: SwitchId, now: Instant) -> Option<Override> {
        if let Latch::Retreating { from: f, until } = self.latch
            && f == from
            && now < until
        {
            return None;
        }
        let duration = self.cfg.reset_duration;
        self.latch = Latch::Retreating {
            from,
            until: now + duration,
        };
        let direction = match from {
            SwitchId::Left => Direction::Right,
            SwitchId::Right => Direction::Left,
        };
        Some(Override::Retreat {
            direction,
            duration,
        })
    }
}

/// Background thread polling the switches and feeding the coordinator.
pub struct InterlockMonitor {
    worker: Worker,
}

impl InterlockMonitor {
    pub fn spawn<S>(
        mut switches: S,
        mut interlock: SafetyInterlock,
        coordinator: Coordinator,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self>
    where
        S: LimitSwitches + Send + 'static,
    {
        let poll = interlock.cfg.poll.max(Duration::from_millis(1));
        let worker = Worker::spawn("interlock", move |stop| {
            let mut last_raw = LimitSwitchState::RELEASED;
            let mut read_failing = false;
            loop {
                if stop.load(Ordering::Acquire) || coordinator.is_shutdown() {
                    break;
                }
                match read_both(&mut switches) {
                    Ok(raw) => {
                        if read_failing {
                            tracing::info!("limit switch reads recovered");
                            read_failing = false;
                        }
                        last_raw = raw;
                    }
                    Err(e) => {
                        // keep the previous reading; a failing line must not look released
                        if !read_failing {
                            tracing::warn!(error = %e, "limit switch read failed");
                            read_failing = true;
                        }
                    }
                }
                let ov = interlock.poll(last_raw, clock.now());
                coordinator.apply_interlock(interlock.engaged(), ov);

                if stop.load(Ordering::Acquire) {
                    break;
                }
                clock.sleep(poll);
            }
        })?;
        Ok(Self { worker })
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop polling; waits at most `timeout` for the thread to exit.
    pub fn shutdown(mut self, timeout: Duration) -> std::result::Result<(), PanError> {
        self.worker.join_within(timeout)
    }
}

fn read_both<S: LimitSwitches>(switches: &mut S) -> std::result::Result<LimitSwitchState, PanError> {
    let left = switches
        .read_switch(SwitchId::Left)
        .map_err(|e| map_hw_error(&*e))?;
    let right = switches
        .read_switch(SwitchId::Right)
        .map_err(|e| map_hw_error(&*e))?;
    Ok(LimitSwitchState { left, right })
}
