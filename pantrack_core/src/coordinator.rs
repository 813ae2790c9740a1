//! Single owner of the motor state.
//!
//! Every transition of `MotorState` happens here, under one lock. The tracking
//! path (`submit`) and the safety path (`apply_override`/`apply_interlock`)
//! race for it; safety always wins because tracking submissions are refused
//! while an override is active, a fault is latched or a switch is engaged.
//!
//! The pulse loop reads the state through `next_motion` at every half-period
//! and parks on the condition variable while idle.
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pantrack_traits::Clock;

use crate::config::{InterlockCfg, PulseCfg};
use crate::status::{InterlockStatus, StatusSnapshot};
use crate::types::{Direction, LimitSwitchState, MotorCommand, MotorState, Observation, Override};
use crate::util::{duration_ms, reset_half_period, tracking_half_period};

/// Outcome of a tracking submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The motor state changed.
    Applied,
    /// Already in the requested state.
    Unchanged,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ShuttingDown,
    /// Both limit switches pressed
    Fault,
    /// A timed retreat is in progress
    OverrideActive,
    /// A limit switch reads pressed
    SwitchEngaged,
}

/// What the pulse loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Drive {
        direction: Direction,
        half_period: Duration,
    },
    Idle,
    Exit,
}

#[derive(Debug, Default)]
struct ControlState {
    motor: MotorState,
    /// Half-period of the current tracking command
    half_period: Duration,
    interlock: InterlockStatus,
    switches: LimitSwitchState,
    last_observation: Observation,
    commands_applied: u64,
    commands_rejected: u64,
    interlock_trips: u64,
    faults: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<ControlState>,
    wake: Condvar,
    pulse: PulseCfg,
    end_reset_on_release: bool,
    clock: Arc<dyn Clock + Send + Sync>,
}

#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

impl Coordinator {
    pub fn new(
        pulse: PulseCfg,
        interlock: &InterlockCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControlState::default()),
                wake: Condvar::new(),
                pulse,
                end_reset_on_release: interlock.end_reset_on_release,
                clock,
            }),
        }
    }

    /// Tracking path. `None` asks the motor to stop.
    pub fn submit(&self, command: Option<MotorCommand>) -> Submission {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        self.expire(&mut st, now);

        let outcome = self.decide(&mut st, command);
        match outcome {
            Submission::Applied => {
                st.commands_applied += 1;
                self.shared.wake.notify_all();
            }
            Submission::Rejected(reason) => {
                st.commands_rejected += 1;
                tracing::trace!(?reason, ?command, "tracking command rejected");
            }
            Submission::Unchanged => {}
        }
        outcome
    }

    fn decide(&self, st: &mut ControlState, command: Option<MotorCommand>) -> Submission {
        if st.shutdown {
            return Submission::Rejected(RejectReason::ShuttingDown);
        }
        if st.interlock == InterlockStatus::Fault {
            return Submission::Rejected(RejectReason::Fault);
        }
        if st.motor.is_resetting() {
            return Submission::Rejected(RejectReason::OverrideActive);
        }
        match command {
            None => {
                if st.motor.is_running() {
                    st.motor = MotorState::Idle;
                    tracing::debug!("motor stopped");
                    Submission::Applied
                } else {
                    Submission::Unchanged
                }
            }
            Some(cmd) => {
                if st.switches.any_pressed() {
                    return Submission::Rejected(RejectReason::SwitchEngaged);
                }
                let half = tracking_half_period(cmd.magnitude, &self.shared.pulse);
                if st.motor == MotorState::Running(cmd.direction) && st.half_period == half {
                    return Submission::Unchanged;
                }
                if st.motor != MotorState::Running(cmd.direction) {
                    tracing::debug!(direction = %cmd.direction, magnitude = cmd.magnitude, "motor running");
                }
                st.motor = MotorState::Running(cmd.direction);
                st.half_period = half;
                Submission::Applied
            }
        }
    }

    /// Stop tracking motion; equivalent to `submit(None)`.
    pub fn stop(&self) -> Submission {
        self.submit(None)
    }

    /// Safety path: apply one override. Never refused.
    pub fn apply_override(&self, ov: Override) {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        self.expire(&mut st, now);
        self.apply_locked(&mut st, ov);
    }

    /// Safety path from the interlock monitor: record the engaged switch
    /// levels and apply the override produced by this poll, if any. A running
    /// motor is stopped as soon as any switch reads pressed.
    pub fn apply_interlock(&self, switches: LimitSwitchState, ov: Option<Override>) {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        st.switches = switches;
        self.expire(&mut st, now);
        if let Some(ov) = ov {
            self.apply_locked(&mut st, ov);
        }
        if st.motor.is_running() && switches.any_pressed() {
            st.motor = MotorState::Idle;
            tracing::warn!("limit switch pressed while tracking; motor stopped");
            self.shared.wake.notify_all();
        }
    }

    fn apply_locked(&self, st: &mut ControlState, ov: Override) {
        if st.shutdown {
            return;
        }
        match ov {
            Override::Retreat {
                direction,
                duration,
            } => {
                st.motor = MotorState::Resetting(direction, self.shared.clock.deadline_after(duration));
                st.interlock = InterlockStatus::Retreating(direction);
                st.interlock_trips += 1;
                tracing::warn!(
                    %direction,
                    reset_ms = duration_ms(duration),
                    "limit switch engaged; retreating"
                );
            }
            Override::Fault => {
                st.motor = MotorState::Idle;
                st.interlock = InterlockStatus::Fault;
                st.faults += 1;
                tracing::error!(
                    faults = st.faults,
                    "both limit switches pressed; motor held idle"
                );
            }
            Override::Cleared => match st.interlock {
                InterlockStatus::Fault => {
                    st.interlock = InterlockStatus::Clear;
                    tracing::info!("limit switch fault cleared");
                }
                InterlockStatus::Retreating(_) if self.shared.end_reset_on_release => {
                    st.motor = MotorState::Idle;
                    st.interlock = InterlockStatus::Clear;
                    tracing::info!("limit switches released; retreat ended early");
                }
                _ => {}
            },
        }
        self.shared.wake.notify_all();
    }

    /// End a retreat whose deadline has passed.
    fn expire(&self, st: &mut ControlState, now: Instant) {
        if let MotorState::Resetting(_, deadline) = st.motor
            && now >= deadline
        {
            st.motor = MotorState::Idle;
            if matches!(st.interlock, InterlockStatus::Retreating(_)) {
                st.interlock = InterlockStatus::Clear;
            }
            tracing::info!("retreat finished");
        }
    }

    fn motion_of(&self, st: &ControlState) -> Motion {
        if st.shutdown {
            return Motion::Exit;
        }
        match st.motor {
            MotorState::Idle => Motion::Idle,
            MotorState::Running(direction) => Motion::Drive {
                direction,
                half_period: st.half_period,
            },
            MotorState::Resetting(direction, _) => Motion::Drive {
                direction,
                half_period: reset_half_period(&self.shared.pulse),
            },
        }
    }

    /// Pulse loop: what to drive for the next half-period.
    pub fn next_motion(&self) -> Motion {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        self.expire(&mut st, now);
        self.motion_of(&st)
    }

    /// Like `next_motion`, but parks up to `timeout` while the motor is idle.
    pub fn wait_for_motion(&self, timeout: Duration) -> Motion {
        let mut st = self.shared.state.lock();
        self.expire(&mut st, self.shared.clock.now());
        if self.motion_of(&st) == Motion::Idle {
            let _ = self.shared.wake.wait_for(&mut st, timeout);
            self.expire(&mut st, self.shared.clock.now());
        }
        self.motion_of(&st)
    }

    /// Force the motor idle and tell the pulse loop to exit.
    pub fn request_shutdown(&self) {
        let mut st = self.shared.state.lock();
        if !st.shutdown {
            st.shutdown = true;
            st.motor = MotorState::Idle;
            tracing::debug!("coordinator shutting down");
        }
        self.shared.wake.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Wake anything parked in `wait_for_motion`.
    pub fn wake(&self) {
        self.shared.wake.notify_all();
    }

    pub fn record_observation(&self, observation: Observation) {
        self.shared.state.lock().last_observation = observation;
    }

    pub fn motor_state(&self) -> MotorState {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        self.expire(&mut st, now);
        st.motor
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.lock();
        self.expire(&mut st, now);
        StatusSnapshot {
            motor: st.motor,
            interlock: st.interlock,
            switches: st.switches,
            last_observation: st.last_observation,
            commands_applied: st.commands_applied,
            commands_rejected: st.commands_rejected,
            interlock_trips: st.interlock_trips,
            faults: st.faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantrack_traits::{ManualClock, SwitchLevel};

    fn coord() -> (Coordinator, ManualClock) {
        let clock = ManualClock::new();
        let c = Coordinator::new(
            PulseCfg::default(),
            &InterlockCfg::default(),
            Arc::new(clock.clone()),
        );
        (c, clock)
    }

    fn right(m: u32) -> Option<MotorCommand> {
        Some(MotorCommand {
            direction: Direction::Right,
            magnitude: m,
        })
    }

    #[test]
    fn start_then_same_command_is_unchanged() {
        let (c, _) = coord();
        assert_eq!(c.submit(right(2)), Submission::Applied);
        assert_eq!(c.submit(right(2)), Submission::Unchanged);
        assert_eq!(c.submit(right(4)), Submission::Applied);
        assert_eq!(
            c.next_motion(),
            Motion::Drive {
                direction: Direction::Right,
                half_period: Duration::from_micros(750)
            }
        );
    }

    #[test]
    fn retreat_expires_at_deadline() {
        let (c, clock) = coord();
        c.submit(right(1));
        c.apply_override(Override::Retreat {
            direction: Direction::Left,
            duration: Duration::from_millis(100),
        });
        assert!(c.motor_state().is_resetting());
        clock.advance(Duration::from_millis(99));
        assert!(c.motor_state().is_resetting());
        clock.advance(Duration::from_millis(1));
        assert_eq!(c.motor_state(), MotorState::Idle);
        assert_eq!(c.snapshot().interlock, InterlockStatus::Clear);
    }

    #[test]
    fn shutdown_exits_pulse_loop() {
        let (c, _) = coord();
        c.submit(right(1));
        c.request_shutdown();
        assert_eq!(c.next_motion(), Motion::Exit);
        assert_eq!(
            c.submit(right(1)),
            Submission::Rejected(RejectReason::ShuttingDown)
        );
    }

    #[test]
    fn pressed_switch_refuses_start() {
        let (c, _) = coord();
        let pressed = LimitSwitchState {
            left: SwitchLevel::Released,
            right: SwitchLevel::Pressed,
        };
        c.apply_interlock(pressed, None);
        assert_eq!(
            c.submit(right(1)),
            Submission::Rejected(RejectReason::SwitchEngaged)
        );
        assert_eq!(c.snapshot().commands_rejected, 1);
    }
}
