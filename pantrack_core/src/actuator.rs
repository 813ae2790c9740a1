//! Step pulse generation.
//!
//! One long-lived thread owns the `StepperDriver`. Each cycle it asks the
//! coordinator what to do, raises the step line for one half-period, lowers it,
//! and asks again before spending the low half. A stop or override is
//! therefore seen within one half-period. While idle the thread parks on the
//! coordinator's condition variable.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use pantrack_traits::{BoxError, Clock, Level, StepperDriver};

use crate::coordinator::{Coordinator, Motion};
use crate::error::{PanError, Result};
use crate::hw_error::map_hw_error;
use crate::types::Direction;
use crate::worker::Worker;

/// Upper bound on one idle park; the stop flag is re-checked after it.
const IDLE_PARK: Duration = Duration::from_millis(50);

pub struct Actuator {
    worker: Worker,
    coordinator: Coordinator,
    pulses: Arc<AtomicU64>,
}

impl Actuator {
    pub fn spawn<D>(
        driver: D,
        coordinator: Coordinator,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self>
    where
        D: StepperDriver + Send + 'static,
    {
        let pulses = Arc::new(AtomicU64::new(0));
        let counter = pulses.clone();
        let coord = coordinator.clone();
        let worker = Worker::spawn("pulse-loop", move |stop| {
            pulse_loop(driver, &coord, &*clock, &stop, &counter);
        })?;
        Ok(Self {
            worker,
            coordinator,
            pulses,
        })
    }

    /// Rising step edges issued so far.
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the pulse loop, waiting at most `timeout` for it to exit.
    pub fn shutdown(mut self, timeout: Duration) -> std::result::Result<(), PanError> {
        self.worker.signal();
        self.coordinator.wake();
        self.worker.join_within(timeout)
    }
}

/// Logs the first failure of a streak and the recovery; everything in between
/// is dropped so a dead line does not flood the log at pulse rate.
#[derive(Default)]
struct WriteHealth {
    failing: bool,
}

impl WriteHealth {
    fn check(&mut self, what: &'static str, res: std::result::Result<(), BoxError>) {
        match res {
            Ok(()) if self.failing => {
                self.failing = false;
                tracing::info!(line = what, "stepper writes recovered");
            }
            Ok(()) => {}
            Err(e) => {
                if !self.failing {
                    self.failing = true;
                    let err = map_hw_error(&*e);
                    tracing::warn!(line = what, error = %err, "stepper write failed");
                }
            }
        }
    }
}

fn pulse_loop<D: StepperDriver>(
    mut driver: D,
    coord: &Coordinator,
    clock: &dyn Clock,
    stop: &AtomicBool,
    pulses: &AtomicU64,
) {
    let mut health = WriteHealth::default();
    let mut current_dir: Option<Direction> = None;

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let (direction, high_half) = match coord.next_motion() {
            Motion::Exit => break,
            Motion::Idle => match coord.wait_for_motion(IDLE_PARK) {
                Motion::Exit => break,
                _ => continue,
            },
            Motion::Drive {
                direction,
                half_period,
            } => (direction, half_period),
        };

        if current_dir != Some(direction) {
            health.check("dir", driver.set_direction(direction));
            current_dir = Some(direction);
            tracing::trace!(%direction, "direction line set");
        }

        health.check("step", driver.set_step(Level::High));
        pulses.fetch_add(1, Ordering::Relaxed);
        clock.sleep(high_half);
        health.check("step", driver.set_step(Level::Low));

        match coord.next_motion() {
            Motion::Drive { half_period, .. } => clock.sleep(half_period),
            Motion::Idle => {}
            Motion::Exit => break,
        }
    }

    health.check("step", driver.set_step(Level::Low));
    tracing::debug!(pulses = pulses.load(Ordering::Relaxed), "pulse loop stopped");
}
