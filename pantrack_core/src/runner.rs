//! The frame-processing cycle and the tracking run that drives it.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pantrack_traits::{Clock, FrameSource};

use crate::actuator::Actuator;
use crate::config::{RunLimits, Setpoint};
use crate::controller;
use crate::coordinator::{Coordinator, Submission};
use crate::error::{PanError, Result};
use crate::hw_error::map_capture_error;
use crate::interlock::InterlockMonitor;
use crate::localizer::{Localizer, MaskHandle};
use crate::status::{LatencyStats, RunSummary, StatusSnapshot, StopReason};
use crate::types::{MotorCommand, Observation};
use crate::util::duration_ms;

/// Result of one frame-processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub observation: Observation,
    pub command: Option<MotorCommand>,
    pub submission: Submission,
}

/// A running tracker: the caller's thread processes frames while the pulse
/// loop and the interlock monitor run on their own threads.
pub struct PanTracker {
    pub(crate) frames: Box<dyn FrameSource + Send>,
    pub(crate) localizer: Localizer,
    pub(crate) mask: MaskHandle,
    pub(crate) setpoint: Setpoint,
    pub(crate) coordinator: Coordinator,
    pub(crate) actuator: Option<Actuator>,
    pub(crate) monitor: Option<InterlockMonitor>,
    pub(crate) limits: RunLimits,
    pub(crate) join_timeout: Duration,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) frames_seen: u64,
    pub(crate) frames_with_target: u64,
}

impl std::fmt::Debug for PanTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanTracker")
            .field("setpoint", &self.setpoint)
            .field("frames_seen", &self.frames_seen)
            .field("status", &self.coordinator.snapshot())
            .finish_non_exhaustive()
    }
}

impl PanTracker {
    pub fn builder() -> crate::builder::PanTrackerBuilder {
        crate::builder::PanTrackerBuilder::default()
    }

    /// Process one frame: locate, decide, submit.
    ///
    /// A capture failure is returned as `PanError::Capture` and leaves the
    /// motor state untouched; the caller decides whether to stop.
    pub fn step(&mut self) -> Result<Cycle> {
        let frame = self
            .frames
            .next_frame()
            .map_err(|e| eyre::Report::new(map_capture_error(&*e)))?;
        let mask = self.mask.snapshot();
        let observation = self.localizer.locate(&frame, &mask);
        let command = controller::compute(&observation, &self.setpoint);
        let submission = self.coordinator.submit(command);
        self.coordinator.record_observation(observation);

        self.frames_seen += 1;
        if observation.valid {
            self.frames_with_target += 1;
        }
        tracing::trace!(
            frame = self.frames_seen,
            valid = observation.valid,
            x = observation.centroid_x,
            area = observation.area,
            ?command,
            ?submission,
            "cycle"
        );
        Ok(Cycle {
            observation,
            command,
            submission,
        })
    }

    /// Read-only view of the coordinator.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.coordinator.snapshot()
    }

    /// Handle for observing status from another thread while `run` executes.
    pub fn status_handle(&self) -> Coordinator {
        self.coordinator.clone()
    }

    pub fn mask_handle(&self) -> MaskHandle {
        self.mask.clone()
    }

    pub fn setpoint(&self) -> &Setpoint {
        &self.setpoint
    }

    /// Pulses issued by the actuator so far.
    pub fn pulses(&self) -> u64 {
        self.actuator.as_ref().map_or(0, Actuator::pulses)
    }

    /// Run cycles until `shutdown` is raised, a limit is reached or capture
    /// fails. The motor is stopped and the background threads are joined
    /// (bounded) before this returns, on every path.
    pub fn run(mut self, shutdown: &AtomicBool) -> Result<RunSummary> {
        let start = self.clock.now();
        let mut latencies = Vec::new();
        tracing::info!(
            setpoint_x = self.setpoint.x,
            deadband = self.setpoint.deadband,
            max_frames = ?self.limits.max_frames,
            max_run_ms = ?self.limits.max_run.map(duration_ms),
            "tracking started"
        );

        let outcome: Result<StopReason> = loop {
            if shutdown.load(Ordering::Relaxed) {
                break Ok(StopReason::Interrupted);
            }
            if self
                .limits
                .max_frames
                .is_some_and(|max| self.frames_seen >= max)
            {
                break Ok(StopReason::FrameLimit);
            }
            if self
                .limits
                .max_run
                .is_some_and(|max| self.clock.now().saturating_duration_since(start) >= max)
            {
                break Ok(StopReason::TimeLimit);
            }

            let t0 = Instant::now();
            if let Err(e) = self.step() {
                break Err(e);
            }
            if self.limits.collect_latency {
                latencies.push(duration_us(t0.elapsed()));
            }
        };

        let pulses = self.pulses();
        let finished = self.finish();
        let stop_reason = match outcome {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, frames = self.frames_seen, "tracking aborted");
                return Err(e);
            }
        };
        finished.map_err(eyre::Report::new)?;

        let snap = self.coordinator.snapshot();
        let summary = RunSummary {
            frames: self.frames_seen,
            frames_with_target: self.frames_with_target,
            commands_applied: snap.commands_applied,
            commands_rejected: snap.commands_rejected,
            interlock_trips: snap.interlock_trips,
            faults: snap.faults,
            pulses,
            elapsed_ms: self.clock.ms_since(start),
            stop_reason,
            latency: LatencyStats::from_samples(&latencies),
        };
        tracing::info!(
            frames = summary.frames,
            with_target = summary.frames_with_target,
            trips = summary.interlock_trips,
            faults = summary.faults,
            reason = stop_reason.as_str(),
            "tracking finished"
        );
        Ok(summary)
    }

    /// Stop the motor, then stop and join both background threads.
    fn finish(&mut self) -> std::result::Result<(), PanError> {
        self.coordinator.stop();
        self.coordinator.request_shutdown();
        let mut first_err = None;
        if let Some(actuator) = self.actuator.take()
            && let Err(e) = actuator.shutdown(self.join_timeout)
        {
            first_err.get_or_insert(e);
        }
        if let Some(monitor) = self.monitor.take()
            && let Err(e) = monitor.shutdown(self.join_timeout)
        {
            first_err.get_or_insert(e);
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for PanTracker {
    fn drop(&mut self) {
        if self.actuator.is_some() || self.monitor.is_some() {
            let _ = self.finish();
        }
    }
}

fn duration_us(d: Duration) -> u64 {
    d.as_micros().min(u128::from(u64::MAX)) as u64
}
