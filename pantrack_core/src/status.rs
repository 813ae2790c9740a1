//! Read-only views of the tracker for status and reporting layers.
use crate::types::{Direction, LimitSwitchState, MotorState, Observation};

/// What the safety path is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterlockStatus {
    #[default]
    Clear,
    Retreating(Direction),
    /// Both switches pressed; tracking is refused until released.
    Fault,
}

impl InterlockStatus {
    pub fn name(&self) -> &'static str {
        match self {
            InterlockStatus::Clear => "clear",
            InterlockStatus::Retreating(_) => "retreating",
            InterlockStatus::Fault => "fault",
        }
    }
}

/// Point-in-time copy of the coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub motor: MotorState,
    pub interlock: InterlockStatus,
    pub switches: LimitSwitchState,
    pub last_observation: Observation,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub interlock_trips: u64,
    pub faults: u64,
}

/// Why a tracking run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown flag raised (operator stop)
    Interrupted,
    FrameLimit,
    TimeLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Interrupted => "interrupted",
            StopReason::FrameLimit => "frame_limit",
            StopReason::TimeLimit => "time_limit",
        }
    }
}

/// Per-frame processing latency over a run (microseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: f64,
    pub stdev_us: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let min_us = samples.iter().copied().min().unwrap_or(0);
        let max_us = samples.iter().copied().max().unwrap_or(0);
        let avg_us = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - avg_us;
                d * d
            })
            .sum::<f64>()
            / n;
        Some(Self {
            min_us,
            max_us,
            avg_us,
            stdev_us: var.sqrt(),
        })
    }
}

/// Totals reported when `PanTracker::run` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub frames_with_target: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub interlock_trips: u64,
    pub faults: u64,
    pub pulses: u64,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
    pub latency: Option<LatencyStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_stats() {
        let s = LatencyStats::from_samples(&[10, 20, 30]).expect("samples");
        assert_eq!(s.min_us, 10);
        assert_eq!(s.max_us, 30);
        assert!((s.avg_us - 20.0).abs() < 1e-9);
        assert!((s.stdev_us - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!(LatencyStats::from_samples(&[]).is_none());
    }
}
