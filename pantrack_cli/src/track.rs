//! Tracking run: config mapping, backend assembly, summary output.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use pantrack_core::{PanTracker, RunLimits, RunSummary};
use pantrack_hardware::RawFrameReader;
use pantrack_traits::{FrameSource, LimitSwitches, StepperDriver};

use crate::rt::{RtOpts, setup_rt_once};

#[derive(Debug, Clone)]
pub struct TrackOpts {
    pub frames: Option<u64>,
    pub max_run_ms: Option<u64>,
    pub frames_from: Option<PathBuf>,
    pub rt: Option<RtOpts>,
    pub stats: bool,
}

type Lines = (
    Box<dyn StepperDriver + Send>,
    Box<dyn LimitSwitches + Send>,
    Option<Box<dyn FrameSource + Send>>,
);

/// Simulated rig sized from `[camera]`, with the target placed right of the
/// setpoint so the loop has something to do. Test hooks:
/// `PANTRACK_SIM_TARGET_X` (world x of the target) and
/// `PANTRACK_SIM_FAIL_AFTER` (camera fails after N frames) and
/// `PANTRACK_SIM_PRESS` (hold `left`, `right` or `both` switches pressed).
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_lines(cfg: &pantrack_config::Config) -> eyre::Result<Lines> {
    use pantrack_hardware::{SimRig, SimRigCfg};
    use pantrack_traits::SwitchId;

    let width = cfg.camera.width;
    let height = cfg.camera.height;
    let default_x = i64::from(cfg.effective_setpoint_x()) + i64::from(width / 4);
    let target_world_x = env_parse("PANTRACK_SIM_TARGET_X")?.unwrap_or(default_x);
    let fail_after_frames = env_parse("PANTRACK_SIM_FAIL_AFTER")?;
    let frame_period = Duration::from_millis(1000 / u64::from(cfg.camera.fps.max(1)));

    let rig = SimRig::new(SimRigCfg {
        width,
        height,
        target_world_x,
        target_y: i64::from(height / 2),
        target_size: (width.min(height) / 6).max(4),
        frame_period,
        fail_after_frames,
        ..SimRigCfg::default()
    });
    match env_parse::<String>("PANTRACK_SIM_PRESS")?.as_deref() {
        None => {}
        Some("left") => rig.force_switch(SwitchId::Left, true),
        Some("right") => rig.force_switch(SwitchId::Right, true),
        Some("both") => {
            rig.force_switch(SwitchId::Left, true);
            rig.force_switch(SwitchId::Right, true);
        }
        Some(other) => eyre::bail!("PANTRACK_SIM_PRESS={other:?}: expected left|right|both"),
    }
    tracing::info!(width, height, target_world_x, "simulated rig");
    Ok((
        Box::new(rig.stepper()),
        Box::new(rig.switches()),
        Some(Box::new(rig.camera())),
    ))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn env_parse<T: std::str::FromStr>(key: &str) -> eyre::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre::eyre!("{key}={v:?}: {e}")),
        Err(_) => Ok(None),
    }
}

/// GPIO stepper and limit switches; frames must come from `--frames-from`.
#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_lines(cfg: &pantrack_config::Config) -> eyre::Result<Lines> {
    use pantrack_hardware::gpio::{GpioLimitSwitches, GpioStepper};

    let p = &cfg.pins;
    let stepper = GpioStepper::try_new(p.motor_step, p.motor_dir, p.motor_en)
        .wrap_err("open motor pins")?;
    let switches =
        GpioLimitSwitches::try_new(p.limit_left, p.limit_right, cfg.interlock.active_low)
            .wrap_err("open limit switch pins")?;
    Ok((Box::new(stepper), Box::new(switches), None))
}

fn open_stream(path: &Path, width: u32, height: u32) -> eyre::Result<Box<dyn FrameSource + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(RawFrameReader::new(io::stdin(), width, height)));
    }
    let file = File::open(path).wrap_err_with(|| format!("open frame stream {}", path.display()))?;
    Ok(Box::new(RawFrameReader::new(
        BufReader::new(file),
        width,
        height,
    )))
}

pub fn run_track(
    cfg: &pantrack_config::Config,
    opts: &TrackOpts,
    shutdown: &AtomicBool,
) -> eyre::Result<RunSummary> {
    if let Some(rt) = opts.rt {
        setup_rt_once(rt);
    }

    let mut limits: RunLimits = (&cfg.runner).into();
    if let Some(n) = opts.frames {
        limits.max_frames = Some(n);
    }
    if let Some(ms) = opts.max_run_ms {
        limits.max_run = Some(Duration::from_millis(ms));
    }
    limits.collect_latency = opts.stats;

    let (stepper, switches, camera) = open_lines(cfg)?;
    let frames = match (&opts.frames_from, camera) {
        (Some(path), _) => open_stream(path, cfg.camera.width, cfg.camera.height)?,
        (None, Some(cam)) => cam,
        (None, None) => eyre::bail!("no frame source: pass --frames-from FILE (raw RGB24)"),
    };

    let tracker = PanTracker::builder()
        .with_config(cfg)
        .with_limits(limits)
        .with_frames(frames)
        .with_stepper(stepper)
        .with_switches(switches)
        .build()?;
    tracker.run(shutdown)
}

/// Open the backends and pull one frame, without starting the tracker.
pub fn self_check(cfg: &pantrack_config::Config) -> eyre::Result<String> {
    let (_stepper, mut switches, camera) = open_lines(cfg)?;
    let left = switches
        .read_switch(pantrack_traits::SwitchId::Left)
        .map_err(|e| eyre::eyre!("read left limit switch: {e}"))?;
    let right = switches
        .read_switch(pantrack_traits::SwitchId::Right)
        .map_err(|e| eyre::eyre!("read right limit switch: {e}"))?;
    let frame = match camera {
        Some(mut cam) => Some(
            cam.next_frame()
                .map_err(|e| eyre::eyre!("capture test frame: {e}"))?,
        ),
        None => None,
    };
    let frame_desc = frame
        .map(|f| format!("{}x{}", f.width(), f.height()))
        .unwrap_or_else(|| "external".to_string());
    Ok(format!(
        "ok: switches left={} right={} frame={frame_desc}",
        level_name(left),
        level_name(right)
    ))
}

fn level_name(l: pantrack_traits::SwitchLevel) -> &'static str {
    if l.is_pressed() { "pressed" } else { "released" }
}

pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

pub fn summary_json(s: &RunSummary) -> serde_json::Value {
    use serde_json::json;
    let latency = s.latency.map(|l| {
        json!({
            "min_us": l.min_us,
            "avg_us": l.avg_us,
            "max_us": l.max_us,
            "stdev_us": l.stdev_us,
        })
    });
    json!({
        "timestamp": unix_ms(),
        "status": if s.faults > 0 { "fault" } else { "ok" },
        "reason": s.stop_reason.as_str(),
        "frames": s.frames,
        "frames_with_target": s.frames_with_target,
        "commands_applied": s.commands_applied,
        "commands_rejected": s.commands_rejected,
        "interlock_trips": s.interlock_trips,
        "faults": s.faults,
        "pulses": s.pulses,
        "duration_ms": s.elapsed_ms,
        "latency": latency,
    })
}

pub fn print_summary(s: &RunSummary, json: bool) {
    if json {
        println!("{}", summary_json(s));
        return;
    }
    println!(
        "tracking stopped ({}): {} frames, {} with target, {} commands applied, {} rejected, {} interlock trips, {} faults, {} pulses in {} ms",
        s.stop_reason.as_str(),
        s.frames,
        s.frames_with_target,
        s.commands_applied,
        s.commands_rejected,
        s.interlock_trips,
        s.faults,
        s.pulses,
        s.elapsed_ms
    );
    if let Some(l) = s.latency {
        eprintln!("\n--- Tracker Stats ---");
        eprintln!("Frames: {}", s.frames);
        eprintln!(
            "Latency min/avg/max/stdev (us): {} / {:.1} / {} / {:.1}",
            l.min_us, l.avg_us, l.max_us, l.stdev_us
        );
        eprintln!("---------------------\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantrack_core::{LatencyStats, StopReason};

    #[test]
    fn json_summary_has_stable_keys() {
        let s = RunSummary {
            frames: 3,
            frames_with_target: 2,
            commands_applied: 1,
            commands_rejected: 0,
            interlock_trips: 0,
            faults: 0,
            pulses: 12,
            elapsed_ms: 40,
            stop_reason: StopReason::FrameLimit,
            latency: LatencyStats::from_samples(&[5, 7]),
        };
        let v = summary_json(&s);
        assert_eq!(v["reason"], "frame_limit");
        assert_eq!(v["status"], "ok");
        assert_eq!(v["frames"], 3);
        assert_eq!(v["latency"]["max_us"], 7);
        assert!(v["timestamp"].as_u64().is_some());

        let faulted = RunSummary { faults: 1, ..s };
        assert_eq!(summary_json(&faulted)["status"], "fault");
    }
}
