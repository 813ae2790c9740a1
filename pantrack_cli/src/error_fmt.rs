//! Human-readable error descriptions and structured JSON error formatting.

use pantrack_core::{BuildError, PanError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingFrames => {
                "What happened: No frame source was provided to the tracker.\nLikely causes: The camera backend failed to open, or no --frames-from stream was given with the hardware build.\nHow to fix: Pass --frames-from FILE (raw RGB24) or check the camera setup.".to_string()
            }
            BuildError::MissingStepper => {
                "What happened: No stepper driver was provided to the tracker.\nLikely causes: Motor pins failed to initialize or were not wired into the builder.\nHow to fix: Check [pins] motor_step/motor_dir and GPIO permissions.".to_string()
            }
            BuildError::MissingSwitches => {
                "What happened: No limit switches were provided to the tracker.\nLikely causes: Switch pins failed to initialize.\nHow to fix: Check [pins] limit_left/limit_right and GPIO permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [control], [pulse] or [interlock].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PanError>() {
        return match pe {
            PanError::Capture(msg) => format!(
                "What happened: Frame capture failed ({msg}).\nLikely causes: Camera disconnected, or the frame stream ended or was truncated.\nHow to fix: Check the camera or the --frames-from file; frames must be camera.width x camera.height RGB24."
            ),
            PanError::InterlockFault => {
                "What happened: Both limit switches read pressed during the run; the motor was held idle.\nLikely causes: Wiring fault, a stuck switch, or wrong interlock.active_low.\nHow to fix: Inspect the switches and wiring before moving the carriage again.".to_string()
            }
            PanError::Hardware(msg) | PanError::HardwareFault(msg) => format!(
                "What happened: Hardware I/O failed ({msg}).\nLikely causes: GPIO line lost or insufficient permissions.\nHow to fix: Check wiring and GPIO access, then restart."
            ),
            PanError::State(msg) => format!(
                "What happened: Tracker entered an unexpected state ({msg}).\nLikely causes: Internal error.\nHow to fix: Re-run with --log-level=debug and report the log."
            ),
            PanError::Shutdown(name, ms) => format!(
                "What happened: The {name} thread did not stop within {ms} ms.\nLikely causes: A driver call blocked during shutdown.\nHow to fix: Check the motor driver; raise actuator.join_timeout_ms if the hardware is slow."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        let cause = err
            .chain()
            .nth(1)
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid or incomplete{cause}.\nLikely causes: Missing [pins] (motor_step, motor_dir, limit_left, limit_right) or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("open motor pins") || lower.contains("open limit switch pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("frame stream") || lower.contains("no frame source") {
        return format!(
            "What happened: Could not open the frame source ({msg}).\nHow to fix: Pass an existing raw RGB24 file to --frames-from, or \"-\" for stdin."
        );
    }

    // Generic fallback
    let chain = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    format!("Something went wrong: {chain}\nHow to fix: Re-run with --log-level=debug for details.")
}

/// Stable exit codes for scripted callers: capture 3, hardware 4, shutdown 5,
/// interlock fault 6, anything else 1 (clap usage errors exit 2).
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<PanError>() {
        Some(PanError::Capture(_)) => 3,
        Some(PanError::Hardware(_) | PanError::HardwareFault(_)) => 4,
        Some(PanError::Shutdown(..)) => 5,
        Some(PanError::InterlockFault) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "InvalidConfig",
            _ => "Build",
        };
    }
    match err.downcast_ref::<PanError>() {
        Some(PanError::Capture(_)) => "Capture",
        Some(PanError::InterlockFault) => "InterlockFault",
        Some(PanError::Hardware(_) | PanError::HardwareFault(_)) => "Hardware",
        Some(PanError::State(_)) => "State",
        Some(PanError::Shutdown(..)) => "Shutdown",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "status": "error",
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}
