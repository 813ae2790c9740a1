//! Shape of the `--json` output: one summary object on success, one error
//! object on failure, both on stdout.
use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        r#"
[pins]
motor_step = 13
motor_dir = 19
limit_left = 20
limit_right = 21

[camera]
width = 64
height = 48
fps = 100

[mask]
min_area = 20
"#,
    )
    .unwrap();
    path
}

fn last_json_line(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON line in stdout: {text}"));
    serde_json::from_str(line).unwrap()
}

#[test]
fn summary_schema_is_stable() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir);

    let out = Command::cargo_bin("pantrack_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["track", "--frames", "4", "--stats"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v = last_json_line(&out.stdout);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["reason"], "frame_limit");
    assert_eq!(v["frames"], 4);
    for key in [
        "timestamp",
        "frames_with_target",
        "commands_applied",
        "commands_rejected",
        "interlock_trips",
        "faults",
        "pulses",
        "duration_ms",
    ] {
        assert!(v[key].is_u64(), "{key} missing or not an integer: {v}");
    }
    for key in ["min_us", "avg_us", "max_us", "stdev_us"] {
        assert!(v["latency"][key].is_number(), "latency.{key} missing: {v}");
    }
}

#[test]
fn latency_is_null_without_stats() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir);

    let out = Command::cargo_bin("pantrack_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["track", "--frames", "2"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(last_json_line(&out.stdout)["latency"].is_null());
}

#[test]
fn errors_are_reported_as_json() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir);

    let out = Command::cargo_bin("pantrack_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .env("PANTRACK_SIM_FAIL_AFTER", "1")
        .arg("track")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let v = last_json_line(&out.stdout);
    assert_eq!(v["status"], "error");
    assert_eq!(v["reason"], "Capture");
    assert!(v["message"].as_str().unwrap().contains("capture"));
}
