//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pantrack", version, about = "Vision-guided pan tracker")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/pantrack.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); RUST_LOG wins, then this, then logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track the target until interrupted (ctrl-c) or a limit is reached
    Track {
        /// Stop after this many frames (overrides runner.max_frames)
        #[arg(long, value_name = "N")]
        frames: Option<u64>,
        /// Stop after this much time in ms (overrides runner.max_run_ms)
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
        /// Read raw RGB24 frames of camera.width x camera.height from FILE ("-" for stdin)
        #[arg(long, value_name = "FILE")]
        frames_from: Option<PathBuf>,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode (Linux).\n\nApplied before the pulse loop and the interlock monitor start, so both inherit it: SCHED_FIFO priority, pinning to one CPU and mlockall. Reduces step timing jitter; usually needs CAP_SYS_NICE / CAP_IPC_LOCK or root."
        )]
        rt: bool,
        /// SCHED_FIFO priority for --rt (clamped to the system range)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Memory locking mode for --rt
        #[arg(long, value_enum, value_name = "MODE", default_value = "current")]
        rt_lock: RtLock,
        /// CPU index to pin to for --rt (default 0)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
        /// Print per-frame processing latency stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Check that the configured backends can be opened
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
