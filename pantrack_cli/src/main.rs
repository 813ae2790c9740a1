//! pantrack: vision-guided pan tracker CLI.

mod cli;
mod error_fmt;
mod rt;
mod track;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::rt::RtOpts;
use crate::track::{TrackOpts, print_summary, run_track, self_check, unix_ms};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_logging(&cli, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .wrap_err("install ctrl-c handler")?;
    }

    match cli.cmd {
        Commands::Track {
            frames,
            max_run_ms,
            frames_from,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
            stats,
        } => {
            let opts = TrackOpts {
                frames,
                max_run_ms,
                frames_from,
                rt: rt.then_some(RtOpts {
                    prio: rt_prio,
                    lock: rt_lock,
                    cpu: rt_cpu,
                }),
                stats,
            };
            tracing::info!(config = %cli.config.display(), "starting tracker");
            let summary = run_track(&cfg, &opts, &shutdown)?;
            print_summary(&summary, cli.json);
            if summary.faults > 0 {
                return Err(eyre::Report::new(pantrack_core::PanError::InterlockFault));
            }
        }
        Commands::SelfCheck => {
            let report = self_check(&cfg)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "timestamp": unix_ms(), "detail": report })
                );
            } else {
                println!("{report}");
            }
        }
        Commands::Health => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "timestamp": unix_ms() })
                );
            } else {
                println!("ok");
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<pantrack_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = pantrack_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console layer on stderr (stdout carries summaries), plus an optional
/// JSON file layer when `logging.file` is set.
fn init_logging(cli: &Cli, log: &pantrack_config::Logging) -> eyre::Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| log.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&level))
            .wrap_err_with(|| format!("invalid log level {level:?}"))
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if cli.json {
        layers.push(console.json().with_filter(filter()?).boxed());
    } else {
        layers.push(console.with_filter(filter()?).boxed());
    }

    if let Some(file) = &log.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match log.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter()?)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
