//! Logging initialization for the CLI entry points.
//!
//! Short-lived commands (`init`, `assemble`) log to stdout only.
//! Actual launches additionally keep a daily-rolling transcript under
//! `~/.trainlaunch/logs/`, since a training run outlives the terminal
//! that started it. `RUST_LOG` overrides the `--log-level` flag.

use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "trainlaunch.log";

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn stdout_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer().with_writer(std::io::stdout).with_target(false)
}

/// Stdout-only logging for short-lived commands.
pub fn init_simple_logging(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(level_filter(level))
        .with(stdout_layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

/// Logging for launches: stdout plus a daily-rolling file so the run
/// transcript survives after the session ends.
///
/// `log_dir` defaults to `~/.trainlaunch/logs` and is created if
/// missing. The file layer keeps targets and span close/enter events
/// for post-mortem reading; the stdout layer stays terse.
pub fn init_production_logging(level: &str, log_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trainlaunch")
            .join("logs")
    });
    std::fs::create_dir_all(&log_dir)?;

    let file_layer = fmt::layer()
        .with_writer(rolling::daily(&log_dir, LOG_FILE))
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(level_filter(level))
        .with(file_layer)
        .with(stdout_layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %level,
        "Launch logging initialized"
    );
    Ok(())
}
