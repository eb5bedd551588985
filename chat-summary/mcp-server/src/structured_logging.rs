//! Logging setup for the chat summary server
//!
//! stdout carries the MCP protocol, so logs go to stderr (filtered by `RUST_LOG`)
//! or, with `--dev-log`, to a DEBUG-level log file.

use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::Options;
use crate::constants;

/// Initialize tracing. Hold the returned guard until shutdown so buffered
/// file output is flushed.
pub fn init_component_tracing(
    options: &Options,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if options.dev_log {
        use std::fs::OpenOptions;
        use tracing_appender::non_blocking;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(constants::dev_log_path())?;

        let (file_writer, guard) = non_blocking(file);

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
            )
            .try_init()?;

        eprintln!(
            "Development logging enabled - writing to {} (PID: {})",
            constants::dev_log_path(),
            std::process::id()
        );

        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(tracing_subscriber::EnvFilter::from_default_env()),
            )
            .try_init()?;

        Ok(None)
    }
}
