//!
//! src/logging.rs
//!
//! Initializes logger. Logs go to stderr or a file under LOG_DIR so the
//! session output on stdout stays readable
//!
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::ClientError;

pub struct LoggingGuard(tracing_appender::non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, ClientError> {
    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            non_blocking(tracing_appender::rolling::never(dir, "tune-sub.log"))
        },
        None => non_blocking(std::io::stderr())
    };

    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let time = fmt::time::UtcTime::rfc_3339();
    let base = fmt::layer()
        .with_writer(writer)
        .with_timer(time)
        .with_ansi(cfg.with_ansi)
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line);

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(base.json().flatten_event(true).with_current_span(true).with_span_list(true))
            .try_init(),
        LogFormat::Pretty => registry.with(base.compact()).try_init()
    };

    installed.map_err(|e| ClientError::Config(format!("logger init: {e}")))?;
    Ok( LoggingGuard(guard) )
}
