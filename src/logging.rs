//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. When the config names a log file, every event is also
//! appended to it as a JSON line.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::cli::LogLevel;
use crate::error::WaypostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

pub fn init(level: &LogLevel, format: LogFormat, log_file: Option<&Path>) -> Result<(), WaypostError> {
    subscriber(level, format, log_file)?.init();
    Ok(())
}

/// Build the subscriber without installing it.
pub fn subscriber(
    level: &LogLevel,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<Box<dyn Subscriber + Send + Sync>, WaypostError> {
    let filter = Targets::new().with_default(level.to_tracing_level());

    Ok(match format {
        LogFormat::Json => Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .with(file_layer(log_file)?),
        ),
        LogFormat::Pretty => Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .with(file_layer(log_file)?),
        ),
    })
}

/// JSON lines appended to `path`, typed for whichever stack it joins.
fn file_layer<S>(path: Option<&Path>) -> Result<Option<impl Layer<S> + Send + Sync>, WaypostError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(path) = path else {
        return Ok(None);
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Some(
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Arc::new(file)),
    ))
}
