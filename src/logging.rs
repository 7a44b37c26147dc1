use anyhow::{anyhow, Context, Error};
use log::LevelFilter;
use tracing_subscriber::filter::LevelFilter as TracingLevel;

/// Output format of the stderr logger.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn tracing_level(verbosity: LevelFilter) -> TracingLevel {
    match verbosity {
        LevelFilter::Off => TracingLevel::OFF,
        LevelFilter::Error => TracingLevel::ERROR,
        LevelFilter::Warn => TracingLevel::WARN,
        LevelFilter::Info => TracingLevel::INFO,
        LevelFilter::Debug => TracingLevel::DEBUG,
        LevelFilter::Trace => TracingLevel::TRACE,
    }
}

/// Installs the global subscriber. `log` records from the tool wrappers are
/// forwarded to it, so both facades end up on stderr.
///
/// `debug` overrides `verbosity` and enables every level.
pub fn init(verbosity: LevelFilter, debug: bool, format: LogFormat) -> Result<(), Error> {
    let level = if debug {
        TracingLevel::TRACE
    } else {
        tracing_level(verbosity)
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.without_time().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!(e))
    .context("Logger already registered")
}
