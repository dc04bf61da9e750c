//! Diagnostic logging.
//!
//! Library code logs through `tracing` macros. The binary installs a
//! `tracing-subscriber` fmt layer writing to stderr, so stdout stays reserved
//! for the build report printed by [`output`](crate::output).
//!
//! The level comes from `RUST_LOG` when set, otherwise from the `--log-level`
//! flag (default `warn`). Module filters work as usual:
//! `RUST_LOG=mediaforge::plan=debug`.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Build the filter: `RUST_LOG` wins over the CLI level.
pub fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Install the global subscriber. Call once, from `main`.
pub fn init(level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
