//! Tracing subscriber setup for the console.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `--log-filter` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber, writing to stderr.
///
/// `directive` wins over `RUST_LOG`, which wins over [`DEFAULT_FILTER`].
pub fn init(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter {directive:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
