//! Global `tracing` subscriber setup for the binary.

use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

use crate::error::{Error, Result};

/// `verbosity` 0 shows warnings, 1 info, 2 debug, 3 and above trace.
/// `quiet` silences everything.
pub fn setup_logging(verbosity: u8, quiet: bool) -> Result<()> {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))
}
