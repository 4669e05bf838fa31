//! Tracing subscriber setup for the `notex` binary.
//!
//! Logs go to stderr so stdout stays parseable for scripts. The level comes
//! from `--log-level`, then `RUST_LOG`, then defaults to `warn`. ANSI colors
//! are used only when stderr is a terminal.

use anyhow::{bail, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Parse a level name such as `info` or `WARN`.
pub fn parse_level(s: &str) -> Result<Level> {
    match s.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        other => bail!("Unknown log level: '{}'", other),
    }
}

/// Install the global subscriber.
pub fn init(cli_level: Option<&str>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::default().add_directive(parse_level(level)?.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
