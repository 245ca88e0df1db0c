use anyhow::{Result, anyhow};
use std::env::var;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a subscriber from `RUST_LOG`, if it is set.
///
/// Returns whether logging was initialised.
pub fn from_env() -> Result<bool> {
    if var("RUST_LOG").is_err() {
        return Ok(false);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;
    Ok(true)
}

/// Level filter for a `-v` count
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a subscriber whose level follows the `-v` count.
pub fn from_args(verbosity: u8) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(level_for(verbosity))
        .with_writer(std::io::stderr);

    let result = match verbosity {
        0 | 1 => builder.try_init(),
        2 => builder
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .try_init(),
        _ => builder
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .pretty()
            .try_init(),
    };

    match result {
        Ok(()) => debug!("logging initialised"),
        Err(e) => eprintln!("Failed to initialise logging, continuing with none\n{e}"),
    }
}
