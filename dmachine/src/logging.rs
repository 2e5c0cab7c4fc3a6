//! Logging setup for the command-line front end.
//!
//! The library only emits `tracing` events; embedding applications install
//! their own subscriber.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a stderr subscriber. `RUST_LOG` applies unless `verbose` forces debug.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
