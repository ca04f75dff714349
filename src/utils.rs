use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install a process-wide `tracing` subscriber printing to stderr, filtered
/// by `RUST_LOG` with a default of `info`. Fails when a subscriber is
/// already installed.
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;

    Ok(())
}
