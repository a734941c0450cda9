//! Log setup shared by every subcommand. Logs go to stderr so stdout stays
//! usable for results.

use anyhow::Context as _;

/// Used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "warn,novelsearch=info";

pub fn init() -> anyhow::Result<()> {
    init_with(DEFAULT_DIRECTIVES)
}

pub fn init_with(default_directives: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directives))
        .with_context(|| format!("build log filter from {default_directives:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
