use anyhow::{Result, anyhow};
use drillscope_config::LoggingConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

/// `RUST_LOG` wins over the workspace `[logging].filter`.
pub fn resolve_filter(config: &LoggingConfig, env_filter: Option<&str>) -> String {
    env_filter
        .map(str::trim)
        .filter(|filter| !filter.is_empty())
        .unwrap_or(config.filter.as_str())
        .to_owned()
}

/// Installs the global subscriber. Logs go to stderr so stdout stays
/// parseable.
pub fn init_logging(config: &LoggingConfig, format: LogFormat) -> Result<()> {
    let env_filter = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(config, env_filter.as_deref());
    let filter_layer = EnvFilter::try_new(&filter)
        .map_err(|err| anyhow!("invalid log filter '{filter}': {err}"))?;

    let registry = tracing_subscriber::registry().with(filter_layer);
    let installed = match format {
        LogFormat::Human => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
