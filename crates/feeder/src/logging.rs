//! Subscriber setup

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Build the filter: RUST_LOG when set, the `--log-level` directives otherwise
pub fn env_filter(log_level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level '{}'", log_level)),
    }
}

/// Install the global subscriber; call once from `main`
pub fn init(log_level: &str, json: bool, disable_ansi_color: bool) -> anyhow::Result<()> {
    let filter = env_filter(log_level)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(!disable_ansi_color);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}
