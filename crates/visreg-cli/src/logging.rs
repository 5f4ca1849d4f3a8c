//! tracing-subscriber setup

use crate::config::CliConfig;
use tracing_subscriber::EnvFilter;

/// Variable holding an explicit filter directive
pub const LOG_ENV: &str = "VISREG_LOG";

/// Filter from `VISREG_LOG`, then `RUST_LOG`, then the verbosity default
#[must_use]
pub fn env_filter(config: &CliConfig, lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    let directive = lookup(LOG_ENV)
        .or_else(|| lookup("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| config.verbosity.log_filter().to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter {directive:?}: {e}");
        EnvFilter::new(config.verbosity.log_filter())
    })
}

/// Install the global subscriber, writing to stderr
///
/// A second call is a no-op.
pub fn init(config: &CliConfig) {
    let filter = env_filter(config, |name| std::env::var(name).ok());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if config.log_json {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.color.should_color()).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
