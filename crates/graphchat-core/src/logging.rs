//! File logging setup.
//!
//! Logs go to `$GRAPHCHAT_HOME/logs/graphchat.log.<date>` through a
//! non-blocking writer, never to the terminal the answer streams to.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV: &str = "GRAPHCHAT_LOG";

/// Picks the filter directives: env > `--verbose` > config.
pub fn resolve_filter(env_value: Option<&str>, verbose: bool, config_filter: &str) -> String {
    if let Some(env) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        return env.to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    let trimmed = config_filter.trim();
    if trimmed.is_empty() {
        "warn".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Installs the global subscriber writing to `logs_dir`.
///
/// Returns `None` when logging is disabled in config. Keep the guard alive
/// for the process lifetime so buffered lines get flushed.
///
/// # Errors
/// Returns an error if the log directory cannot be created, the filter is
/// invalid, or a global subscriber is already set.
pub fn init(config: &LoggingConfig, verbose: bool, logs_dir: &Path) -> Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_value = std::env::var(LOG_ENV).ok();
    let directives = resolve_filter(env_value.as_deref(), verbose, &config.filter);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {directives}"))?;

    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
    let appender = tracing_appender::rolling::daily(logs_dir, "graphchat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_wins() {
        assert_eq!(
            resolve_filter(Some("graphchat_core=trace"), true, "warn"),
            "graphchat_core=trace"
        );
    }

    #[test]
    fn test_verbose_beats_config() {
        assert_eq!(resolve_filter(None, true, "warn"), "debug");
        assert_eq!(resolve_filter(Some("  "), false, "info"), "info");
    }

    #[test]
    fn test_blank_config_falls_back_to_warn() {
        assert_eq!(resolve_filter(None, false, ""), "warn");
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            filter: "debug".to_string(),
            enabled: false,
        };
        assert!(init(&config, false, dir.path()).unwrap().is_none());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
