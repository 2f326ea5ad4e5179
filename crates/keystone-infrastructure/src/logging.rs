//! Structured logging with tracing
//!
//! Configures the global subscriber from the `log` section of the system
//! configuration. The `KEYSTONE_LOG` environment variable takes precedence
//! over the configured level and accepts full `EnvFilter` directives.

use keystone_domain::error::{Error, Result};
use keystone_domain::value_objects::LogConfig;
use tracing::{Level, debug, dispatcher, info};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::constants::{LOG_DEFAULT_FILE_PREFIX, LOG_ENV_FILTER};

/// Initialize logging with the provided configuration
///
/// Fails with [`Error::Configuration`] for an unknown level. A global
/// subscriber installed earlier (by a previous call or by the host process)
/// is kept and the call succeeds.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    if dispatcher::has_been_set() {
        debug!("Log subscriber already installed, keeping it");
        return Ok(());
    }
    let filter =
        EnvFilter::try_from_env(LOG_ENV_FILTER).unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_appender = config.file.as_ref().map(|file| {
        let prefix = if file.name.is_empty() {
            LOG_DEFAULT_FILE_PREFIX
        } else {
            file.name.as_str()
        };
        let dir = if file.path.is_empty() { "." } else { file.path.as_str() };
        tracing_appender::rolling::daily(dir, prefix)
    });

    // Layer types differ between JSON and text output
    let installed = if config.json {
        let stdout = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);
        let registry = Registry::default().with(filter);
        if let Some(appender) = file_appender {
            let file = fmt::layer()
                .json()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true);
            registry.with(stdout).with(file).try_init()
        } else {
            registry.with(stdout).try_init()
        }
    } else {
        let stdout = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);
        let registry = Registry::default().with(filter);
        if let Some(appender) = file_appender {
            let file = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true);
            registry.with(stdout).with(file).try_init()
        } else {
            registry.with(stdout).try_init()
        }
    };
    match installed {
        Ok(()) => info!("Logging initialized with level: {}", level),
        // Lost a race with another installer
        Err(e) => debug!(error = %e, "Log subscriber already installed, keeping it"),
    }
    Ok(())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::configuration(format!(
            "Invalid log level: {level}. Use trace, debug, info, warn, or error"
        ))),
    }
}
