//! Logging setup for MOX home services
//!
//! Library code only emits `tracing` events. Binaries pick how those
//! events are rendered by calling one of the initializers here once at
//! startup.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// How log events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact human readable lines on stderr
    Development,
    /// Pretty output with thread ids and source locations
    Debug,
    /// One JSON object per event, for log collectors
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Install a global subscriber for the given mode
///
/// `MOX_LOG_LEVEL` overrides the default filter, then `RUST_LOG`.
/// Fails if a global subscriber is already installed.
///
/// ```rust,ignore
/// mox_home::logging::init_logging(LoggingMode::Development)?;
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .with(create_env_filter("info")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(create_env_filter("debug")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(create_env_filter("info")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
    }
}

/// Parses a `MOX_LOG_MODE` value, unknown values map to silent
pub fn mode_from_str(value: &str) -> LoggingMode {
    match value.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => LoggingMode::Development,
        "debug" => LoggingMode::Debug,
        "json" => LoggingMode::Json,
        _ => LoggingMode::Silent,
    }
}

/// Initialize logging from `MOX_LOG_MODE`
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("MOX_LOG_MODE")
        .map(|value| mode_from_str(&value))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("MOX_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.clone(),
        reason: e.to_string(),
    })
}

/// Whether a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(mode_from_str("debug"), LoggingMode::Debug);
        assert_eq!(mode_from_str(" JSON "), LoggingMode::Json);
        assert_eq!(mode_from_str("dev"), LoggingMode::Development);
        assert_eq!(mode_from_str("loud"), LoggingMode::Silent);
    }

    #[test]
    fn test_default_filter_is_valid() {
        assert!(create_env_filter("info").is_ok());
    }
}
