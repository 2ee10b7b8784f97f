//! Logging initialization for the client.
//!
//! Thin wrapper over the observability crate so binaries configure logging
//! in one call.

use std::path::PathBuf;

use observability::LogConfig;

const SERVICE_NAME: &str = "waypost";

/// Initialize the logging system.
///
/// This sets up tracing with:
/// - Log level from RUST_LOG env var or the provided default
/// - Compact output on stderr
/// - Redacted JSONL at `log_path` when given
///
/// # Example
///
/// ```ignore
/// init_logging("info", Some(paths.log_file()));
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
