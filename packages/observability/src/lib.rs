//! # Observability
//!
//! Logging initialization for the Waypost crates.
//!
//! Library crates are **log producers** only. They use the standard `tracing`
//! macros and never install a subscriber themselves. The binary calls
//! [`init`] or [`init_with_config`] once at startup and decides where the
//! output goes:
//!
//! - compact human-readable lines on stderr (default)
//! - structured JSONL appended to a file when [`LogConfig::log_path`] is set
//!
//! JSONL output passes every structured field through a redaction pass so
//! bearer credentials, refresh tokens and passwords never land on disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "waypost".into(),
//!         default_level: "debug".into(),
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("client started");
//! }
//! ```

mod file_writer;
mod json_layer;
mod redact;

use std::path::PathBuf;

pub use file_writer::LogFileWriter;
pub use json_layer::{JsonLayer, LogEntry};
pub use redact::redact_value;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "waypost", "waypost-tests").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional JSONL log file. No file output when unset.
    pub log_path: Option<PathBuf>,

    /// Emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Safe to call more than once; only the first subscriber is installed.
/// A log file that cannot be opened downgrades to stderr-only output.
pub fn init_with_config(config: LogConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let env_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let mut file_error = None;
    let json_layer = match config.log_path.as_ref().map(LogFileWriter::new) {
        Some(Ok(writer)) => Some(
            JsonLayer::new(config.service_name.clone(), writer).with_filter(env_filter()),
        ),
        Some(Err(err)) => {
            file_error = Some(err);
            None
        }
        None => None,
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match (&config.log_path, file_error) {
        (Some(path), Some(err)) => tracing::warn!(
            log_path = %path.display(),
            error = %err,
            "log file unavailable, continuing without JSONL output"
        ),
        (Some(path), None) => tracing::debug!(
            log_path = %path.display(),
            service = %config.service_name,
            "observability initialized"
        ),
        _ => {}
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
