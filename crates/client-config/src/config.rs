//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via WAYPOST_API_BASE_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("WAYPOST_API_BASE_URL") {
    Some(url) => url,
    None => "http://localhost:8000/api",
};

/// Default transport timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_API_BASE_URL: &str = "WAYPOST_API_BASE_URL";
const ENV_TIMEOUT_MS: &str = "WAYPOST_API_TIMEOUT_MS";
const ENV_LOG_LEVEL: &str = "WAYPOST_LOG_LEVEL";

/// Paths of the authentication entry points on the backend.
///
/// Requests to these paths never carry a bearer credential and never
/// trigger credential renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRoutes {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_register_path")]
    pub register: String,
    #[serde(default = "default_refresh_path")]
    pub refresh: String,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_register_path() -> String {
    "/auth/register".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            register: default_register_path(),
            refresh: default_refresh_path(),
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL every request path is resolved against.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Transport timeout for a single HTTP call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Authentication entry points.
    #[serde(default)]
    pub auth_routes: AuthRoutes,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            auth_routes: AuthRoutes::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if any), then apply
    /// environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Blank values are ignored; an unparsable timeout is
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = get(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {}", ENV_TIMEOUT_MS),
            }
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Check the values that would otherwise fail at first use.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;

        if self.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        for (name, path) in [
            ("login", &self.auth_routes.login),
            ("register", &self.auth_routes.register),
            ("refresh", &self.auth_routes.refresh),
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::Config(format!(
                    "auth route '{}' must start with '/': {}",
                    name, path
                )));
            }
        }

        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// Transport timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
