//! Configuration, filesystem paths and logging setup for the Waypost client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{AuthRoutes, Config, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_TIMEOUT_MS};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
