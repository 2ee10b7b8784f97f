//! CLI command implementations.

mod auth;
mod request;

pub use auth::{login, logout, refresh, status};
pub use request::request;

use anyhow::{Context, Result};
use api_session::{ApiClient, ClassifiedError, ErrorKind, SessionEvent};
use client_config::{Config, Paths};
use credential_storage::create_file_vault;

/// Everything a command needs: the loaded config and a client over the
/// persisted session.
pub struct CommandContext {
    pub config: Config,
    pub client: ApiClient,
}

impl CommandContext {
    pub fn load(paths: &Paths, config: Config) -> Result<Self> {
        let vault = create_file_vault(paths.credentials_file())
            .context("Failed to open credential store")?;
        let client = ApiClient::from_config(&config, vault).context("Failed to build API client")?;

        client.subscribe(|event| {
            if *event == SessionEvent::Ended {
                eprintln!("Your session has ended. Run 'waypost login' to sign in again.");
            }
        });

        Ok(Self { config, client })
    }
}

/// Turn a classified API error into a user-facing message.
fn describe(err: ClassifiedError) -> anyhow::Error {
    let mut message = match err.kind() {
        ErrorKind::InvalidCredentials => format!("Login failed: {}", err.message()),
        ErrorKind::SessionExpired => format!("{}. Run 'waypost login'", err.message()),
        _ => format!("{} ({})", err.message(), err.kind()),
    };

    if let Some(retry_after) = err.retry_after() {
        message.push_str(&format!(", retry in {}s", retry_after.as_secs()));
    }
    for field_error in err.field_errors() {
        message.push_str(&format!("\n  {}: {}", field_error.field, field_error.message));
    }

    anyhow::anyhow!(message)
}
