//! Authentication commands.

use super::{describe, CommandContext};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

/// Login with email and password.
pub async fn login(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    if let Some(identity) = ctx.client.identity().filter(|_| ctx.client.is_signed_in()) {
        output::print_success(&format!("Already logged in as {}", identity.label()), format);
        return Ok(());
    }

    // Prompt for email
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    // Prompt for password (hidden)
    let password = rpassword::prompt_password("Password: ")?;

    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    let identity = ctx.client.login(&email, &password).await.map_err(describe)?;
    let label = identity.map(|identity| identity.label()).unwrap_or(email);
    output::print_success(&format!("Logged in as {}", label), format);
    Ok(())
}

/// Logout and clear the stored credential.
pub fn logout(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    if !ctx.client.is_signed_in() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    ctx.client.logout();
    output::print_success("Logged out successfully", format);
    Ok(())
}

#[derive(Debug, Serialize)]
struct Status {
    logged_in: bool,
    user: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    expired: bool,
    has_refresh_token: bool,
    api_base_url: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.logged_in {
            return write!(f, "Not logged in ({})", self.api_base_url);
        }

        writeln!(f, "Logged in")?;
        writeln!(f, "{:<10}{}", "User:", self.user.as_deref().unwrap_or("unknown"))?;
        let expiry = match self.expires_at {
            Some(at) if self.expired => format!("{} (expired)", at.to_rfc3339()),
            Some(at) => at.to_rfc3339(),
            None => "unknown".to_string(),
        };
        writeln!(f, "{:<10}{}", "Expires:", expiry)?;
        writeln!(
            f,
            "{:<10}{}",
            "Renewal:",
            if self.has_refresh_token { "available" } else { "none" }
        )?;
        write!(f, "{:<10}{}", "API:", self.api_base_url)
    }
}

/// Show the stored session without touching the network.
pub fn status(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let credential = ctx.client.credential();
    let status = Status {
        logged_in: credential.is_some(),
        user: ctx.client.identity().map(|identity| identity.label()),
        expires_at: credential.as_ref().and_then(|c| c.expires_at()),
        expired: credential.as_ref().map(|c| c.is_expired()).unwrap_or(false),
        has_refresh_token: credential
            .as_ref()
            .and_then(|c| c.usable_refresh_token(Utc::now()))
            .is_some(),
        api_base_url: ctx.config.api_base_url.clone(),
    };

    output::print(&status, format);
    Ok(())
}

/// Renew the access credential now.
pub async fn refresh(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let credential = ctx.client.refresh_now().await.map_err(describe)?;
    let message = match credential.expires_at() {
        Some(at) => format!("Session renewed, valid until {}", at.to_rfc3339()),
        None => "Session renewed".to_string(),
    };
    output::print_success(&message, format);
    Ok(())
}
