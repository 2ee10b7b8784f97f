//! Credential and identity types.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A bearer credential: short-lived access token plus optional renewal token.
///
/// Replaced wholesale on login and renewal, never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential, reading the expiry from the access token's `exp` claim.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        let access_token = access_token.into();
        let expires_at = token_expiry(&access_token);
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Build a credential with an explicitly known expiry.
    pub fn from_parts(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Fall back to a server-supplied lifetime when the token carries no `exp`.
    ///
    /// A lifetime that does not fit in a timestamp leaves the expiry unknown.
    pub fn with_expires_in(mut self, expires_in: Option<i64>) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = expires_in.and_then(expiry_after);
        }
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// An access token with no readable expiry is treated as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The renewal token, unless it is a JWT whose own `exp` has passed.
    ///
    /// Opaque renewal tokens carry no expiry we can check, so the backend
    /// decides.
    pub fn usable_refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.refresh_token.as_deref()?;
        match token_expiry(token) {
            Some(expires_at) if expires_at <= now => None,
            _ => Some(token),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<f64>,
}

fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// Decode the `exp` claim of a JWT without verifying its signature.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload carrying a numeric `exp`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp? as i64, 0)
}

/// The signed-in user as returned by the backend.
///
/// Only `id`, `email` and `name` are interpreted; every other field is kept
/// verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    /// Short label for display and logs.
    pub fn label(&self) -> String {
        self.email
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A grant whose lifetime cannot be turned into an expiry is malformed.
fn lifetime_secs<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = Option::<i64>::deserialize(deserializer)?;
    match seconds {
        Some(secs) if expiry_after(secs).is_none() => Err(serde::de::Error::custom(format!(
            "expires_in out of range: {}",
            secs
        ))),
        _ => Ok(seconds),
    }
}

/// Token payload returned by the login, registration and renewal endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenGrant {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn", deserialize_with = "lifetime_secs")]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<Identity>,
}

impl TokenGrant {
    /// Split into a credential and identity.
    ///
    /// Renewal responses may omit the renewal token; `previous_refresh`
    /// carries the one in use forward in that case.
    pub(crate) fn into_credential(
        self,
        previous_refresh: Option<String>,
    ) -> (Credential, Option<Identity>) {
        let refresh_token = self.refresh_token.or(previous_refresh);
        let credential =
            Credential::new(self.access_token, refresh_token).with_expires_in(self.expires_in);
        (credential, self.user)
    }
}
