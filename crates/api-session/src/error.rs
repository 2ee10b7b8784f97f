//! Error taxonomy surfaced to callers.
//!
//! Every failed call produces exactly one [`ClassifiedError`]. Its
//! [`ErrorKind`] is the stable part callers branch on; the nested
//! [`Failure`] keeps the raw cause for logs and diagnostics.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Stable classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Login or registration rejected the supplied credentials. Never retried.
    InvalidCredentials,
    /// Renewal failed or was impossible; the user must sign in again.
    SessionExpired,
    /// The backend is rate limiting this client.
    TooManyRequests,
    /// The backend rejected the request payload.
    ValidationError,
    /// Anything else: transport failures, unexpected statuses, bad bodies.
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Transport-level failure: the request never produced an HTTP status.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Timed out waiting for the backend
    #[error("Request timed out")]
    Timeout,

    /// Could not reach the backend
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

/// The raw cause a [`ClassifiedError`] was derived from.
#[derive(Error, Debug)]
pub enum Failure {
    /// No HTTP status was received
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Renewal was needed but no usable renewal credential is held
    #[error("No usable renewal credential")]
    MissingRenewalCredential,

    /// A request was rejected again after a successful renewal
    #[error("Request rejected after credential renewal (HTTP {status})")]
    RejectedAfterRenewal { status: u16 },

    /// The renewal episode ended without delivering an outcome
    #[error("Renewal episode abandoned")]
    RenewalAbandoned,

    /// The user signed out or in again while a renewal was in flight
    #[error("Session changed while renewal was in flight")]
    SessionReplaced,
}

/// A failed call, classified. Immutable once built.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    code: Option<String>,
    retry_after: Option<Duration>,
    field_errors: Vec<FieldError>,
    #[source]
    source: Option<Arc<Failure>>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            retry_after: None,
            field_errors: Vec::new(),
            source: None,
        }
    }

    /// `SESSION_EXPIRED` with the standard message.
    pub fn session_expired(source: Failure) -> Self {
        Self::new(
            ErrorKind::SessionExpired,
            "Session expired, please sign in again",
        )
        .with_source(source)
    }

    /// `UNKNOWN_ERROR` for a request that never got a status.
    pub fn transport(err: TransportError) -> Self {
        Self::new(ErrorKind::UnknownError, err.to_string()).with_source(err.into())
    }

    /// `UNKNOWN_ERROR` for a body that could not be decoded.
    pub fn decode(status: u16, err: serde_json::Error) -> Self {
        Self::new(
            ErrorKind::UnknownError,
            format!("Malformed response body: {}", err),
        )
        .with_status(status)
        .with_source(err.into())
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub(crate) fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub(crate) fn with_field_errors(mut self, field_errors: Vec<FieldError>) -> Self {
        self.field_errors = field_errors;
        self
    }

    pub(crate) fn with_source(mut self, source: Failure) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Backend error code from the error envelope, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// How long the backend asked us to wait (`TOO_MANY_REQUESTS` only).
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Field-level messages (`VALIDATION_ERROR` only).
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// The raw failure this error was classified from.
    pub fn failure(&self) -> Option<&Failure> {
        self.source.as_deref()
    }
}

/// Result type alias using ClassifiedError.
pub type ApiResult<T> = Result<T, ClassifiedError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_display_matches_wire_names() {
        assert_eq!(ErrorKind::InvalidCredentials.to_string(), "INVALID_CREDENTIALS");
        assert_eq!(ErrorKind::SessionExpired.to_string(), "SESSION_EXPIRED");
        assert_eq!(ErrorKind::TooManyRequests.to_string(), "TOO_MANY_REQUESTS");
        assert_eq!(ErrorKind::ValidationError.to_string(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::UnknownError.to_string(), "UNKNOWN_ERROR");
        assert_eq!(
            serde_json::to_string(&ErrorKind::TooManyRequests).unwrap(),
            "\"TOO_MANY_REQUESTS\""
        );
    }

    #[test]
    fn test_session_expired_keeps_source() {
        let err = ClassifiedError::session_expired(Failure::MissingRenewalCredential);
        assert_eq!(err.kind(), ErrorKind::SessionExpired);
        assert!(matches!(
            err.failure(),
            Some(Failure::MissingRenewalCredential)
        ));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("SESSION_EXPIRED: "));
    }

    #[test]
    fn test_clone_shares_failure() {
        let err = ClassifiedError::transport(TransportError::Timeout);
        let copy = err.clone();
        assert_eq!(copy.kind(), ErrorKind::UnknownError);
        assert_eq!(copy.message(), "Request timed out");
        assert!(matches!(
            copy.failure(),
            Some(Failure::Transport(TransportError::Timeout))
        ));
    }
}
