//! Maps raw responses to the error taxonomy.
//!
//! The backend speaks two error envelopes. The canonical one nests
//! everything under `error`:
//!
//! ```json
//! {"error": {"code": "validation_failed", "message": "...", "details": [{"field": "email", "message": "..."}]}}
//! ```
//!
//! Older endpoints still answer with a flat body:
//!
//! ```json
//! {"message": "...", "error_code": "...", "errors": {"email": ["..."]}}
//! ```
//!
//! Both are accepted. A body matching neither still classifies; only the
//! message falls back to a generic one.

use crate::backend::EndpointKind;
use crate::error::{ClassifiedError, ErrorKind, Failure, FieldError};
use crate::transport::HttpResponse;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// What the dispatcher should do with a response.
#[derive(Debug)]
pub(crate) enum Disposition {
    Success,
    /// 401 on a protected endpoint that has not been retried yet.
    RenewalEligible,
    Failed(ClassifiedError),
}

/// Fields extracted from an error body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: Option<String>,
    pub message: Option<String>,
    pub field_errors: Vec<FieldError>,
}

pub(crate) fn classify_response(
    endpoint: EndpointKind,
    retried: bool,
    response: &HttpResponse,
) -> Disposition {
    if response.is_success() {
        return Disposition::Success;
    }

    let status = response.status;
    if status == 401 && endpoint == EndpointKind::Protected && !retried {
        return Disposition::RenewalEligible;
    }

    let envelope = parse_error_envelope(&response.body);
    let source = if status == 401 && retried {
        Failure::RejectedAfterRenewal { status }
    } else {
        Failure::Status {
            status,
            body: response.body.clone(),
        }
    };

    let error = match status {
        401 if endpoint.is_sign_in() => ClassifiedError::new(
            ErrorKind::InvalidCredentials,
            envelope
                .message
                .clone()
                .unwrap_or_else(|| "Invalid email or password".to_string()),
        ),
        401 if endpoint != EndpointKind::External => ClassifiedError::new(
            ErrorKind::SessionExpired,
            envelope
                .message
                .clone()
                .unwrap_or_else(|| "Session expired, please sign in again".to_string()),
        ),
        429 => ClassifiedError::new(
            ErrorKind::TooManyRequests,
            envelope
                .message
                .clone()
                .unwrap_or_else(|| "Too many requests, please try again later".to_string()),
        )
        .with_retry_after(
            response
                .header("retry-after")
                .and_then(|value| parse_retry_after(value, Utc::now())),
        ),
        422 => ClassifiedError::new(
            ErrorKind::ValidationError,
            envelope
                .message
                .clone()
                .unwrap_or_else(|| "The request could not be validated".to_string()),
        )
        .with_field_errors(envelope.field_errors.clone()),
        _ => ClassifiedError::new(
            ErrorKind::UnknownError,
            envelope
                .message
                .clone()
                .unwrap_or_else(|| format!("Request failed with HTTP {}", status)),
        ),
    };

    Disposition::Failed(
        error
            .with_status(status)
            .with_code(envelope.code)
            .with_source(source),
    )
}

/// Extract code, message and field errors from either envelope shape.
pub fn parse_error_envelope(body: &str) -> ErrorEnvelope {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return ErrorEnvelope::default();
    };

    match value.get("error") {
        Some(nested @ Value::Object(_)) => ErrorEnvelope {
            code: string_field(nested, "code"),
            message: string_field(nested, "message"),
            field_errors: nested
                .get("details")
                .map(field_errors_from)
                .unwrap_or_default(),
        },
        flat_error => ErrorEnvelope {
            code: string_field(&value, "error_code").or_else(|| string_field(&value, "code")),
            message: string_field(&value, "message")
                .or_else(|| string_field(&value, "detail"))
                .or_else(|| flat_error.and_then(Value::as_str).map(str::to_string)),
            field_errors: value
                .get("errors")
                .map(field_errors_from)
                .unwrap_or_default(),
        },
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts `[{"field", "message"}]`, `{"field": "msg"}` or `{"field": ["msg", ...]}`.
fn field_errors_from(details: &Value) -> Vec<FieldError> {
    match details {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let field = string_field(item, "field")?;
                let message = string_field(item, "message").unwrap_or_default();
                Some(FieldError::new(field, message))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(field, messages)| match messages {
                Value::String(message) => vec![FieldError::new(field, message)],
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|message| FieldError::new(field, message))
                    .collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn failed(endpoint: EndpointKind, retried: bool, response: HttpResponse) -> ClassifiedError {
        match classify_response(endpoint, retried, &response) {
            Disposition::Failed(err) => err,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_success_and_renewal_eligible() {
        assert!(matches!(
            classify_response(EndpointKind::Protected, false, &HttpResponse::new(200, "{}")),
            Disposition::Success
        ));
        assert!(matches!(
            classify_response(EndpointKind::Protected, false, &HttpResponse::new(401, "")),
            Disposition::RenewalEligible
        ));
    }

    #[test]
    fn test_401_on_sign_in_is_invalid_credentials() {
        let body = r#"{"error": {"code": "bad_login", "message": "Wrong password"}}"#;
        let err = failed(EndpointKind::Login, false, HttpResponse::new(401, body));
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(err.message(), "Wrong password");
        assert_eq!(err.code(), Some("bad_login"));

        let err = failed(EndpointKind::Register, false, HttpResponse::new(401, ""));
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_401_after_retry_is_session_expired() {
        let err = failed(EndpointKind::Protected, true, HttpResponse::new(401, ""));
        assert_eq!(err.kind(), ErrorKind::SessionExpired);
        assert!(matches!(
            err.failure(),
            Some(Failure::RejectedAfterRenewal { status: 401 })
        ));

        let err = failed(EndpointKind::Renewal, false, HttpResponse::new(401, ""));
        assert_eq!(err.kind(), ErrorKind::SessionExpired);
    }

    #[test]
    fn test_401_from_other_origin_is_unknown() {
        let err = failed(EndpointKind::External, false, HttpResponse::new(401, ""));
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_429_with_retry_after() {
        let response = HttpResponse::new(429, r#"{"message": "Slow down"}"#)
            .with_header("Retry-After", "30");
        let err = failed(EndpointKind::Protected, false, response);
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(err.message(), "Slow down");

        // 429 on an excluded endpoint is still rate limiting
        let err = failed(EndpointKind::Login, false, HttpResponse::new(429, ""));
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert!(err.retry_after().is_none());
    }

    #[test]
    fn test_422_canonical_details() {
        let body = r#"{"error": {"code": "validation_failed", "message": "Invalid input",
            "details": [{"field": "email", "message": "is taken"}, {"field": "name", "message": "too short"}]}}"#;
        let err = failed(EndpointKind::Register, false, HttpResponse::new(422, body));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.code(), Some("validation_failed"));
        assert_eq!(
            err.field_errors(),
            &[
                FieldError::new("email", "is taken"),
                FieldError::new("name", "too short")
            ]
        );
    }

    #[test]
    fn test_422_flat_shape() {
        let body = r#"{"message": "Invalid input", "error_code": "E422",
            "errors": {"email": ["is taken", "is invalid"], "password": "too short"}}"#;
        let err = failed(EndpointKind::Protected, false, HttpResponse::new(422, body));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.code(), Some("E422"));
        assert_eq!(err.message(), "Invalid input");
        assert_eq!(err.field_errors().len(), 3);
        assert!(err
            .field_errors()
            .contains(&FieldError::new("password", "too short")));
    }

    #[test]
    fn test_other_statuses_are_unknown() {
        let err = failed(EndpointKind::Protected, false, HttpResponse::new(503, "<html>"));
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.message(), "Request failed with HTTP 503");

        let err = failed(
            EndpointKind::Protected,
            false,
            HttpResponse::new(403, r#"{"error": "Forbidden"}"#),
        );
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.message(), "Forbidden");
    }

    #[test]
    fn test_parse_retry_after() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_envelope_of_garbage() {
        assert_eq!(parse_error_envelope(""), ErrorEnvelope::default());
        assert_eq!(parse_error_envelope("[1,2]"), ErrorEnvelope::default());
    }
}
