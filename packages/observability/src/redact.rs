//! Redaction of credential-shaped values before they reach a log sink.

use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";
const MAX_STRING_LEN: usize = 512;

const DENYLIST_KEYS: [&str; 8] = [
    "token",
    "access_token",
    "refresh_token",
    "authorization",
    "cookie",
    "password",
    "secret",
    "api_key",
];

/// Return a copy of `value` with sensitive keys and token-like strings masked.
pub fn redact_value(key: &str, value: &Value) -> Value {
    if is_sensitive_key(key) {
        return Value::String(REDACTED.to_string());
    }

    match value {
        Value::String(s) => redact_string(s),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), redact_value(k, v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_value(key, item))
                .collect::<Vec<_>>(),
        ),
        _ => value.clone(),
    }
}

fn redact_string(raw: &str) -> Value {
    if looks_like_credential(raw) {
        return Value::String(REDACTED.to_string());
    }
    if raw.len() > MAX_STRING_LEN {
        let cut = raw
            .char_indices()
            .map(|(idx, _)| idx)
            .take_while(|idx| *idx <= MAX_STRING_LEN)
            .last()
            .unwrap_or(0);
        return Value::String(format!("{}…[TRUNCATED len={}]", &raw[..cut], raw.len()));
    }
    Value::String(raw.to_string())
}

fn looks_like_credential(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("bearer ") {
        return true;
    }
    // Three dot-separated segments: almost certainly a JWT
    raw.matches('.').count() == 2 && raw.len() > 40 && !raw.contains(' ')
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    DENYLIST_KEYS.iter().any(|entry| lower.contains(entry))
}
