//! Raw authenticated requests.

use super::{describe, CommandContext};
use crate::output::OutputFormat;
use anyhow::{anyhow, Context, Result};
use api_session::{ApiRequest, HttpMethod};
use serde_json::Value;

/// Send one request through the session, renewing the credential if the
/// backend rejects it, and print the response body.
pub async fn request(
    ctx: &CommandContext,
    method: &str,
    path: &str,
    body: Option<&str>,
    query: &[String],
    format: &OutputFormat,
) -> Result<()> {
    let method: HttpMethod = method.parse().map_err(|e: String| anyhow!(e))?;
    let mut request = ApiRequest::new(method, path);

    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Query parameters must look like key=value: {}", pair))?;
        request = request.query(key, value);
    }

    if let Some(raw) = body {
        let json: Value = serde_json::from_str(raw).context("--body must be valid JSON")?;
        request = request.json(json);
    }

    let response = ctx.client.send(request).await.map_err(describe)?;
    tracing::debug!(status = response.status(), "Request completed");

    let text = response.text();
    match (format, serde_json::from_str::<Value>(text)) {
        (OutputFormat::Json, Ok(json)) => println!("{}", json),
        (OutputFormat::Text, Ok(json)) => {
            println!("{}", serde_json::to_string_pretty(&json)?)
        }
        (_, Err(_)) => println!("{}", text),
    }
    Ok(())
}
