//! Caller-facing request and response types.

use crate::error::{ApiResult, ClassifiedError};
use crate::transport::{HttpMethod, HttpResponse};
use serde::de::DeserializeOwned;

/// A request relative to the API base URL.
///
/// Requests are plain values so the dispatcher can replay them after a
/// renewal without the caller noticing.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header. `Authorization` is owned by the client and is overwritten.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A successful (2xx) response. The body is the backend's raw payload.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    inner: HttpResponse,
}

impl ApiResponse {
    pub(crate) fn new(inner: HttpResponse) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    pub fn text(&self) -> &str {
        &self.inner.body
    }

    /// Decode the body. Empty bodies decode as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let body = if self.inner.body.trim().is_empty() {
            "null"
        } else {
            self.inner.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| ClassifiedError::decode(self.inner.status, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder() {
        let request = ApiRequest::post("/posts")
            .query("draft", "true")
            .header("X-Trace", "1")
            .json(serde_json::json!({"title": "t"}));
        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.path(), "/posts");
        assert_eq!(request.query_pairs().len(), 1);
        assert_eq!(request.headers()[0].0, "X-Trace");
        assert_eq!(request.body().unwrap()["title"], "t");
    }

    #[test]
    fn test_json_decoding() {
        let response = ApiResponse::new(HttpResponse::new(200, r#"{"id": 3}"#));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 3);

        let empty = ApiResponse::new(HttpResponse::new(204, ""));
        let value: Option<serde_json::Value> = empty.json().unwrap();
        assert!(value.is_none());

        let broken = ApiResponse::new(HttpResponse::new(200, "<html>"));
        let err = broken.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.status(), Some(200));
    }
}
