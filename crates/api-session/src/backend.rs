//! Resolves [`ApiRequest`]s against the configured backend.

use crate::error::TransportError;
use crate::request::ApiRequest;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use client_config::AuthRoutes;
use std::sync::Arc;
use url::Url;

/// How the dispatcher treats a path when it fails authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Login,
    Register,
    Renewal,
    Protected,
    /// An absolute URL on another origin.
    External,
}

impl EndpointKind {
    /// Excluded endpoints never carry a bearer and never trigger renewal.
    /// Only the backend's own protected routes see the credential.
    pub fn is_excluded(self) -> bool {
        !matches!(self, Self::Protected)
    }

    /// Endpoints where a 401 means the submitted credentials were wrong.
    pub fn is_sign_in(self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

pub(crate) struct Backend {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    routes: AuthRoutes,
}

impl Backend {
    pub(crate) fn new(transport: Arc<dyn HttpTransport>, base_url: Url, routes: AuthRoutes) -> Self {
        Self {
            transport,
            base_url,
            routes,
        }
    }

    pub(crate) fn routes(&self) -> &AuthRoutes {
        &self.routes
    }

    pub(crate) fn endpoint_kind(&self, path: &str) -> EndpointKind {
        if !self.same_origin(path) {
            return EndpointKind::External;
        }
        let route = self.route_of(path);
        if route == normalize(&self.routes.login) {
            EndpointKind::Login
        } else if route == normalize(&self.routes.register) {
            EndpointKind::Register
        } else if route == normalize(&self.routes.refresh) {
            EndpointKind::Renewal
        } else {
            EndpointKind::Protected
        }
    }

    /// Resolve `request`, attaching `bearer` as the `Authorization` header.
    pub(crate) fn build(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<HttpRequest, TransportError> {
        let mut url = self.url_for(request.path())?;
        if !request.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query_pairs()
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        headers.extend(
            request
                .headers()
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
                .cloned(),
        );
        if let Some(token) = bearer {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        Ok(HttpRequest {
            method: request.method(),
            url: url.into(),
            headers,
            body: request.body().cloned(),
        })
    }

    pub(crate) async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.transport.execute(request).await
    }

    fn same_origin(&self, path: &str) -> bool {
        if !is_absolute(path) {
            return true;
        }
        Url::parse(path)
            .map(|url| url.origin() == self.base_url.origin())
            .unwrap_or(false)
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        if is_absolute(path) {
            return Ok(Url::parse(path)?);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))?)
    }

    /// The path relative to the base URL, without query or trailing slash.
    fn route_of(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let relative = path.strip_prefix(base).unwrap_or(path);
        let without_query = relative.split(['?', '#']).next().unwrap_or_default();
        normalize(without_query)
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn normalize(route: &str) -> String {
    format!("/{}", route.trim_matches('/'))
}
