//! The request dispatcher.
//!
//! Every call goes through [`ApiClient::send`]:
//!
//! 1. attach the current access token unless the path is an excluded
//!    authentication endpoint, lies on another origin, or the token has
//!    expired
//! 2. on success return the raw response
//! 3. on a 401 from a protected endpoint, wait for the renewal
//!    coordinator and replay the request once with the renewed credential
//! 4. classify anything else into exactly one [`ClassifiedError`]

use crate::backend::{Backend, EndpointKind};
use crate::classifier::{classify_response, Disposition};
use crate::coordinator::RenewalCoordinator;
use crate::credential::{Credential, Identity, TokenGrant};
use crate::error::{ApiResult, ClassifiedError, ErrorKind, Failure, TransportError};
use crate::notifier::{ListenerId, SessionEvent, SessionNotifier};
use crate::renewal_fsm::RenewalPhase;
use crate::request::{ApiRequest, ApiResponse};
use crate::store::CredentialStore;
use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport};
use client_config::{AuthRoutes, Config};
use credential_storage::{create_memory_vault, CredentialVault};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of a registration call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    /// True when the backend issued a credential and the session is live.
    pub signed_in: bool,
    pub identity: Option<Identity>,
}

struct ClientInner {
    backend: Arc<Backend>,
    store: Arc<CredentialStore>,
    notifier: Arc<SessionNotifier>,
    coordinator: Arc<RenewalCoordinator>,
}

/// Authenticated REST client. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// Client over reqwest with settings from `config`.
    pub fn from_config(config: &Config, vault: CredentialVault) -> Result<Self, TransportError> {
        Self::builder(config.api_base_url.clone())
            .timeout(config.request_timeout())
            .routes(config.auth_routes.clone())
            .vault(vault)
            .build()
    }

    /// Send a request, renewing the credential once if it is rejected.
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let inner = &self.inner;
        let endpoint = inner.backend.endpoint_kind(request.path());
        let bearer = if endpoint.is_excluded() {
            None
        } else {
            inner.store.usable_access_token()
        };

        let response = self.dispatch(&request, bearer.as_deref()).await?;
        match classify_response(endpoint, false, &response) {
            Disposition::Success => Ok(ApiResponse::new(response)),
            Disposition::Failed(err) => Err(self.failed(&request, err)),
            Disposition::RenewalEligible => {
                debug!(
                    method = %request.method(),
                    path = %request.path(),
                    "Authorization rejected, waiting for credential renewal"
                );
                let credential = inner.coordinator.renewed_credential().await?;
                self.replay(endpoint, &request, &credential).await
            }
        }
    }

    async fn replay(
        &self,
        endpoint: EndpointKind,
        request: &ApiRequest,
        credential: &Credential,
    ) -> ApiResult<ApiResponse> {
        let response = self
            .dispatch(request, Some(credential.access_token()))
            .await?;

        match classify_response(endpoint, true, &response) {
            Disposition::Success => Ok(ApiResponse::new(response)),
            Disposition::Failed(err) => {
                if err.kind() == ErrorKind::SessionExpired {
                    warn!(
                        path = %request.path(),
                        "Request rejected with a freshly renewed credential, ending session"
                    );
                    self.inner.coordinator.end_session();
                }
                Err(self.failed(request, err))
            }
            // A replayed request is never renewal eligible
            Disposition::RenewalEligible => Err(self.failed(
                request,
                ClassifiedError::session_expired(Failure::RejectedAfterRenewal {
                    status: response.status,
                }),
            )),
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> ApiResult<HttpResponse> {
        let backend = &self.inner.backend;
        let http = backend
            .build(request, bearer)
            .map_err(|e| self.failed(request, ClassifiedError::transport(e)))?;
        backend
            .execute(http)
            .await
            .map_err(|e| self.failed(request, ClassifiedError::transport(e)))
    }

    fn failed(&self, request: &ApiRequest, err: ClassifiedError) -> ClassifiedError {
        debug!(
            method = %request.method(),
            path = %request.path(),
            kind = %err.kind(),
            status = ?err.status(),
            "Request failed"
        );
        err
    }

    pub async fn get(&self, path: &str) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: serde_json::Value) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Sign in with email and password.
    ///
    /// A rejected login is `INVALID_CREDENTIALS` and never triggers renewal.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<Option<Identity>> {
        let path = self.inner.backend.routes().login.clone();
        let response = self
            .send(ApiRequest::post(path).json(serde_json::json!({
                "email": email,
                "password": password,
            })))
            .await?;

        let grant: TokenGrant = response.json()?;
        let identity = self.establish(grant);
        info!(
            user = %identity.as_ref().map(Identity::label).unwrap_or_default(),
            "Login successful"
        );
        Ok(identity)
    }

    /// Create an account. `payload` is passed to the backend verbatim.
    ///
    /// Backends that issue a credential on registration sign the user in;
    /// others return the created user and leave the session untouched.
    pub async fn register(&self, payload: serde_json::Value) -> ApiResult<Registration> {
        let path = self.inner.backend.routes().register.clone();
        let response = self.send(ApiRequest::post(path).json(payload)).await?;

        let body: serde_json::Value = response.json()?;
        let has_credential = ["access_token", "accessToken", "token"]
            .iter()
            .any(|key| body.get(*key).is_some_and(serde_json::Value::is_string));

        if has_credential {
            let grant: TokenGrant = serde_json::from_value(body)
                .map_err(|e| ClassifiedError::decode(response.status(), e))?;
            let identity = self.establish(grant);
            info!("Registration successful, signed in");
            return Ok(Registration {
                signed_in: true,
                identity,
            });
        }

        let identity = body
            .get("user")
            .cloned()
            .or(Some(body))
            .and_then(|value| serde_json::from_value::<Identity>(value).ok());
        info!("Registration successful");
        Ok(Registration {
            signed_in: false,
            identity,
        })
    }

    fn establish(&self, grant: TokenGrant) -> Option<Identity> {
        let (credential, identity) = grant.into_credential(None);
        let inner = &self.inner;
        inner.store.replace(credential, identity);
        let identity = inner.store.identity();
        inner.notifier.signed_in(identity.clone());
        identity
    }

    /// Forget the session locally. Listeners get `SignedOut`, not `Ended`.
    pub fn logout(&self) {
        self.inner.store.clear();
        self.inner.notifier.signed_out();
        info!("Logged out");
    }

    /// Renew the credential now, joining an in-flight renewal if there is one.
    pub async fn refresh_now(&self) -> ApiResult<Credential> {
        self.inner.coordinator.renewed_credential().await
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.store.current()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.store.identity()
    }

    /// Whether a credential is held, expired or not.
    pub fn is_signed_in(&self) -> bool {
        self.inner.store.is_signed_in()
    }

    pub fn renewal_phase(&self) -> RenewalPhase {
        self.inner.coordinator.phase()
    }

    /// Callers currently queued behind an in-flight renewal.
    pub fn pending_renewals(&self) -> usize {
        self.inner.coordinator.pending()
    }

    /// Renewal episodes started by this client.
    pub fn renewals_started(&self) -> u64 {
        self.inner.coordinator.episodes_started()
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    routes: AuthRoutes,
    transport: Option<Arc<dyn HttpTransport>>,
    vault: Option<CredentialVault>,
}

impl ApiClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(client_config::DEFAULT_TIMEOUT_MS),
            routes: AuthRoutes::default(),
            transport: None,
            vault: None,
        }
    }

    /// Timeout for the default reqwest transport. Ignored with a custom transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn routes(mut self, routes: AuthRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where the credential is persisted. Defaults to memory only.
    pub fn vault(mut self, vault: CredentialVault) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn build(self) -> Result<ApiClient, TransportError> {
        let base_url = Url::parse(&self.base_url)?;
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        let backend = Arc::new(Backend::new(transport, base_url, self.routes));
        let store = Arc::new(CredentialStore::new(
            self.vault.unwrap_or_else(create_memory_vault),
        ));
        let notifier = Arc::new(SessionNotifier::new());
        let coordinator = Arc::new(RenewalCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&notifier),
        ));

        debug!(base_url = %self.base_url, "API client ready");
        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                backend,
                store,
                notifier,
                coordinator,
            }),
        })
    }
}
