//! The request gateway: every outbound call goes through here.

use crate::client::classify;
use crate::client::config::ClientConfig;
use crate::client::native_transport::NativeTransport;
use crate::error::Result;
use crate::routing::{BackendRouter, Site};
use crate::session::{
    InvalidationReason, RefreshError, SessionCoordinator, SessionEvents, TokenStore,
};
use crate::storage::FileStorage;
use crate::traits::{SessionStorage, Transport};
use crate::types::{ApiRequest, ApiResponse, Session};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The CrewLink API client.
///
/// Wraps every outbound call: resolves the base URL for the selected
/// backend group, attaches the bearer token, classifies auth failures,
/// drives the session coordinator, and retries the original call at
/// most once after a successful refresh. Cheap to clone; all clones
/// share the same session and in-flight refresh state.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    store: TokenStore,
    router: BackendRouter,
    coordinator: SessionCoordinator,
    events: SessionEvents,
}

impl ApiClient {
    /// Build a client over the native transport and the file-backed
    /// session store.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(NativeTransport::from_config(&config)?);
        let storage = Arc::new(FileStorage::new(FileStorage::default_path()?));
        Self::with_parts(config, transport, storage).await
    }

    /// Build a client from explicit transport and storage backends.
    /// This is the constructor tests use.
    pub async fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self> {
        let store = TokenStore::new(storage.clone());
        let router = BackendRouter::new(storage, config.default_site);
        router.load().await?;
        let events = SessionEvents::new();
        let coordinator = SessionCoordinator::new(
            store.clone(),
            router.clone(),
            transport.clone(),
            events.clone(),
            Duration::from_millis(config.refresh_grace_ms),
        );
        Ok(ApiClient {
            transport,
            config: Arc::new(config),
            store,
            router,
            coordinator,
            events,
        })
    }

    /// Send a request through the auth-aware pipeline.
    ///
    /// Responses whose status does not qualify for refresh-and-retry
    /// are returned unmodified, whatever the status. When a refresh
    /// succeeds the call is resent exactly once and the second
    /// response is returned unconditionally, bounding the cost of the
    /// transparent recovery to one extra round trip.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request);
        let first = self.send_once(&url, &request, None).await?;

        if request.no_auth || !classify::is_refresh_eligible(first.status, &first.body) {
            return Ok(first);
        }

        if self.config.enable_logging {
            warn!(status = first.status, url = %url, "auth failure, refreshing session");
        }

        match self.coordinator.refresh().await {
            Ok(token) => {
                let retry = self.send_once(&url, &request, Some(&token)).await?;
                if classify::is_auth_status(retry.status) {
                    // Fresh token rejected too: stop here rather than loop.
                    // The caller gets the retry response either way.
                    if let Err(e) = self
                        .coordinator
                        .invalidate(InvalidationReason::RetryUnauthorized)
                        .await
                    {
                        warn!("failed to invalidate session: {}", e);
                    }
                }
                Ok(retry)
            }
            Err(err @ RefreshError::Unrecoverable(_)) => Err(err.into()),
            Err(RefreshError::Transient(reason)) => {
                debug!(reason = %reason, "refresh inconclusive, returning original failure");
                Ok(first)
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(path)).await
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(path)
                .with_method("POST")
                .with_json(body)?,
        )
        .await
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.send(ApiRequest::new(path).with_method("PUT").with_json(body)?)
            .await
    }

    pub async fn patch<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(path)
                .with_method("PATCH")
                .with_json(body)?,
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(path).with_method("DELETE")).await
    }

    /// Authenticate and persist the session.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        self.coordinator.sign_in(username, password).await
    }

    /// Clear the session locally and emit the invalidated signal.
    pub async fn sign_out(&self) -> Result<()> {
        self.coordinator.sign_out().await
    }

    /// The stored session, if any.
    pub async fn session(&self) -> Result<Option<Session>> {
        self.store.read().await
    }

    /// Switch the active deployment site. Does not touch the session.
    pub async fn set_active_site(&self, site: Site) -> Result<()> {
        self.router.set_active_site(site).await
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        let base = self.router.resolve(None).base_for(request.backend);
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        )
    }

    /// One dispatch. The bearer comes from the store unless an
    /// override token (from a just-finished refresh) is given; the
    /// store itself is never written here.
    async fn send_once(
        &self,
        url: &str,
        request: &ApiRequest,
        token_override: Option<&str>,
    ) -> Result<ApiResponse> {
        let mut outgoing = request.clone();
        if !outgoing.no_auth {
            let token = match token_override {
                Some(token) => Some(token.to_string()),
                None => self.store.access_token().await?,
            };
            if let Some(token) = token {
                outgoing = outgoing.with_header("Authorization", format!("Bearer {token}"));
            }
        }
        self.transport.fetch(url, outgoing).await
    }
}
