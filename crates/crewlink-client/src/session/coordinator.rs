//! The refresh state machine.
//!
//! Owns every write to the token store: sign-in, refresh success, and
//! invalidation. Concurrent refresh demand is collapsed into a single
//! network round trip by sharing one in-flight future; the refresh
//! itself runs in a spawned task so it always settles even if every
//! awaiter goes away.

use crate::client::classify;
use crate::error::{ClientError, Result};
use crate::routing::BackendRouter;
use crate::session::events::{InvalidationReason, SessionEvent, SessionEvents};
use crate::session::store::TokenStore;
use crate::traits::Transport;
use crate::types::{ApiRequest, ApiResponse, Envelope, Session};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// How a refresh attempt failed. `Clone` so the outcome can flow
/// through the shared in-flight future to every awaiter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No further retry can succeed without full re-authentication.
    /// The session has already been invalidated.
    #[error("refresh rejected: {0}")]
    Unrecoverable(String),
    /// Network trouble, server error, or an ambiguous failure. The
    /// session is left untouched; the caller may retry later.
    #[error("refresh failed: {0}")]
    Transient(String),
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Unrecoverable(msg) => ClientError::SessionExpired(msg),
            RefreshError::Transient(msg) => ClientError::Network(msg),
        }
    }
}

type RefreshOutcome = std::result::Result<String, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    id: u64,
    future: SharedRefresh,
}

/// What a single credential call produced.
enum CallOutcome {
    /// Fresh token plus any profile fields the server sent along.
    Token(String, Option<Value>),
    /// Auth-failure status (401/403, or a 400 classified as an
    /// invalid-token rejection).
    AuthFailure(ApiResponse),
    /// Anything else.
    Failure(ApiResponse),
}

/// Owns the refresh state machine and the session-lifetime invariants.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: TokenStore,
    router: BackendRouter,
    transport: Arc<dyn Transport>,
    events: SessionEvents,
    grace: Duration,
    inflight: Arc<Mutex<Option<InFlight>>>,
    seq: Arc<AtomicU64>,
}

impl SessionCoordinator {
    pub fn new(
        store: TokenStore,
        router: BackendRouter,
        transport: Arc<dyn Transport>,
        events: SessionEvents,
        grace: Duration,
    ) -> Self {
        SessionCoordinator {
            store,
            router,
            transport,
            events,
            grace,
            inflight: Arc::new(Mutex::new(None)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Authenticate with credentials and persist the resulting session.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        let url = self.auth_url("sign-in");
        let request = ApiRequest::new("authentication/sign-in")
            .with_method("POST")
            .no_auth()
            .with_json(&serde_json::json!({
                "username": username,
                "password": password,
            }))?;

        let response = self.transport.fetch(&url, request).await?;
        let Some(envelope) = response.envelope() else {
            if !response.is_success() {
                return Err(ClientError::Auth(format!(
                    "sign-in failed with status {}",
                    response.status
                )));
            }
            return Err(ClientError::Protocol("malformed sign-in response".into()));
        };
        if !envelope.is_ok() {
            return Err(ClientError::Auth(envelope.message().to_string()));
        }

        let (token, profile_value) = token_from_envelope(&envelope)
            .ok_or_else(|| ClientError::Protocol("sign-in response carried no token".into()))?;
        let profile = crate::types::UserProfile::from_value(
            profile_value.as_ref().unwrap_or(&Value::Null),
            username,
        );
        let session = Session::new(token, profile, self.router.active_site());
        self.store.write(&session).await?;
        info!(username, "signed in");
        Ok(session)
    }

    /// Sign out locally. Clears the session and emits the invalidated
    /// signal; no network call is made.
    pub async fn sign_out(&self) -> Result<()> {
        self.invalidate(InvalidationReason::SignedOut).await
    }

    /// Obtain a fresh access token, deduplicating concurrent demand
    /// into a single network round trip.
    ///
    /// Callers that hit an auth failure while a refresh is pending
    /// await the same future and observe the same outcome. The settled
    /// attempt stays reachable for the configured grace window so
    /// near-simultaneous stragglers do not trigger a redundant cycle.
    pub async fn refresh(&self) -> RefreshOutcome {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            if let Some(attempt) = inflight.as_ref() {
                debug!("joining in-flight refresh");
                attempt.future.clone()
            } else {
                let id = self.seq.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let this = self.clone();
                tokio::spawn(async move {
                    let outcome = this.run_refresh().await;
                    let _ = tx.send(outcome);
                    // Release the settled attempt after the grace window.
                    tokio::time::sleep(this.grace).await;
                    let mut inflight = this.inflight.lock().await;
                    if inflight.as_ref().is_some_and(|a| a.id == id) {
                        *inflight = None;
                    }
                });
                let future: SharedRefresh = async move {
                    match rx.await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(RefreshError::Transient("refresh task dropped".into())),
                    }
                }
                .boxed()
                .shared();
                *inflight = Some(InFlight {
                    id,
                    future: future.clone(),
                });
                future
            }
        };
        shared.await
    }

    /// Clear the session, reset routing to the default site, and emit
    /// the invalidated signal. Idempotent.
    pub async fn invalidate(&self, reason: InvalidationReason) -> Result<()> {
        self.store.clear().await?;
        self.router.reset_to_default().await?;
        self.events.emit(SessionEvent::Invalidated { reason });
        info!(?reason, "session invalidated");
        Ok(())
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let session = match self.store.read().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                return self
                    .reject_unrecoverable("no stored session to refresh".into())
                    .await;
            }
            Err(e) => return Err(RefreshError::Transient(e.to_string())),
        };

        debug!("refreshing access token");
        let primary = self.call_refresh_token(&session.access_token).await?;
        match primary {
            CallOutcome::Token(token, profile) => {
                self.persist_refreshed(session, token, profile).await
            }
            CallOutcome::AuthFailure(response) => {
                // The token is too invalid to act as a bearer credential;
                // fall back to renewing by username, at most once.
                let username = session.profile.username.clone();
                if username.is_empty() {
                    return self.classify_rejection(&response).await;
                }
                debug!("refresh token rejected, renewing by username");
                match self.call_renew_token(&username).await? {
                    CallOutcome::Token(token, profile) => {
                        self.persist_refreshed(session, token, profile).await
                    }
                    CallOutcome::AuthFailure(renew) => {
                        let message = rejection_message(&renew);
                        self.reject_unrecoverable(message).await
                    }
                    CallOutcome::Failure(renew) => {
                        if classify::is_unrecoverable_refresh(&renew.body) {
                            self.reject_unrecoverable(rejection_message(&renew)).await
                        } else {
                            Err(RefreshError::Transient(format!(
                                "renew failed with status {}",
                                renew.status
                            )))
                        }
                    }
                }
            }
            CallOutcome::Failure(response) => self.classify_rejection(&response).await,
        }
    }

    async fn call_refresh_token(
        &self,
        token: &str,
    ) -> std::result::Result<CallOutcome, RefreshError> {
        let url = self.auth_url("refresh-token");
        let request = ApiRequest::new("authentication/refresh-token")
            .with_method("POST")
            .no_auth()
            .with_header("Authorization", format!("Bearer {token}"));
        self.dispatch_credential_call(&url, request).await
    }

    async fn call_renew_token(
        &self,
        username: &str,
    ) -> std::result::Result<CallOutcome, RefreshError> {
        let url = self.auth_url("renew-token");
        let request = ApiRequest::new("authentication/renew-token")
            .with_method("POST")
            .no_auth()
            .with_json(&serde_json::json!({ "username": username }))
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        self.dispatch_credential_call(&url, request).await
    }

    async fn dispatch_credential_call(
        &self,
        url: &str,
        request: ApiRequest,
    ) -> std::result::Result<CallOutcome, RefreshError> {
        let response = self
            .transport
            .fetch(url, request)
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;

        if let Some(envelope) = response.envelope() {
            if envelope.is_ok() {
                if let Some((token, profile)) = token_from_envelope(&envelope) {
                    return Ok(CallOutcome::Token(token, profile));
                }
                return Err(RefreshError::Transient(
                    "credential response carried no token".into(),
                ));
            }
        }
        if classify::is_refresh_eligible(response.status, &response.body) {
            Ok(CallOutcome::AuthFailure(response))
        } else {
            Ok(CallOutcome::Failure(response))
        }
    }

    async fn persist_refreshed(
        &self,
        session: Session,
        token: String,
        profile_patch: Option<Value>,
    ) -> RefreshOutcome {
        let profile = match &profile_patch {
            Some(patch) => session.profile.merged(patch),
            None => session.profile.clone(),
        };
        let refreshed = Session::new(token.clone(), profile, session.site);
        self.store
            .write(&refreshed)
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        info!("access token refreshed");
        Ok(token)
    }

    /// Decide between unrecoverable and transient for a refresh-call
    /// rejection that has no fallback left.
    async fn classify_rejection(&self, response: &ApiResponse) -> RefreshOutcome {
        if classify::is_unrecoverable_refresh(&response.body) {
            self.reject_unrecoverable(rejection_message(response)).await
        } else {
            Err(RefreshError::Transient(format!(
                "refresh failed with status {}",
                response.status
            )))
        }
    }

    async fn reject_unrecoverable(&self, message: String) -> RefreshOutcome {
        warn!("unrecoverable refresh: {}", message);
        if let Err(e) = self.invalidate(InvalidationReason::RefreshRejected).await {
            warn!("failed to invalidate session: {}", e);
        }
        Err(RefreshError::Unrecoverable(message))
    }

    fn auth_url(&self, operation: &str) -> String {
        let endpoints = self.router.resolve(None);
        format!("{}/authentication/{}", endpoints.api_base, operation)
    }
}

/// Human-readable reason for a rejected credential call: the
/// envelope's failure message when one was sent, the status otherwise.
fn rejection_message(response: &ApiResponse) -> String {
    match response.envelope() {
        Some(envelope) if !envelope.message().is_empty() => envelope.message().to_string(),
        _ => format!("credential call rejected with status {}", response.status),
    }
}

/// Pull the fresh token (and optional profile fields) out of a
/// successful credential envelope. The servers answer either with a
/// bare token string or with `{token, profile}`.
fn token_from_envelope(envelope: &Envelope) -> Option<(String, Option<Value>)> {
    match envelope.data.as_ref()? {
        Value::String(token) if !token.is_empty() => Some((token.clone(), None)),
        Value::Object(map) => {
            let token = map.get("token")?.as_str()?;
            if token.is_empty() {
                return None;
            }
            let profile = map
                .get("profile")
                .or_else(|| map.get("user"))
                .cloned()
                .filter(|v| !v.is_null());
            Some((token.to_string(), profile))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_from_envelope_variants() {
        let env = Envelope::parse(br#"{"rpta":1,"data":"tok-plain"}"#).unwrap();
        assert_eq!(token_from_envelope(&env), Some(("tok-plain".into(), None)));

        let env = Envelope::parse(br#"{"rpta":1,"data":{"token":"tok-obj"}}"#).unwrap();
        assert_eq!(token_from_envelope(&env), Some(("tok-obj".into(), None)));

        let env =
            Envelope::parse(br#"{"rpta":1,"data":{"token":"t","profile":{"role":"agent"}}}"#)
                .unwrap();
        let (token, profile) = token_from_envelope(&env).unwrap();
        assert_eq!(token, "t");
        assert_eq!(profile, Some(json!({"role": "agent"})));

        let env = Envelope::parse(br#"{"rpta":1,"data":{"token":""}}"#).unwrap();
        assert_eq!(token_from_envelope(&env), None);

        let env = Envelope::parse(br#"{"rpta":1}"#).unwrap();
        assert_eq!(token_from_envelope(&env), None);
    }

    #[test]
    fn test_rejection_message_prefers_envelope_text() {
        let res = ApiResponse::new(400, r#"{"rpta":0,"msg":"Token expirado"}"#);
        assert_eq!(rejection_message(&res), "Token expirado");

        // No envelope at all: fall back to the status.
        let res = ApiResponse::new(502, "Bad Gateway");
        assert_eq!(
            rejection_message(&res),
            "credential call rejected with status 502"
        );

        // Envelope present but message empty: the status still wins.
        let res = ApiResponse::new(401, r#"{"rpta":0}"#);
        assert_eq!(
            rejection_message(&res),
            "credential call rejected with status 401"
        );
    }
}
