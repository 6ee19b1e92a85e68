//! Session-aware transport for protected API calls.
//!
//! Each logical call walks `Sent -> AwaitingResponse -> {Success | AuthFailed}`
//! and, on an auth failure, `Refreshing -> {Replay | GiveUp}`. A call is
//! dispatched at most twice. Concurrent auth failures share one in-flight
//! refresh, and that refresh applies its outcome to the session store exactly
//! once.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::error::{ApiError, AuthError};
use crate::auth::{AuthGateway, Credential, Navigator, RouteGuard, SessionStore, LOGIN_PATH};

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

/// Dispatches allowed per logical call: the original and one replay
const MAX_ATTEMPTS: u32 = 2;

/// A protected call, kept replayable: the same method, path, query, headers
/// and body go out again after a refresh. Only the credential changes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::PUT, path).with_json(body)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A refresh and the session revision it was started for.
struct InflightRefresh {
    revision: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct RefreshState {
    inflight: Option<InflightRefresh>,
    /// Last refresh error and the revision the failed refresh left behind
    last_failure: Option<(u64, AuthError)>,
}

/// One logical call and its own attempt counter. Never shared between calls.
struct PendingRequest {
    request: ApiRequest,
    attempts: u32,
}

impl PendingRequest {
    fn new(request: ApiRequest) -> Self {
        Self {
            request,
            attempts: 0,
        }
    }

    fn begin_attempt(&mut self) {
        self.attempts += 1;
    }

    fn can_replay(&self) -> bool {
        self.attempts < MAX_ATTEMPTS
    }
}

pub struct SessionTransport {
    http: Client,
    base_url: String,
    store: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    gateway: AuthGateway,
    refresh: Mutex<RefreshState>,
}

impl SessionTransport {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        store: Arc<SessionStore>,
        navigator: Arc<Navigator>,
        gateway: AuthGateway,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
            navigator,
            gateway,
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Typed helpers =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::post(path, body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::put(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(path)).await.map(|_| ())
    }

    /// Execute and decode the JSON body. An empty body decodes as `null`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        let text = response.text().await?;
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// Execute a protected call, recovering once from an expired session.
    ///
    /// Non-auth failures come back unmodified. A failed refresh rejects with
    /// `ApiError::SessionExpired` carrying the refresh error.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let mut pending = PendingRequest::new(request);

        loop {
            pending.begin_attempt();
            let session = self.store.current();

            debug!(
                method = %pending.request.method,
                path = %pending.request.path,
                attempt = pending.attempts,
                "Sending request"
            );
            let response = self
                .dispatch(&pending.request, session.credential())
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response).await;
            }

            if !pending.can_replay() {
                warn!(path = %pending.request.path, "Replayed request rejected again; giving up");
                return Err(ApiError::Unauthorized);
            }

            debug!(path = %pending.request.path, "Authentication failed; recovering session");
            self.recover(session.revision())
                .await
                .map_err(ApiError::SessionExpired)?;
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<Response, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        if let Some(credential) = credential {
            builder = credential.authorize(builder);
        }

        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Session recovery =====

    /// Renew the current session through the shared refresh, joining one
    /// already in flight for it. On failure the session is signed out.
    pub async fn refresh_session(&self) -> Result<Credential, AuthError> {
        self.recover(self.store.current().revision()).await?;
        self.store
            .current()
            .credential()
            .cloned()
            .ok_or(AuthError::SessionExpired)
    }

    /// Make the session usable again after a 401 on a request sent at
    /// `seen_revision`.
    async fn recover(&self, seen_revision: u64) -> Result<(), AuthError> {
        let Some(refresh) = self.join_refresh(seen_revision) else {
            return self.settled_outcome();
        };

        let outcome = refresh.clone().await;
        self.finish_refresh(&refresh, &outcome);
        outcome.map(|_| ())
    }

    /// The session moved on while the request was in flight: replay if it is
    /// still signed in, otherwise report why it was signed out.
    fn settled_outcome(&self) -> Result<(), AuthError> {
        let session = self.store.current();
        if session.is_authenticated() {
            return Ok(());
        }

        match &self.refresh_state().last_failure {
            Some((revision, error)) if *revision == session.revision() => Err(error.clone()),
            _ => Err(AuthError::SessionExpired),
        }
    }

    fn refresh_state(&self) -> MutexGuard<'_, RefreshState> {
        self.refresh.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Join the refresh started for `seen_revision`, or start one if the
    /// session is still at that revision. `None` means no refresh is needed.
    fn join_refresh(&self, seen_revision: u64) -> Option<RefreshFuture> {
        let mut state = self.refresh_state();
        if let Some(inflight) = state.inflight.as_ref() {
            if inflight.revision == seen_revision {
                debug!("Joining in-flight session refresh");
                return Some(inflight.future.clone());
            }
        }
        if self.store.current().revision() != seen_revision {
            return None;
        }

        let future = self.start_refresh();
        state.inflight = Some(InflightRefresh {
            revision: seen_revision,
            future: future.clone(),
        });
        Some(future)
    }

    fn finish_refresh(&self, finished: &RefreshFuture, outcome: &Result<Credential, AuthError>) {
        let mut state = self.refresh_state();
        if state
            .inflight
            .as_ref()
            .is_some_and(|inflight| inflight.future.ptr_eq(finished))
        {
            state.inflight = None;
        }
        if let Err(e) = outcome {
            state.last_failure = Some((self.store.current().revision(), e.clone()));
        }
    }

    fn start_refresh(&self) -> RefreshFuture {
        let gateway = self.gateway.clone();
        let store = self.store.clone();
        let navigator = self.navigator.clone();

        async move {
            let result = gateway.refresh().await.and_then(|credential| {
                if store.replace_credential(credential.clone()) {
                    Ok(credential)
                } else {
                    Err(AuthError::SessionExpired)
                }
            });

            match result {
                Ok(_) => info!("Session refreshed"),
                Err(ref e) => {
                    warn!(error = %e, "Session refresh failed; signing out");
                    let intended = navigator.current();
                    if !RouteGuard::is_public(&intended) {
                        store.remember_redirect(&intended);
                    }
                    store.clear();
                    navigator.navigate(LOGIN_PATH);
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}
