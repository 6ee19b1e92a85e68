//! The session store: the one place the authenticated session lives.
//!
//! The in-memory `Session` sits in a `watch` channel so reactive consumers
//! can subscribe, and every mutation is mirrored to a durable snapshot under
//! fixed storage keys. A snapshot is either fully valid or discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::SnapshotStorage;
use crate::models::AdminIdentity;

/// Storage key for the serialized credential
pub const TOKEN_KEY: &str = "admin_token";

/// Storage key for the serialized identity
pub const USER_KEY: &str = "admin_user";

/// Storage key for the path to return to after the next login
pub const REDIRECT_KEY: &str = "redirect_after_login";

/// How the session is proven to the backend.
///
/// Both carriers ride along with the HTTP client's cookie jar; `Bearer`
/// additionally sends an `Authorization` header. The backend answers 401 for
/// either kind of expiry and that is what triggers a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credential {
    Bearer { token: String },
    Cookie,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential::Bearer {
            token: token.into(),
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Credential::Bearer { token } => Some(token),
            Credential::Cookie => None,
        }
    }

    /// Attach this credential to an outgoing request
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Bearer { token } => request.bearer_auth(token),
            Credential::Cookie => request,
        }
    }

    fn is_well_formed(&self) -> bool {
        match self {
            Credential::Bearer { token } => !token.trim().is_empty(),
            Credential::Cookie => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq)]
struct SessionData {
    identity: AdminIdentity,
    credential: Credential,
    established_at: DateTime<Utc>,
}

impl SessionData {
    fn new(identity: AdminIdentity, credential: Credential) -> Self {
        Self {
            identity,
            credential,
            established_at: Utc::now(),
        }
    }
}

/// Snapshot of the session handed out by value.
///
/// Status is derived from the identity, so an authenticated session always
/// has one and an unauthenticated session never does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    data: Option<SessionData>,
    revision: u64,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        if self.data.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn identity(&self) -> Option<&AdminIdentity> {
        self.data.as_ref().map(|d| &d.identity)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.data.as_ref().map(|d| &d.credential)
    }

    /// When this process established or rehydrated the session
    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().map(|d| d.established_at)
    }

    /// Bumped on every mutation; lets the transport tell whether the
    /// credential changed while a request was in flight.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Why a persisted snapshot was rejected. Logged, never returned.
#[derive(Error, Debug)]
enum SnapshotError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("unparsable {key}: {source}")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {0}")]
    Invalid(&'static str),
}

fn parse_snapshot(
    token: Option<&str>,
    user: Option<&str>,
) -> Result<(AdminIdentity, Credential), SnapshotError> {
    let token = token.ok_or(SnapshotError::Missing(TOKEN_KEY))?;
    let user = user.ok_or(SnapshotError::Missing(USER_KEY))?;

    let credential: Credential = serde_json::from_str(token).map_err(|source| {
        SnapshotError::Malformed {
            key: TOKEN_KEY,
            source,
        }
    })?;
    let identity: AdminIdentity = serde_json::from_str(user).map_err(|source| {
        SnapshotError::Malformed {
            key: USER_KEY,
            source,
        }
    })?;

    if !credential.is_well_formed() {
        return Err(SnapshotError::Invalid(TOKEN_KEY));
    }
    if !identity.is_well_formed() || !identity.is_admin {
        return Err(SnapshotError::Invalid(USER_KEY));
    }
    Ok((identity, credential))
}

pub struct SessionStore {
    storage: Arc<dyn SnapshotStorage>,
    state: watch::Sender<Session>,
    initialized: AtomicBool,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            storage,
            state,
            initialized: AtomicBool::new(false),
        }
    }

    /// Rehydrate from the persisted snapshot.
    ///
    /// A missing snapshot leaves the store unauthenticated; a corrupt one is
    /// deleted. Calling this again with the same snapshot changes nothing and
    /// notifies nobody.
    pub fn initialize(&self) {
        let loaded = self.load_snapshot();

        self.state.send_if_modified(|session| {
            let unchanged = match (&session.data, &loaded) {
                (Some(current), Some((identity, credential))) => {
                    current.identity == *identity && current.credential == *credential
                }
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return false;
            }
            session.data = loaded
                .clone()
                .map(|(identity, credential)| SessionData::new(identity, credential));
            session.revision += 1;
            true
        });

        self.initialized.store(true, Ordering::SeqCst);
        debug!(status = ?self.status(), "Session store initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Establish a session, write the snapshot and notify subscribers.
    pub fn set_authenticated(&self, identity: AdminIdentity, credential: Credential) {
        self.persist_snapshot(&identity, &credential);

        info!(user_id = %identity.id, "Session established");
        self.state.send_modify(|session| {
            session.data = Some(SessionData::new(identity, credential));
            session.revision += 1;
        });
    }

    /// Swap in a refreshed credential. Returns false when there is no
    /// session to apply it to.
    pub fn replace_credential(&self, credential: Credential) -> bool {
        let applied = self.state.send_if_modified(|session| match session.data.as_mut() {
            Some(data) => {
                data.credential = credential.clone();
                session.revision += 1;
                true
            }
            None => false,
        });

        if applied {
            // The stored user still matches the stored token if this fails
            let _ = self.write_json(TOKEN_KEY, &credential);
            debug!("Session credential refreshed");
        }
        applied
    }

    /// Drop the session and its snapshot. Safe to call when already cleared.
    pub fn clear(&self) {
        self.remove_snapshot();

        let cleared = self.state.send_if_modified(|session| {
            if session.data.is_none() {
                return false;
            }
            session.data = None;
            session.revision += 1;
            true
        });
        if cleared {
            info!("Session cleared");
        }
    }

    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Record where to send the user after their next login
    pub fn remember_redirect(&self, path: &str) {
        if let Err(e) = self.storage.write(REDIRECT_KEY, path) {
            warn!(error = %e, "Failed to persist redirect target");
        }
    }

    /// Read and delete the stored redirect target
    pub fn take_redirect(&self) -> Option<String> {
        let target = match self.storage.read(REDIRECT_KEY) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Failed to read redirect target");
                return None;
            }
        };
        if target.is_some() {
            if let Err(e) = self.storage.remove(REDIRECT_KEY) {
                warn!(error = %e, "Failed to remove redirect target");
            }
        }
        target
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted session");
                None
            }
        }
    }

    fn load_snapshot(&self) -> Option<(AdminIdentity, Credential)> {
        let token = self.read_key(TOKEN_KEY);
        let user = self.read_key(USER_KEY);

        if token.is_none() && user.is_none() {
            debug!("No persisted session");
            return None;
        }

        match parse_snapshot(token.as_deref(), user.as_deref()) {
            Ok(snapshot) => Some(snapshot),
            Err(reason) => {
                warn!(%reason, "Discarding corrupt persisted session");
                self.remove_snapshot();
                None
            }
        }
    }

    /// Write user then token. If either write fails both keys are removed,
    /// so a later `initialize()` never pairs a new user with an old token.
    fn persist_snapshot(&self, identity: &AdminIdentity, credential: &Credential) {
        let persisted =
            self.write_json(USER_KEY, identity) && self.write_json(TOKEN_KEY, credential);
        if !persisted {
            self.remove_snapshot();
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let result = serde_json::to_string(value)
            .map_err(|e| e.to_string())
            .and_then(|json| self.storage.write(key, &json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(key, %error, "Failed to persist session; continuing in memory");
                false
            }
        }
    }

    fn remove_snapshot(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
