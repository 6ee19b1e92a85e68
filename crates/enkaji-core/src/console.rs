//! The console's wiring object.
//!
//! Built once at process start: one HTTP client (and cookie jar) shared by the
//! gateway and the transport, one session store, one navigator. Consumers get
//! them by reference instead of reaching for globals.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::api::{AdminApi, ApiError, AuthError, SessionTransport};
use crate::auth::navigation::is_safe_return_path;
use crate::auth::{
    AuthGateway, Navigator, RouteGuard, Session, SessionStatus, SessionStore, SnapshotStorage,
    DEFAULT_LANDING_PATH, LOGIN_PATH,
};
use crate::config::Config;
use crate::models::LoginCredentials;

pub struct AdminConsole {
    store: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    gateway: AuthGateway,
    transport: Arc<SessionTransport>,
    guard: RouteGuard,
}

impl AdminConsole {
    pub fn new(config: &Config, storage: Arc<dyn SnapshotStorage>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs()))
            .cookie_store(true)
            .build()?;
        let base_url = config.api_url();
        debug!(%base_url, "Admin console configured");

        let store = Arc::new(SessionStore::new(storage));
        let navigator = Arc::new(Navigator::default());
        let gateway = AuthGateway::new(http.clone(), base_url.clone());
        let transport = Arc::new(SessionTransport::new(
            http,
            base_url,
            store.clone(),
            navigator.clone(),
            gateway.clone(),
        ));
        let guard = RouteGuard::new(store.clone(), navigator.clone());

        Ok(Self {
            store,
            navigator,
            gateway,
            transport,
            guard,
        })
    }

    /// Rehydrate the session and check it with the server. Must complete
    /// before any guarded view is shown.
    ///
    /// A credential the server rejects goes through the transport's shared
    /// refresh once; only a failed refresh signs out. A session that lost its
    /// admin flag is cleared. A network failure keeps the rehydrated session;
    /// the transport will deal with it on the first protected call.
    pub async fn start(&self) -> SessionStatus {
        self.store.initialize();

        let Some(credential) = self.store.current().credential().cloned() else {
            return SessionStatus::Unauthenticated;
        };

        let verified = match self.gateway.verify(&credential).await {
            Err(AuthError::SessionInvalid) => {
                info!("Persisted credential rejected; refreshing");
                match self.transport.refresh_session().await {
                    Ok(renewed) => self.gateway.verify(&renewed).await,
                    Err(e) => {
                        info!(error = %e, "Persisted session could not be renewed");
                        return self.store.status();
                    }
                }
            }
            other => other,
        };

        match verified {
            Ok(identity) if identity.is_admin && identity.is_well_formed() => {
                let session = self.store.current();
                if session.identity() != Some(&identity) {
                    if let Some(credential) = session.credential().cloned() {
                        self.store.set_authenticated(identity, credential);
                    }
                }
                info!("Persisted session verified");
            }
            Ok(identity) => {
                warn!(user_id = %identity.id, "Persisted session lacks admin rights");
                self.store.clear();
            }
            Err(AuthError::SessionInvalid) => {
                info!("Persisted session rejected by server");
                self.store.clear();
            }
            Err(e) => {
                warn!(error = %e, "Could not verify persisted session; keeping it");
            }
        }

        self.store.status()
    }

    /// Sign in and land on the stored redirect target, or the dashboard.
    ///
    /// On failure nothing is stored and the session is untouched; the error's
    /// message is what the login view shows.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<String, AuthError> {
        let grant = self.gateway.login(credentials).await?;
        self.store.set_authenticated(grant.identity, grant.credential);

        let landing = self
            .store
            .take_redirect()
            .filter(|path| is_safe_return_path(path))
            .unwrap_or_else(|| DEFAULT_LANDING_PATH.to_string());

        info!(landing = %landing, "Login successful");
        self.navigator.navigate(&landing);
        Ok(landing)
    }

    /// Best-effort server logout; the local session is cleared regardless.
    pub async fn logout(&self) {
        if let Some(credential) = self.store.current().credential().cloned() {
            if let Err(e) = self.gateway.logout(&credential).await {
                warn!(error = %e, "Server logout failed; clearing local session anyway");
            }
        }
        self.store.clear();
        // An explicit logout forgets any pending return path
        let _ = self.store.take_redirect();
        self.navigator.navigate(LOGIN_PATH);
    }

    pub fn session(&self) -> Session {
        self.store.current()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn transport(&self) -> &Arc<SessionTransport> {
        &self.transport
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub fn admin(&self) -> AdminApi {
        AdminApi::new(self.transport.clone())
    }
}
