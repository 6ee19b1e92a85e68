//! Shared fixtures: a wiremock backend and a console pointed at it.

use std::sync::Arc;

use enkaji_core::{
    AdminConsole, AdminIdentity, Config, Credential, MemoryStorage, SnapshotStorage, TOKEN_KEY,
    USER_KEY,
};
use serde_json::{json, Value};
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub storage: Arc<MemoryStorage>,
    pub console: AdminConsole,
}

impl Harness {
    /// Fresh backend, empty storage, store not yet initialized
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let storage = Arc::new(MemoryStorage::new());
        let console = console_for(&server.uri(), storage.clone());
        Self {
            server,
            storage,
            console,
        }
    }

    /// Backend plus an authenticated session holding bearer `token`
    #[allow(dead_code)]
    pub async fn signed_in(token: &str) -> Self {
        let harness = Self::start().await;
        harness.console.store().initialize();
        harness
            .console
            .store()
            .set_authenticated(admin_identity(), Credential::bearer(token));
        harness
    }

    #[allow(dead_code)]
    pub fn persisted_credential(&self) -> Option<Credential> {
        self.storage
            .read(TOKEN_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }
}

pub fn console_for(api_url: &str, storage: Arc<MemoryStorage>) -> AdminConsole {
    let config = Config::with_api_url(api_url);
    AdminConsole::new(&config, storage).expect("console builds")
}

#[allow(dead_code)]
pub fn seed_snapshot(storage: &MemoryStorage, identity: &AdminIdentity, credential: &Credential) {
    storage
        .write(USER_KEY, &serde_json::to_string(identity).unwrap())
        .unwrap();
    storage
        .write(TOKEN_KEY, &serde_json::to_string(credential).unwrap())
        .unwrap();
}

#[allow(dead_code)]
pub fn admin_identity() -> AdminIdentity {
    AdminIdentity {
        id: "u-admin".to_string(),
        full_name: "Store Admin".to_string(),
        email_address: "admin@x.com".to_string(),
        is_admin: true,
    }
}

#[allow(dead_code)]
pub fn user_json(is_admin: bool) -> Value {
    json!({
        "id": if is_admin { "u-admin" } else { "u-shopper" },
        "fullName": if is_admin { "Store Admin" } else { "Shopper" },
        "emailAddress": if is_admin { "admin@x.com" } else { "shopper@x.com" },
        "isAdmin": is_admin,
    })
}
