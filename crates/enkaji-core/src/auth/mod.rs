//! Authentication module for the admin session.
//!
//! This module provides:
//! - `SessionStore`: the single in-memory session and its durable snapshot
//! - `SnapshotStorage`: key/value storage backing the snapshot
//! - `AuthGateway`: login, verify, refresh and logout calls
//! - `Navigator` and `RouteGuard`: in-app location and view gating

pub mod gateway;
pub mod guard;
pub mod navigation;
pub mod session;
pub mod storage;

pub use gateway::{AuthGateway, LoginGrant};
pub use guard::{GuardDecision, RouteGuard};
pub use navigation::{Navigator, DEFAULT_LANDING_PATH, LOGIN_PATH};
pub use session::{
    Credential, Session, SessionStatus, SessionStore, REDIRECT_KEY, TOKEN_KEY, USER_KEY,
};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, StorageError};
