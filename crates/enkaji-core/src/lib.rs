//! Core library for the Enkaji admin console.
//!
//! This crate provides:
//! - `auth`: the session store, its durable snapshot, the auth gateway,
//!   navigation and the route guard
//! - `api`: the session-aware transport and the admin resource calls
//! - `console`: the wiring object built once at process start
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod console;
pub mod models;

pub use api::{AdminApi, ApiError, ApiRequest, AuthError, SessionTransport};
pub use auth::{
    AuthGateway, Credential, FileStorage, GuardDecision, MemoryStorage, Navigator, RouteGuard,
    Session, SessionStatus, SessionStore, SnapshotStorage, DEFAULT_LANDING_PATH, LOGIN_PATH,
    REDIRECT_KEY, TOKEN_KEY, USER_KEY,
};
pub use config::Config;
pub use console::AdminConsole;
pub use models::{AdminIdentity, LoginCredentials, PaginationParams, Resource};
