//! Gate protected views on the session status.

use std::sync::Arc;

use tracing::{debug, warn};

use super::navigation::{path_only, Navigator, LOGIN_PATH};
use super::session::SessionStore;

/// Views reachable without a session
const PUBLIC_PATHS: &[&str] = &[LOGIN_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect(String),
}

/// Wraps every protected view. Reads the session store on each navigation
/// and never touches the network.
///
/// The store must be initialized before the first check; otherwise a
/// rehydratable session looks unauthenticated and the visitor is bounced to
/// the login view.
pub struct RouteGuard {
    store: Arc<SessionStore>,
    navigator: Arc<Navigator>,
}

impl RouteGuard {
    pub fn new(store: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        Self { store, navigator }
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path_only(path))
    }

    /// Decide without navigating
    pub fn check(&self, path: &str) -> GuardDecision {
        if Self::is_public(path) {
            return GuardDecision::Render;
        }
        if !self.store.is_initialized() {
            warn!(path, "Route guard consulted before session store initialized");
        }
        if self.store.current().is_authenticated() {
            GuardDecision::Render
        } else {
            GuardDecision::Redirect(LOGIN_PATH.to_string())
        }
    }

    /// Navigate to `path`, or to the login view if the session does not allow it
    pub fn visit(&self, path: &str) -> GuardDecision {
        let decision = self.check(path);
        match decision {
            GuardDecision::Render => self.navigator.navigate(path),
            GuardDecision::Redirect(ref to) => {
                debug!(from = path, to = %to, "Unauthenticated visit redirected");
                self.navigator.navigate(to);
            }
        }
        decision
    }
}
