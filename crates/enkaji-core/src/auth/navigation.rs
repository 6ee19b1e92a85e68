//! In-app location tracking.

use tokio::sync::watch;
use tracing::debug;

/// Path of the login view
pub const LOGIN_PATH: &str = "/login";

/// Where a successful login lands when no redirect target is stored
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// Current in-app location (path plus query), observable by subscribers.
pub struct Navigator {
    location: watch::Sender<String>,
}

impl Navigator {
    pub fn new(initial: impl Into<String>) -> Self {
        let (location, _) = watch::channel(initial.into());
        Self { location }
    }

    pub fn current(&self) -> String {
        self.location.borrow().clone()
    }

    pub fn navigate(&self, path: &str) {
        debug!(to = path, "Navigating");
        self.location.send_replace(path.to_string());
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(DEFAULT_LANDING_PATH)
    }
}

/// A stored redirect target is only honoured if it stays inside the app and
/// does not loop back to the login view.
pub fn is_safe_return_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && path_only(path) != LOGIN_PATH
}

/// Strip query and fragment
pub fn path_only(location: &str) -> &str {
    location
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_updates_location() {
        let nav = Navigator::new("/products");
        let rx = nav.subscribe();
        nav.navigate("/orders?page=2");
        assert_eq!(nav.current(), "/orders?page=2");
        assert_eq!(*rx.borrow(), "/orders?page=2");
    }

    #[test]
    fn test_safe_return_path() {
        assert!(is_safe_return_path("/orders?page=2"));
        assert!(is_safe_return_path("/dashboard"));
        assert!(!is_safe_return_path("https://evil.example"));
        assert!(!is_safe_return_path("//evil.example"));
        assert!(!is_safe_return_path("/login"));
        assert!(!is_safe_return_path("/login?next=/x"));
        assert!(!is_safe_return_path(""));
    }

    #[test]
    fn test_path_only() {
        assert_eq!(path_only("/orders?page=2"), "/orders");
        assert_eq!(path_only("/users#top"), "/users");
        assert_eq!(path_only("/reviews"), "/reviews");
    }
}
