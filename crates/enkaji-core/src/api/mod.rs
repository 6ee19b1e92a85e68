//! REST API access for the admin console.
//!
//! This module provides the `SessionTransport`, which every protected call
//! goes through, the `AdminApi` resource calls built on it, and the error
//! taxonomy shared with the auth flows.
//!
//! Protected calls carry the session credential (ambient cookie, plus a
//! bearer header when the session has a token). An expired session is
//! refreshed once and the call replayed.

pub mod admin;
pub mod error;
pub mod transport;

pub use admin::AdminApi;
pub use error::{ApiError, AuthError};
pub use transport::{ApiRequest, SessionTransport};
