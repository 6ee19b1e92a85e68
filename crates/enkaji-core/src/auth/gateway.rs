//! Thin façade over the backend's admin auth endpoints.
//!
//! No retry, caching or backoff lives here; recovery policy belongs to the
//! session-aware transport.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::session::Credential;
use crate::api::error::{ApiError, AuthError};
use crate::models::{AdminIdentity, LoginCredentials};

const LOGIN_ENDPOINT: &str = "/admin/auth/login";
const VERIFY_ENDPOINT: &str = "/admin/auth/verify";
const REFRESH_ENDPOINT: &str = "/admin/auth/refresh";
const LOGOUT_ENDPOINT: &str = "/admin/auth/logout";

/// Message shown when the backend gives no reason for a failed login
const DEFAULT_LOGIN_ERROR: &str = "Login failed";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: Option<AdminIdentity>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: Option<AdminIdentity>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Result of a successful admin login
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub identity: AdminIdentity,
    pub credential: Credential,
}

/// Clone is cheap - the reqwest client (and its cookie jar) is shared.
#[derive(Clone)]
pub struct AuthGateway {
    client: Client,
    base_url: String,
}

fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

impl AuthGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Sign in. Succeeds only for accounts carrying the admin flag; a login
    /// that the server accepts for a non-admin is still rejected here.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, AuthError> {
        debug!(email = %credentials.email_address, "Sending login request");

        let response = self
            .client
            .post(self.url(LOGIN_ENDPOINT))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Login rejected");
            let message =
                server_message(&body).unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string());
            return Err(AuthError::AuthenticationFailed(message));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("login: {}", e)))?;

        let identity = match body.user {
            Some(user) if user.is_admin => user,
            Some(user) => {
                warn!(user_id = %user.id, "Login succeeded for a non-admin account");
                return Err(AuthError::AdminPrivilegeRequired);
            }
            None => {
                warn!("Login response carried no user");
                return Err(AuthError::AdminPrivilegeRequired);
            }
        };

        let credential = match body.token.filter(|t| !t.is_empty()) {
            Some(token) => Credential::bearer(token),
            None => Credential::Cookie,
        };

        Ok(LoginGrant {
            identity,
            credential,
        })
    }

    /// Validate an existing session against the server
    pub async fn verify(&self, credential: &Credential) -> Result<AdminIdentity, AuthError> {
        let response = credential
            .authorize(self.client.get(self.url(VERIFY_ENDPOINT)))
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(AuthError::SessionInvalid),
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::InvalidResponse(format!(
                    "Status {}: {}",
                    status,
                    ApiError::truncate_body(&body)
                )));
            }
            _ => {}
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("verify: {}", e)))?;

        body.user.ok_or(AuthError::SessionInvalid)
    }

    /// Renew the session using the ambient cookie. A token in the response
    /// becomes the new bearer credential; an empty body means the cookie
    /// itself was renewed.
    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        debug!("Refreshing session");

        let response = self
            .client
            .get(self.url(REFRESH_ENDPOINT))
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!("status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let token = serde_json::from_str::<RefreshResponse>(&body)
            .ok()
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty());

        Ok(match token {
            Some(token) => Credential::bearer(token),
            None => Credential::Cookie,
        })
    }

    /// Invalidate the server-side session. Callers clear local state
    /// whatever this returns.
    pub async fn logout(&self, credential: &Credential) -> Result<(), AuthError> {
        let response = credential
            .authorize(self.client.post(self.url(LOGOUT_ENDPOINT)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "logout status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
