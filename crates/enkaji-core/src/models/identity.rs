use serde::{Deserialize, Serialize};

/// The signed-in account as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: String,
    #[serde(alias = "displayName", default)]
    pub full_name: String,
    pub email_address: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl AdminIdentity {
    /// Required fields are present and non-empty
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.email_address.trim().is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.email_address
        } else {
            &self.full_name
        }
    }
}

/// Login form payload for `POST /admin/auth/login`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email_address: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email_address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email_address", &self.email_address)
            .field("password", &"<redacted>")
            .finish()
    }
}
