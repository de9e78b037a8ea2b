//! Session models for the identity-provider boundary.

use serde::{Deserialize, Serialize};

use super::Profile;

/// The authenticated caller, resolved from a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    /// Token the request authenticated with.
    pub token: String,
}

/// A stored session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Request body the identity provider sends to open a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Existing user id; a fresh one is allocated when absent.
    #[serde(default)]
    pub user_id: Option<String>,
    pub email: String,
    /// Username for a newly created profile; defaults to the email's local part.
    #[serde(default)]
    pub username: Option<String>,
}

impl CreateSessionRequest {
    pub fn default_username(&self) -> Option<String> {
        self.username
            .clone()
            .or_else(|| self.email.split('@').next().map(str::to_string))
            .filter(|name| !name.trim().is_empty())
    }
}

/// Response for a newly issued session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
    pub profile: Profile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_username_from_email() {
        let request = CreateSessionRequest {
            user_id: None,
            email: "ada@example.com".to_string(),
            username: None,
        };
        assert_eq!(request.default_username().as_deref(), Some("ada"));

        let request = CreateSessionRequest {
            user_id: None,
            email: "@example.com".to_string(),
            username: None,
        };
        assert_eq!(request.default_username(), None);
    }
}
