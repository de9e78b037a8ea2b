//! Profile model: a user's public identity record.

use serde::{Deserialize, Serialize};

/// A user's public profile. Owned and mutated only by that user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub github_url: Option<String>,
    pub twitter_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for editing one's own profile.
///
/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub background_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
}

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    Background,
}

impl ProfileImage {
    pub fn column(&self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar_url",
            ProfileImage::Background => "background_url",
        }
    }
}

/// Query parameters for the user directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub q: Option<String>,
}

impl ProfileQuery {
    /// Case-insensitive substring match on username or full name.
    pub fn matches(&self, profile: &Profile) -> bool {
        let Some(term) = self.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();

        [&profile.username, &profile.full_name]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, username: Option<&str>, full_name: Option<&str>) -> Profile {
        Profile {
            id: id.to_string(),
            username: username.map(str::to_string),
            full_name: full_name.map(str::to_string),
            bio: None,
            avatar_url: None,
            background_url: None,
            website: None,
            location: None,
            github_url: None,
            twitter_url: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_query_matches_username_or_full_name() {
        let ada = profile("1", Some("ada"), Some("Ada Lovelace"));
        let query = ProfileQuery {
            q: Some("LOVE".to_string()),
        };
        assert!(query.matches(&ada));

        let query = ProfileQuery {
            q: Some("grace".to_string()),
        };
        assert!(!query.matches(&ada));
    }

    #[test]
    fn test_blank_query_matches_everything() {
        let anonymous = profile("2", None, None);
        let query = ProfileQuery {
            q: Some("   ".to_string()),
        };
        assert!(query.matches(&anonymous));
    }
}
