//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Operations
//! are grouped by entity across this module's siblings; this file holds the
//! repository handle and profile operations.

use sqlx::{Row, SqlitePool};

use super::now;
use crate::errors::AppError;
use crate::models::{Profile, ProfileImage, UpdateProfileRequest};

pub(super) const PROFILE_COLUMNS: &str = "id, username, full_name, bio, avatar_url, background_url, \
    website, location, github_url, twitter_url, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== PROFILE OPERATIONS ====================

    /// List all profiles ordered by username.
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY username COLLATE NOCASE, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    /// Get a profile by ID.
    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// Get a profile, failing with `NotFound` when it does not exist.
    pub async fn require_profile(&self, id: &str) -> Result<Profile, AppError> {
        self.get_profile(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Create an empty profile for `id` unless one exists, then return it.
    pub async fn ensure_profile(
        &self,
        id: &str,
        username: Option<&str>,
    ) -> Result<Profile, AppError> {
        let now = now();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO profiles (id, username, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!(user_id = %id, "Created profile");
        }

        self.require_profile(id).await
    }

    /// Update a profile. Absent fields keep their stored value.
    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, AppError> {
        let existing = self.require_profile(id).await?;
        let now = now();

        let merged = Profile {
            id: existing.id,
            username: request.username.clone().or(existing.username),
            full_name: request.full_name.clone().or(existing.full_name),
            bio: request.bio.clone().or(existing.bio),
            avatar_url: request.avatar_url.clone().or(existing.avatar_url),
            background_url: request.background_url.clone().or(existing.background_url),
            website: request.website.clone().or(existing.website),
            location: request.location.clone().or(existing.location),
            github_url: request.github_url.clone().or(existing.github_url),
            twitter_url: request.twitter_url.clone().or(existing.twitter_url),
            created_at: existing.created_at,
            updated_at: now,
        };

        sqlx::query(
            "UPDATE profiles SET username = ?, full_name = ?, bio = ?, avatar_url = ?, background_url = ?, website = ?, location = ?, github_url = ?, twitter_url = ?, updated_at = ? WHERE id = ?"
        )
        .bind(&merged.username)
        .bind(&merged.full_name)
        .bind(&merged.bio)
        .bind(&merged.avatar_url)
        .bind(&merged.background_url)
        .bind(&merged.website)
        .bind(&merged.location)
        .bind(&merged.github_url)
        .bind(&merged.twitter_url)
        .bind(&merged.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(merged)
    }

    /// Point one of the profile images at a new URL.
    pub async fn set_profile_image(
        &self,
        id: &str,
        image: ProfileImage,
        url: &str,
    ) -> Result<Profile, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE profiles SET {} = ?, updated_at = ? WHERE id = ?",
            image.column()
        ))
        .bind(url)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        self.require_profile(id).await
    }
}

// Helper functions for row conversion

pub(super) fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Profile {
    Profile {
        id: row.get("id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        bio: row.get("bio"),
        avatar_url: row.get("avatar_url"),
        background_url: row.get("background_url"),
        website: row.get("website"),
        location: row.get("location"),
        github_url: row.get("github_url"),
        twitter_url: row.get("twitter_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;

    #[tokio::test]
    async fn test_ensure_profile_is_idempotent() {
        let (repo, _dir) = temp_repository().await;

        let first = repo.ensure_profile("u1", Some("ada")).await.unwrap();
        let second = repo.ensure_profile("u1", Some("other")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.username.as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn test_update_profile_keeps_absent_fields() {
        let (repo, _dir) = temp_repository().await;
        repo.ensure_profile("u1", Some("ada")).await.unwrap();

        let updated = repo
            .update_profile(
                "u1",
                &UpdateProfileRequest {
                    bio: Some("Writes compilers".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username.as_deref(), Some("ada"));
        assert_eq!(updated.bio.as_deref(), Some("Writes compilers"));

        let missing = repo.update_profile("nobody", &UpdateProfileRequest::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_profile_image() {
        let (repo, _dir) = temp_repository().await;
        repo.ensure_profile("u1", None).await.unwrap();

        let profile = repo
            .set_profile_image("u1", ProfileImage::Background, "http://cdn/bg.png")
            .await
            .unwrap();

        assert_eq!(profile.background_url.as_deref(), Some("http://cdn/bg.png"));
        assert!(profile.avatar_url.is_none());
    }
}
