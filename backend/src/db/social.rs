//! Follow graph and comment operations.

use sqlx::Row;

use super::repository::{profile_from_row, PROFILE_COLUMNS};
use super::{now, Repository};
use crate::errors::AppError;
use crate::models::{Comment, Profile};

impl Repository {
    // ==================== FOLLOW OPERATIONS ====================

    /// Add a follow edge. Returns `false` when the edge already existed.
    pub async fn follow(&self, follower_id: &str, following_id: &str) -> Result<bool, AppError> {
        if follower_id == following_id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }
        self.require_profile(following_id).await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a follow edge if present.
    pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM user_follows WHERE follower_id = ? AND following_id = ?")
                .bind(follower_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn is_following(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT 1 FROM user_follows WHERE follower_id = ? AND following_id = ?",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Profiles `user_id` follows, most recently followed first.
    pub async fn list_following(&self, user_id: &str) -> Result<Vec<Profile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_follows f JOIN profiles p ON p.id = f.following_id WHERE f.follower_id = ? ORDER BY f.created_at DESC",
            qualified_profile_columns()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    /// Profiles following `user_id`, most recent first.
    pub async fn list_followers(&self, user_id: &str) -> Result<Vec<Profile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_follows f JOIN profiles p ON p.id = f.follower_id WHERE f.following_id = ? ORDER BY f.created_at DESC",
            qualified_profile_columns()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    // ==================== COMMENT OPERATIONS ====================

    /// Comments on a project, newest first.
    pub async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query(
            "SELECT id, project_id, user_id, username, content, created_at FROM comments WHERE project_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Append a comment. The author's username is copied at write time.
    pub async fn create_comment(
        &self,
        project_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Comment, AppError> {
        self.require_project(project_id).await?;
        let username = self
            .get_profile(user_id)
            .await?
            .and_then(|profile| profile.username);

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            username,
            content: content.to_string(),
            created_at: now(),
        };

        sqlx::query(
            "INSERT INTO comments (id, project_id, user_id, username, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.project_id)
        .bind(&comment.user_id)
        .bind(&comment.username)
        .bind(&comment.content)
        .bind(&comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(comment)
    }
}

fn qualified_profile_columns() -> String {
    PROFILE_COLUMNS
        .split(", ")
        .map(|column| format!("p.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn comment_from_row(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}
