//! Session token storage.

use chrono::{Duration, Utc};
use sqlx::Row;

use super::{now, timestamp, Repository};
use crate::errors::AppError;
use crate::models::Session;

impl Repository {
    // ==================== SESSION OPERATIONS ====================

    /// Issue a new session for `user_id` valid for `ttl`.
    pub async fn create_session(&self, user_id: &str, ttl: Duration) -> Result<Session, AppError> {
        let issued = Utc::now();
        let expires = issued
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal("Session lifetime out of range".to_string()))?;
        let session = Session {
            token: format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            ),
            user_id: user_id.to_string(),
            created_at: timestamp(issued),
            expires_at: timestamp(expires),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(&session.created_at)
        .bind(&session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Resolve a token to its session, ignoring expired ones.
    pub async fn find_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Session {
            token: row.get("token"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop expired sessions. Returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (repo, _dir) = temp_repository().await;

        let session = repo.create_session("u1", Duration::hours(1)).await.unwrap();
        assert_eq!(session.token.len(), 64);

        let found = repo.find_session(&session.token).await.unwrap().unwrap();
        assert_eq!(found.user_id, "u1");

        repo.delete_session(&session.token).await.unwrap();
        assert!(repo.find_session(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_ignored_and_purged() {
        let (repo, _dir) = temp_repository().await;

        let expired = repo.create_session("u1", Duration::hours(-1)).await.unwrap();
        let live = repo.create_session("u1", Duration::hours(1)).await.unwrap();

        assert!(repo.find_session(&expired.token).await.unwrap().is_none());
        assert_eq!(repo.purge_expired_sessions().await.unwrap(), 1);
        assert!(repo.find_session(&live.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_is_an_error() {
        let (repo, _dir) = temp_repository().await;

        let result = repo.create_session("u1", Duration::MAX).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(repo.purge_expired_sessions().await.unwrap(), 0);
    }
}
