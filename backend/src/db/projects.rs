//! Project and like operations.

use sqlx::Row;

use super::repository::parse_json_array;
use super::{now, Repository};
use crate::errors::AppError;
use crate::models::{LikeToggle, Project, UpdateProjectRequest};

const PROJECT_COLUMNS: &str =
    "id, title, description, technologies, user_id, image_url, created_at, updated_at, likes, version";

/// Fields of a new project, already validated.
#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub user_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub technologies: &'a [String],
    pub image_url: Option<&'a str>,
}

impl Repository {
    // ==================== PROJECT OPERATIONS ====================

    /// List all projects, newest first.
    pub async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(project_from_row).collect())
    }

    /// Get a project by ID.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(project_from_row))
    }

    /// Get a project, failing with `NotFound` when it does not exist.
    pub async fn require_project(&self, id: &str) -> Result<Project, AppError> {
        self.get_project(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))
    }

    /// Create a new project owned by `new.user_id`.
    pub async fn create_project(&self, new: &NewProject<'_>) -> Result<Project, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now();
        let technologies_json = serde_json::to_string(new.technologies)?;

        sqlx::query(
            "INSERT INTO projects (id, title, description, technologies, user_id, image_url, created_at, updated_at, likes, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 1)"
        )
        .bind(&id)
        .bind(new.title)
        .bind(new.description)
        .bind(&technologies_json)
        .bind(new.user_id)
        .bind(new.image_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Project {
            id,
            title: new.title.to_string(),
            description: new.description.to_string(),
            technologies: new.technologies.to_vec(),
            user_id: new.user_id.to_string(),
            image_url: new.image_url.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
            likes: 0,
            version: 1,
        })
    }

    /// Update a project with optimistic concurrency control.
    ///
    /// Ownership is the caller's concern; this only guards the version.
    pub async fn update_project(
        &self,
        id: &str,
        request: &UpdateProjectRequest,
    ) -> Result<Project, AppError> {
        let existing = self.require_project(id).await?;

        // Check version for optimistic concurrency
        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = now();
        let new_version = existing.version + 1;

        let title = request.title.clone().unwrap_or(existing.title);
        let description = request.description.clone().unwrap_or(existing.description);
        let technologies = request
            .technologies
            .clone()
            .map(|t| t.into_vec())
            .unwrap_or(existing.technologies);
        let image_url = request.image_url.clone().or(existing.image_url);
        let technologies_json = serde_json::to_string(&technologies)?;

        // Use conditional UPDATE with version check to prevent race conditions
        let result = sqlx::query(
            "UPDATE projects SET title = ?, description = ?, technologies = ?, image_url = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&title)
        .bind(&description)
        .bind(&technologies_json)
        .bind(&image_url)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Race condition - version changed between read and write
            let current = self.get_project(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|p| p.version).unwrap_or(0),
            });
        }

        Ok(Project {
            id: id.to_string(),
            title,
            description,
            technologies,
            user_id: existing.user_id,
            image_url,
            created_at: existing.created_at,
            updated_at: now,
            likes: existing.likes,
            version: new_version,
        })
    }

    /// Delete a project. Likes and comments go with it.
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Project {} not found", id)));
        }

        Ok(())
    }

    // ==================== LIKE OPERATIONS ====================

    /// Toggle `user_id`'s like on a project.
    ///
    /// The like row and the counter change in one transaction: liking adds the
    /// row and increments by one, unliking removes it and decrements by one.
    pub async fn toggle_like(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<LikeToggle, AppError> {
        self.require_project(project_id).await?;

        // Use a transaction for atomicity
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO likes (user_id, project_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(now())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query("UPDATE projects SET likes = likes + 1 WHERE id = ?")
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("DELETE FROM likes WHERE user_id = ? AND project_id = ?")
                .bind(user_id)
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE projects SET likes = MAX(likes - 1, 0) WHERE id = ?")
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
        }

        let likes: i64 = sqlx::query("SELECT likes FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_one(&mut *tx)
            .await?
            .get("likes");

        tx.commit().await?;

        Ok(LikeToggle {
            project_id: project_id.to_string(),
            liked: inserted,
            likes,
        })
    }

    /// IDs of the projects `user_id` has liked, most recent first.
    pub async fn liked_project_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT project_id FROM likes WHERE user_id = ? ORDER BY created_at DESC, project_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("project_id")).collect())
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Project {
    let technologies: String = row.get("technologies");
    Project {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        technologies: parse_json_array(&technologies),
        user_id: row.get("user_id"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        likes: row.get("likes"),
        version: row.get("version"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;
    use crate::models::TechnologyList;

    async fn seeded() -> (Repository, tempfile::TempDir, Project) {
        let (repo, dir) = temp_repository().await;
        repo.ensure_profile("owner", Some("owner")).await.unwrap();
        let technologies = vec!["Go".to_string(), "Rust".to_string()];
        let project = repo
            .create_project(&NewProject {
                user_id: "owner",
                title: "Demo",
                description: "x",
                technologies: &technologies,
                image_url: None,
            })
            .await
            .unwrap();
        (repo, dir, project)
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let (repo, _dir, project) = seeded().await;

        let stored = repo.require_project(&project.id).await.unwrap();
        assert_eq!(stored, project);
        assert_eq!(stored.technologies, vec!["Go", "Rust"]);
    }

    #[tokio::test]
    async fn test_like_toggle_keeps_counter_consistent() {
        let (repo, _dir, project) = seeded().await;

        let liked = repo.toggle_like("fan", &project.id).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.likes, 1);
        assert_eq!(repo.liked_project_ids("fan").await.unwrap(), vec![project.id.clone()]);

        let unliked = repo.toggle_like("fan", &project.id).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.likes, 0);
        assert!(repo.liked_project_ids("fan").await.unwrap().is_empty());

        for _ in 0..5 {
            let toggle = repo.toggle_like("fan", &project.id).await.unwrap();
            assert!(toggle.likes == 0 || toggle.likes == 1);
        }
    }

    #[tokio::test]
    async fn test_update_project_version_conflict() {
        let (repo, _dir, project) = seeded().await;

        let updated = repo
            .update_project(
                &project.id,
                &UpdateProjectRequest {
                    technologies: Some(TechnologyList::parse("Zig")),
                    expected_version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "Demo");
        assert_eq!(updated.technologies, vec!["Zig"]);

        let stale = repo
            .update_project(
                &project.id,
                &UpdateProjectRequest {
                    title: Some("Stale".to_string()),
                    expected_version: Some(1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(stale, Err(AppError::Conflict { current_version: 2, .. })));
    }

    #[tokio::test]
    async fn test_delete_project_cascades_likes() {
        let (repo, _dir, project) = seeded().await;
        repo.toggle_like("fan", &project.id).await.unwrap();

        repo.delete_project(&project.id).await.unwrap();

        assert!(repo.get_project(&project.id).await.unwrap().is_none());
        assert!(repo.liked_project_ids("fan").await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_project(&project.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
