//! Project model: a user-authored work item visible to everyone.

use serde::{Deserialize, Deserializer, Serialize};

use super::Profile;

/// Technology tags of a project.
///
/// Accepts either a JSON array or the comma-separated text the project form
/// submits. Entries are trimmed and blanks dropped, so `"Go, Rust"` and
/// `["Go", " Rust "]` both become `["Go", "Rust"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TechnologyList(Vec<String>);

impl TechnologyList {
    pub fn parse(text: &str) -> Self {
        Self::from_items(text.split(','))
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|item| item.as_ref().trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for TechnologyList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(items) => Self::from_items(items),
            Raw::Text(text) => Self::parse(&text),
        })
    }
}

/// A published project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub user_id: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub likes: i64,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// A project together with its creator's profile, for the detail page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub creator: Option<Profile>,
}

/// Request body for creating a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: TechnologyList,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Request body for editing a project. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technologies: Option<TechnologyList>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub project_id: String,
    pub liked: bool,
    pub likes: i64,
}

/// Projects liked by the current user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedProjects {
    pub liked_projects: Vec<String>,
}

/// Sort orders offered by the project list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectSort {
    #[default]
    Newest,
    Oldest,
    MostLiked,
    Title,
}

/// Query parameters for the project list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sort: ProjectSort,
}

impl ProjectQuery {
    /// Case-insensitive substring match on the title or any technology.
    pub fn matches(&self, project: &Project) -> bool {
        if let Some(user_id) = &self.user_id {
            if &project.user_id != user_id {
                return false;
            }
        }

        let Some(term) = self.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();

        project.title.to_lowercase().contains(&term)
            || project
                .technologies
                .iter()
                .any(|tech| tech.to_lowercase().contains(&term))
    }

    /// Filter and order a list of projects.
    pub fn apply(&self, projects: Vec<Project>) -> Vec<Project> {
        let mut projects: Vec<Project> = projects.into_iter().filter(|p| self.matches(p)).collect();

        match self.sort {
            ProjectSort::Newest => projects.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            }),
            ProjectSort::Oldest => projects.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            ProjectSort::MostLiked => projects.sort_by(|a, b| {
                b.likes
                    .cmp(&a.likes)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
            ProjectSort::Title => projects.sort_by_cached_key(|p| p.title.to_lowercase()),
        }

        projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(
        id: &str,
        title: &str,
        technologies: &[&str],
        likes: i64,
        created_at: &str,
    ) -> Project {
        Project {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            technologies: technologies.iter().map(|t| t.to_string()).collect(),
            user_id: "owner".to_string(),
            image_url: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            likes,
            version: 1,
        }
    }

    #[test]
    fn test_technologies_from_comma_text() {
        let parsed: TechnologyList = serde_json::from_str(r#""Go, Rust""#).unwrap();
        assert_eq!(parsed.as_slice(), ["Go", "Rust"]);
    }

    #[test]
    fn test_technologies_from_array_drop_blanks() {
        let parsed: TechnologyList = serde_json::from_str(r#"[" Go ", "", "Rust"]"#).unwrap();
        assert_eq!(parsed.into_vec(), vec!["Go".to_string(), "Rust".to_string()]);

        assert!(TechnologyList::parse(" , ,").as_slice().is_empty());
    }

    #[test]
    fn test_query_filters_on_title_and_technology() {
        let projects = vec![
            project("1", "Compiler", &["Rust"], 0, "2024-01-01T00:00:00.000000Z"),
            project("2", "Website", &["TypeScript"], 0, "2024-01-02T00:00:00.000000Z"),
        ];

        let by_tech = ProjectQuery {
            q: Some("rust".to_string()),
            ..Default::default()
        };
        let found = by_tech.apply(projects.clone());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");

        let by_title = ProjectQuery {
            q: Some("WEB".to_string()),
            ..Default::default()
        };
        assert_eq!(by_title.apply(projects)[0].id, "2");
    }

    #[test]
    fn test_sort_orders() {
        let projects = vec![
            project("a", "beta", &[], 5, "2024-01-01T00:00:00.000000Z"),
            project("b", "Alpha", &[], 1, "2024-01-03T00:00:00.000000Z"),
            project("c", "gamma", &[], 9, "2024-01-02T00:00:00.000000Z"),
        ];

        let ids = |sort: ProjectSort| -> Vec<String> {
            ProjectQuery {
                sort,
                ..Default::default()
            }
            .apply(projects.clone())
            .into_iter()
            .map(|p| p.id)
            .collect()
        };

        assert_eq!(ids(ProjectSort::Newest), ["b", "c", "a"]);
        assert_eq!(ids(ProjectSort::Oldest), ["a", "c", "b"]);
        assert_eq!(ids(ProjectSort::MostLiked), ["c", "a", "b"]);
        assert_eq!(ids(ProjectSort::Title), ["b", "a", "c"]);
    }
}
