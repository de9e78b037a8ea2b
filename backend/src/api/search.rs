//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::models::Project;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search result with projects and metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search result item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub project: Project,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// Deepest page start served; the collector buffers `offset + limit` hits.
const MAX_SEARCH_OFFSET: usize = 10_000;

/// GET /api/search - Full-text project search.
pub async fn search_projects(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);
    let offset = params.offset.min(MAX_SEARCH_OFFSET);

    let (hits, total) = state.search.search(&params.q, limit, offset)?;

    // Fetch full project data for each hit
    let mut results = Vec::new();
    for hit in hits {
        if let Some(project) = state.repo.get_project(&hit.project_id).await? {
            results.push(SearchResultItem {
                project,
                score: hit.score,
            });
        }
    }

    success(SearchResponse {
        results,
        total,
        limit,
        offset,
    })
}
