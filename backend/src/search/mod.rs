//! Tantivy-based search index module.
//!
//! Provides full-text search over projects with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Project;

/// Field boost values.
const BOOST_TITLE: f32 = 10.0;
const BOOST_TECHNOLOGIES: f32 = 8.0;
const BOOST_DESCRIPTION: f32 = 5.0;

/// Search hit with relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub project_id: String,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    project_id: Field,
    title: Field,
    technologies: Field,
    description: Field,
}

/// Tantivy search index for projects.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        // Define schema
        let mut schema_builder = Schema::builder();
        let project_id = schema_builder.add_text_field("project_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let technologies = schema_builder.add_text_field("technologies", TEXT);
        let description = schema_builder.add_text_field("description", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            project_id,
            title,
            technologies,
            description,
        };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from projects.
    pub async fn rebuild(&self, projects: &[Project]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for project in projects {
            writer.add_document(self.create_document(project))?;
        }
        writer.commit()?;

        // Reload reader to see new documents
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} projects", projects.len());
        Ok(())
    }

    /// Index a single project, replacing any previous document for it.
    pub async fn index_project(&self, project: &Project) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.project_id, &project.id);
        writer.delete_term(term);
        writer.add_document(self.create_document(project))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Remove a project from the index.
    pub async fn remove_project(&self, project_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.project_id, project_id);
        writer.delete_term(term);
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for projects. Returns one page of hits and the total hit count.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<SearchResult>, usize), AppError> {
        if query_str.trim().is_empty() {
            return Ok((Vec::new(), 0));
        }

        let searcher = self.reader.searcher();

        // One boosted clause per field, combined with OR semantics
        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.technologies, BOOST_TECHNOLOGIES),
            (self.fields.description, BOOST_DESCRIPTION),
        ];

        let subqueries: Vec<(Occur, Box<dyn Query>)> = field_queries
            .into_iter()
            .map(|(field, boost)| {
                // Lenient parsing so input like "C++" still searches
                let (field_query, _) =
                    QueryParser::for_index(&self.index, vec![field]).parse_query_lenient(query_str);
                (
                    Occur::Should,
                    Box::new(BoostQuery::new(field_query, boost)) as Box<dyn Query>,
                )
            })
            .collect();
        let combined_query = BooleanQuery::new(subqueries);

        // TopDocs needs a non-zero limit; an empty page still reports the total
        if limit == 0 {
            let total = searcher
                .search(&combined_query, &Count)
                .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;
            return Ok((Vec::new(), total));
        }

        // Execute search with pagination
        let (top_docs, total) = searcher
            .search(
                &combined_query,
                &(TopDocs::with_limit(offset.saturating_add(limit)), Count),
            )
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let project_id = doc.get_first(self.fields.project_id)?.as_str()?.to_string();
                Some(SearchResult { project_id, score })
            })
            .collect();

        Ok((results, total))
    }

    fn create_document(&self, project: &Project) -> TantivyDocument {
        doc!(
            self.fields.project_id => project.id.clone(),
            self.fields.title => project.title.clone(),
            self.fields.technologies => project.technologies.join(" "),
            self.fields.description => project.description.clone()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_project(
        id: &str,
        title: &str,
        technologies: &[&str],
        description: &str,
    ) -> Project {
        Project {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            technologies: technologies.iter().map(|t| t.to_string()).collect(),
            user_id: "owner".to_string(),
            image_url: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
            likes: 0,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_title_outranks_description() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let projects = vec![
            create_test_project("1", "Weather app", &["Go"], "Uses a rust colored theme"),
            create_test_project("2", "Rust compiler", &["C"], "A toy compiler"),
            create_test_project("3", "Todo list", &["TypeScript"], "Plain todo list"),
        ];
        index.rebuild(&projects).await.unwrap();

        let (results, total) = index.search("rust", 10, 0).unwrap();
        assert_eq!(total, 2);
        assert_eq!(results[0].project_id, "2");
        assert_eq!(results[1].project_id, "1");
    }

    #[tokio::test]
    async fn test_zero_limit_and_paging() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let projects = vec![
            create_test_project("1", "Rust parser", &["Rust"], ""),
            create_test_project("2", "Rust server", &["Rust"], ""),
        ];
        index.rebuild(&projects).await.unwrap();

        let (results, total) = index.search("rust", 0, 0).unwrap();
        assert!(results.is_empty());
        assert_eq!(total, 2);

        let (results, total) = index.search("rust", 1, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(total, 2);

        let (results, _) = index.search("rust", 10, 5).unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let mut project = create_test_project("1", "Chat server", &["Elixir"], "");
        index.index_project(&project).await.unwrap();
        assert_eq!(index.search("elixir", 10, 0).unwrap().1, 1);

        project.technologies = vec!["Rust".to_string()];
        index.index_project(&project).await.unwrap();
        assert_eq!(index.search("elixir", 10, 0).unwrap().1, 0);
        assert_eq!(index.search("rust", 10, 0).unwrap().1, 1);

        index.remove_project("1").await.unwrap();
        assert_eq!(index.search("chat", 10, 0).unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_search_empty_and_odd_queries() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let (results, total) = index.search("", 10, 0).unwrap();
        assert!(results.is_empty());
        assert_eq!(total, 0);

        assert!(index.search("C++ (", 10, 0).is_ok());
    }
}
