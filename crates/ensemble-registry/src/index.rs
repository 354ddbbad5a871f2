//! Embedding-based nearest-neighbor lookup over the registry's searchable
//! tools.

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::registry::{ToolRegistration, ToolRegistry};
use ensemble_core::EnsembleResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One search result: a registration and its similarity score.
#[derive(Clone)]
pub struct SearchHit {
    /// The matching registration.
    pub registration: Arc<ToolRegistration>,
    /// Cosine similarity against the query, in `[-1, 1]`.
    pub score: f32,
}

/// Semantic index over the registry's `searchable`-visibility entries.
///
/// Descriptions are embedded once and cached by tool name. Without a
/// configured provider the index reports zero results and the search
/// meta-tool is never advertised.
pub struct SemanticToolIndex {
    registry: Arc<ToolRegistry>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl SemanticToolIndex {
    /// Wraps a registry, optionally with an embedding provider.
    pub fn new(registry: Arc<ToolRegistry>, provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            registry,
            provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Whether search can surface anything under these tags: requires both a
    /// provider and at least one searchable registration.
    pub fn is_available(&self, tags: &[String]) -> bool {
        self.provider.is_some() && self.registry.has_searchable(tags)
    }

    /// Returns the searchable registrations under `tags` scoring at least
    /// `min_score` against `query`, sorted descending, truncated to
    /// `max_results`.
    pub async fn search(
        &self,
        query: &str,
        tags: &[String],
        max_results: usize,
        min_score: f32,
    ) -> EnsembleResult<Vec<SearchHit>> {
        let Some(provider) = &self.provider else {
            return Ok(Vec::new());
        };

        let candidates = self.registry.lookup_searchable(tags);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = provider.embed(query).await?;

        let mut hits = Vec::new();
        for registration in candidates {
            let embedded = self.embedded_description(provider, &registration).await?;
            let score = cosine_similarity(&query_vec, &embedded);
            if score >= min_score {
                hits.push(SearchHit {
                    registration,
                    score,
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(max_results);

        debug!(
            query = %query,
            results = hits.len(),
            min_score = min_score,
            "Semantic tool search"
        );

        Ok(hits)
    }

    async fn embedded_description(
        &self,
        provider: &Arc<dyn EmbeddingProvider>,
        registration: &Arc<ToolRegistration>,
    ) -> EnsembleResult<Vec<f32>> {
        if let Some(cached) = self.cache.read().get(registration.name()) {
            return Ok(cached.clone());
        }

        let spec = registration.specification();
        let text = format!("{} {}", spec.name(), spec.description());
        let vector = provider.embed(&text).await?;
        self.cache
            .write()
            .insert(registration.name().to_string(), vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::LocalEmbedding;
    use crate::registry::{LocalTool, Visibility};
    use ensemble_core::{EnsembleResult, ToolCall, ToolResult, ToolSpecification};
    use async_trait::async_trait;

    struct DummyTool {
        spec: ToolSpecification,
    }

    #[async_trait]
    impl LocalTool for DummyTool {
        fn specification(&self) -> &ToolSpecification {
            &self.spec
        }
        async fn execute(&self, call: ToolCall) -> EnsembleResult<ToolResult> {
            Ok(ToolResult::success(&call.id, "ok"))
        }
    }

    fn searchable(registry: &ToolRegistry, name: &str, description: &str, tag: &str) {
        let tool = Arc::new(DummyTool {
            spec: ToolSpecification::new(name, description),
        });
        let registration =
            Arc::new(ToolRegistration::new(tool, vec![tag.into()], Visibility::Searchable).unwrap());
        registry.register(registration);
    }

    fn index_with_provider(registry: Arc<ToolRegistry>) -> SemanticToolIndex {
        SemanticToolIndex::new(registry, Some(Arc::new(LocalEmbedding::default())))
    }

    #[tokio::test]
    async fn results_honor_min_score_and_ordering() {
        let registry = Arc::new(ToolRegistry::new());
        searchable(&registry, "get_user_by_id", "Retrieve a user record by its id", "user");
        searchable(&registry, "delete_user", "Delete a user record permanently", "user");
        searchable(&registry, "sum_numbers", "Add two numbers together", "user");

        let index = index_with_provider(registry);
        let hits = index
            .search("find user by id", &["user".to_string()], 10, 0.0)
            .await
            .unwrap();

        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].registration.name(), "get_user_by_id");

        let strict = index
            .search("find user by id", &["user".to_string()], 10, 0.99)
            .await
            .unwrap();
        for hit in &strict {
            assert!(hit.score >= 0.99);
        }
    }

    #[tokio::test]
    async fn max_results_truncates() {
        let registry = Arc::new(ToolRegistry::new());
        for i in 0..5 {
            searchable(
                &registry,
                &format!("user_tool_{i}"),
                "Work with user records",
                "user",
            );
        }
        let index = index_with_provider(registry);
        let hits = index
            .search("user records", &["user".to_string()], 2, 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn no_provider_means_no_results() {
        let registry = Arc::new(ToolRegistry::new());
        searchable(&registry, "get_user_by_id", "Retrieve a user by id", "user");

        let index = SemanticToolIndex::new(registry, None);
        assert!(!index.is_available(&["user".to_string()]));
        let hits = index
            .search("find user", &["user".to_string()], 10, 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn availability_requires_a_searchable_match() {
        let registry = Arc::new(ToolRegistry::new());
        searchable(&registry, "get_user_by_id", "Retrieve a user by id", "user");

        let index = index_with_provider(registry);
        assert!(index.is_available(&["user".to_string()]));
        assert!(!index.is_available(&["math".to_string()]));
    }
}
