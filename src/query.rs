//! Query service over a built vector index
//!
//! Embeds a free-text question with the same provider the index was built
//! with and returns the top-k chunk records by descending similarity. An
//! unbuilt knowledge base is a distinct, reportable condition - callers can
//! tell "run the builder first" apart from "no relevant matches".

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexError, RagError};
use crate::index::VectorIndex;
use crate::types::SearchHit;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct QueryService {
    index_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_timeout_secs: u64,
    /// Lazily loaded and then reused across queries
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl QueryService {
    pub fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index_dir: config.corpus.output_dir.clone(),
            embedder,
            embed_timeout_secs: config.embedding.timeout_secs,
            index: RwLock::new(None),
        }
    }

    /// True when the knowledge base artifacts are all present on disk
    pub fn is_ready(&self) -> bool {
        VectorIndex::exists(&self.index_dir)
    }

    /// Top-k chunk records for a question, ordered by descending score
    ///
    /// Returns `IndexError::NotBuilt` when the knowledge base does not exist
    /// yet; an existing index with no relevant chunks yields an empty list.
    pub async fn query(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>, RagError> {
        let index = self.ensure_loaded().await?;
        let query_vector = self.embed_question(question).await?;

        let hits = index.search(&query_vector, top_k)?;
        Ok(hits
            .into_iter()
            .map(|(record, score)| SearchHit { record, score })
            .collect())
    }

    /// Concatenated context block for prompt assembly
    ///
    /// Joins the matched chunk texts with blank lines; the consumer owns
    /// everything beyond that (prompt templates, tone, the LLM call).
    pub async fn context(&self, question: &str, top_k: usize) -> Result<String, RagError> {
        let hits = self.query(question, top_k).await?;
        Ok(hits
            .iter()
            .map(|hit| hit.record.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn ensure_loaded(&self) -> Result<Arc<VectorIndex>, RagError> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }

        if !VectorIndex::exists(&self.index_dir) {
            return Err(IndexError::NotBuilt(self.index_dir.display().to_string()).into());
        }

        let dir = self.index_dir.clone();
        let dimension = self.embedder.dimension();
        let model = self.embedder.model_name().to_string();
        let index = tokio::task::spawn_blocking(move || VectorIndex::load(&dir, dimension, &model))
            .await
            .map_err(|e| RagError::other(format!("Index load task panicked: {}", e)))??;

        let index = Arc::new(index);
        *slot = Some(index.clone());
        Ok(index)
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, RagError> {
        let embedder = self.embedder.clone();
        let text = question.to_string();
        let work = tokio::task::spawn_blocking(move || embedder.embed_batch(vec![text]));

        match tokio::time::timeout(Duration::from_secs(self.embed_timeout_secs), work).await {
            Ok(Ok(Ok(vectors))) if vectors.len() == 1 => {
                vectors.into_iter().next().ok_or_else(|| {
                    EmbeddingError::GenerationFailed("provider returned no vector".to_string())
                        .into()
                })
            }
            Ok(Ok(Ok(vectors))) => Err(EmbeddingError::GenerationFailed(format!(
                "provider returned {} vectors for one question",
                vectors.len()
            ))
            .into()),
            Ok(Ok(Err(e))) => Err(EmbeddingError::GenerationFailed(format!("{e:#}")).into()),
            Ok(Err(e)) => Err(RagError::other(format!("Embedding task panicked: {}", e))),
            Err(_) => Err(EmbeddingError::Timeout(self.embed_timeout_secs).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkRecord;
    use anyhow::Result;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct MockEmbedder {
        dimension: usize,
        fail_marker: Option<String>,
    }

    impl MockEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                fail_marker: None,
            }
        }
    }

    fn mock_vector(text: &str, dimension: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dimension];
        for (i, b) in text.bytes().enumerate() {
            v[(b as usize + i) % dimension] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    impl EmbeddingProvider for MockEmbedder {
        fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            if let Some(marker) = &self.fail_marker
                && texts.iter().any(|t| t.contains(marker))
            {
                anyhow::bail!("simulated embedding outage");
            }
            Ok(texts
                .iter()
                .map(|t| mock_vector(t, self.dimension))
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "mock-embedder"
        }
    }

    const DIM: usize = 64;

    fn record(id: &str, text: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            source: "doc.pdf".to_string(),
            path: "taiwan".to_string(),
            page: 1,
            title: String::new(),
            text: text.to_string(),
            main_topic: "climate".to_string(),
            industry: "cross_industry".to_string(),
            region: "taiwan".to_string(),
            language: "zh".to_string(),
        }
    }

    fn config_for(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.corpus.output_dir = dir.path().to_path_buf();
        config.embedding.dimension = DIM;
        config
    }

    /// Persist an index whose vectors come from the mock embedder
    fn build_index(dir: &TempDir, chunks: &[(&str, &str)]) {
        let mut index = VectorIndex::new(DIM, "mock-embedder");
        let vectors: Vec<Vec<f32>> = chunks.iter().map(|(_, t)| mock_vector(t, DIM)).collect();
        let records: Vec<ChunkRecord> = chunks.iter().map(|(id, t)| record(id, t)).collect();
        index.add(vectors, records).unwrap();
        index.save(dir.path()).unwrap();
    }

    #[tokio::test]
    async fn test_query_before_build_reports_not_ready() {
        let dir = TempDir::new().unwrap();
        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));

        assert!(!service.is_ready());
        let err = service.query("anything", 5).await.unwrap_err();
        assert!(err.is_not_built());
    }

    #[tokio::test]
    async fn test_relevant_chunk_ranks_above_unrelated() {
        let dir = TempDir::new().unwrap();
        let question = "what is scope 3 emissions";
        build_index(
            &dir,
            &[
                ("scope3-p1-s1", "what is scope 3 emissions 範疇三"),
                ("noise-p1-s1", "zzzz qqqq xxxx completely different topic"),
            ],
        );

        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));
        assert!(service.is_ready());

        let hits = service.query(question, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.chunk_id, "scope3-p1-s1");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[0].record.text.contains("範疇三"));
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_results() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(DIM, "mock-embedder");
        index.save(dir.path()).unwrap();

        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));
        let hits = service.query("any question", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_limits_results() {
        let dir = TempDir::new().unwrap();
        build_index(
            &dir,
            &[
                ("a", "alpha text"),
                ("b", "beta text"),
                ("c", "gamma text"),
                ("d", "delta text"),
            ],
        );

        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));
        let hits = service.query("alpha text", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_context_joins_chunk_texts() {
        let dir = TempDir::new().unwrap();
        build_index(&dir, &[("a", "First chunk."), ("b", "Second chunk.")]);

        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));
        let context = service.context("First chunk.", 2).await.unwrap();

        assert!(context.contains("First chunk."));
        assert!(context.contains("\n\n"));
        assert!(context.contains("Second chunk."));
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces_as_query_error() {
        let dir = TempDir::new().unwrap();
        build_index(&dir, &[("a", "some chunk")]);

        let embedder = MockEmbedder {
            dimension: DIM,
            fail_marker: Some("outage".to_string()),
        };
        let service = QueryService::new(&config_for(&dir), Arc::new(embedder));

        let err = service.query("trigger outage please", 3).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(!err.is_not_built());
    }

    #[tokio::test]
    async fn test_loaded_index_is_reused() {
        let dir = TempDir::new().unwrap();
        build_index(&dir, &[("a", "stable chunk")]);

        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM)));
        let first = service.query("stable chunk", 1).await.unwrap();

        // Removing the artifacts after the first load does not break
        // subsequent queries: the in-memory index is reused
        VectorIndex::remove_artifacts(dir.path()).unwrap();
        let second = service.query("stable chunk", 1).await.unwrap();

        assert_eq!(first[0].record.chunk_id, second[0].record.chunk_id);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_before_query() {
        let dir = TempDir::new().unwrap();
        build_index(&dir, &[("a", "chunk")]);

        // Reconfigured provider with a different dimensionality
        let service = QueryService::new(&config_for(&dir), Arc::new(MockEmbedder::new(DIM * 2)));
        let err = service.query("chunk", 1).await.unwrap_err();
        assert!(err.is_fatal_state());
    }
}
