mod fastembed_manager;
mod openai;

pub use fastembed_manager::FastEmbedManager;
pub use openai::OpenAiEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::{ConfigError, EmbeddingError, RagError};
use anyhow::Result;
use std::sync::Arc;

/// Trait for embedding generation
///
/// Implementations return L2-normalized vectors, so inner product over them
/// is cosine similarity. The index build path and the query path must use
/// the same provider instance (same model, same dimensionality); providers
/// block on model inference or network IO, so callers run them on blocking
/// threads.
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Construct the provider selected by the configuration
///
/// Fails when the provider's actual dimensionality does not match the
/// configured one: an index built against the wrong dimension would be
/// unusable, so this is rejected up front.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "fastembed" => Arc::new(
            FastEmbedManager::with_model_name(&config.model_name).map_err(|e| {
                RagError::Embedding(EmbeddingError::InitializationFailed(format!("{e:#}")))
            })?,
        ),
        "openai" => Arc::new(OpenAiEmbedder::from_config(config).map_err(|e| {
            RagError::Embedding(EmbeddingError::InitializationFailed(format!("{e:#}")))
        })?),
        other => {
            return Err(ConfigError::InvalidValue {
                key: "embedding.provider".to_string(),
                reason: format!("unknown provider '{}'", other),
            }
            .into());
        }
    };

    if provider.dimension() != config.dimension {
        return Err(ConfigError::InvalidValue {
            key: "embedding.dimension".to_string(),
            reason: format!(
                "configured dimension {} does not match model '{}' dimension {}",
                config.dimension,
                provider.model_name(),
                provider.dimension()
            ),
        }
        .into());
    }

    Ok(provider)
}

/// Scale a vector to unit L2 norm in place; zero vectors are left unchanged
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
