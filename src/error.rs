/// Centralized error types for esg-rag using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the retrieval subsystem
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading or chunking a source document
///
/// Recovered at file granularity: the builder logs the file identity and
/// moves on to the next document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read document '{file}': {reason}")]
    ReadFailed { file: String, reason: String },

    #[error("Processing document '{file}' timed out after {seconds} seconds")]
    Timeout { file: String, seconds: u64 },
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to the vector index and its persisted artifacts
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index is corrupt: {0}")]
    Corrupt(String),

    #[error("Vector dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Knowledge base has not been built yet at '{0}'")]
    NotBuilt(String),

    #[error("Failed to save index to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to load index from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error(
        "Embedding dimension mismatch: index was built with dimension {stored}, \
         but the configured provider produces dimension {configured}"
    )]
    DimensionMismatch { configured: usize, stored: usize },
}

// Conversion from anyhow::Error to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

// Helper methods for RagError
impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    /// Check if this error is retryable (transient network/timeout class)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::Embedding(EmbeddingError::Timeout(_))
                | RagError::Embedding(EmbeddingError::GenerationFailed(_))
                | RagError::Io(_)
        )
    }

    /// Check if this error means the knowledge base is missing rather than broken
    ///
    /// Callers use this to tell "run the builder first" apart from "query failed".
    pub fn is_not_built(&self) -> bool {
        matches!(self, RagError::Index(IndexError::NotBuilt(_)))
    }

    /// Check if this error is fatal index/config state (requires an explicit rebuild)
    pub fn is_fatal_state(&self) -> bool {
        matches!(
            self,
            RagError::Index(IndexError::Corrupt(_))
                | RagError::Config(ConfigError::DimensionMismatch { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Document(DocumentError::ReadFailed {
            file: "report.pdf".to_string(),
            reason: "bad xref table".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Document error: Failed to read document 'report.pdf': bad xref table"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let rag_err: RagError = io_err.into();
        assert!(matches!(rag_err, RagError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let rag_err: RagError = anyhow_err.into();
        assert!(matches!(rag_err, RagError::Other(_)));
    }

    #[test]
    fn test_is_retryable() {
        let retryable = RagError::Embedding(EmbeddingError::Timeout(30));
        assert!(retryable.is_retryable());

        let not_retryable =
            RagError::Index(IndexError::Corrupt("metadata count mismatch".to_string()));
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_is_not_built() {
        let missing = RagError::Index(IndexError::NotBuilt("data/vector_output".to_string()));
        assert!(missing.is_not_built());
        assert!(!missing.is_fatal_state());

        let other = RagError::other("anything else");
        assert!(!other.is_not_built());
    }

    #[test]
    fn test_is_fatal_state() {
        let corrupt = RagError::Index(IndexError::Corrupt("truncated payload".to_string()));
        assert!(corrupt.is_fatal_state());

        let mismatch = RagError::Config(ConfigError::DimensionMismatch {
            configured: 1536,
            stored: 384,
        });
        assert!(mismatch.is_fatal_state());
        assert!(!mismatch.is_retryable());
    }

    #[test]
    fn test_embedding_error_dimension_mismatch() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 384, got 512"
        );
    }

    #[test]
    fn test_config_error_dimension_mismatch() {
        let err = ConfigError::DimensionMismatch {
            configured: 1536,
            stored: 384,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: index was built with dimension 384, \
             but the configured provider produces dimension 1536"
        );
    }

    #[test]
    fn test_error_chain() {
        let embedding_err = EmbeddingError::GenerationFailed("model error".to_string());
        let rag_err: RagError = embedding_err.into();
        assert!(matches!(rag_err, RagError::Embedding(_)));
        assert_eq!(
            rag_err.to_string(),
            "Embedding error: Failed to generate embeddings: model error"
        );
    }
}
