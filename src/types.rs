use serde::{Deserialize, Serialize};

/// One retrievable unit of text from the document corpus
///
/// Position `i` in the persisted metadata array always corresponds to vector
/// `i` in the index. The `text` field is retained in the persisted metadata:
/// consumers concatenate it into LLM context blocks, so dropping it would
/// break the consumer contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Deterministic id: `{source_stem}-p{page}-s{segment}` (both 1-based)
    pub chunk_id: String,
    /// Filename of the originating document
    pub source: String,
    /// Directory path of the source, relative to the corpus root
    pub path: String,
    /// 1-based page number within the source document
    pub page: usize,
    /// First non-empty line of the chunk, used as a display label
    pub title: String,
    /// Raw chunk text content
    pub text: String,
    /// Topic classification ("general" when undetermined)
    #[serde(default)]
    pub main_topic: String,
    /// Industry classification ("cross_industry" when undetermined)
    #[serde(default)]
    pub industry: String,
    /// Region classification ("unknown" when undetermined)
    #[serde(default)]
    pub region: String,
    /// Detected language ("zh" or "en")
    #[serde(default)]
    pub language: String,
}

impl ChunkRecord {
    /// Build the partial record the extractor emits before enrichment
    pub fn partial(
        source_stem: &str,
        source: String,
        path: String,
        page: usize,
        segment: usize,
        title: String,
        text: String,
    ) -> Self {
        Self {
            chunk_id: format!("{source_stem}-p{page}-s{segment}"),
            source,
            path,
            page,
            title,
            text,
            main_topic: String::new(),
            industry: String::new(),
            region: String::new(),
            language: String::new(),
        }
    }
}

/// A single query result: a chunk record and its similarity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched chunk record
    pub record: ChunkRecord,
    /// Inner-product similarity against the query vector (higher is closer)
    pub score: f32,
}

/// Summary of one builder run over the corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    /// Number of documents found under the corpus root
    pub files_scanned: usize,
    /// Number of documents processed in this run
    pub files_processed: usize,
    /// Number of documents skipped because the ledger already records them
    pub files_skipped: usize,
    /// Number of documents that failed extraction or embedding
    pub files_failed: usize,
    /// Number of chunks embedded and added to the index
    pub chunks_indexed: usize,
    /// Number of chunks dropped because embedding failed
    pub chunks_failed: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
    /// Non-fatal errors encountered during the run
    #[serde(default)]
    pub errors: Vec<String>,
}
