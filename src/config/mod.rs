/// Configuration system for esg-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Corpus and output locations
    pub corpus: CorpusConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Chunk splitter configuration
    pub chunking: ChunkingConfig,

    /// Metadata enrichment rule tables
    pub enrichment: EnrichmentConfig,

    /// Builder behavior
    pub build: BuildConfig,

    /// Query configuration
    pub search: SearchConfig,
}

/// Corpus and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Root directory of the PDF corpus (walked recursively)
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,

    /// Directory holding the persisted index, ledger and build log
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Embedding provider configuration
///
/// The same provider/model/dimension must be used for index build and query;
/// the index records them in its provenance file and the loader enforces the
/// dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider backend: "fastembed" (local) or "openai" (hosted API)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name (e.g., "all-MiniLM-L6-v2", "text-embedding-3-small")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Embedding dimensionality
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for one embedding batch
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Base URL for the hosted provider (OpenAI-compatible)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable holding the hosted provider's API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum retries for transient hosted-provider failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// Chunk splitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Preferred split separators, coarse to fine; separators are retained
    /// in the emitted chunks
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

/// One ordered classification rule: first matching rule wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Classification label assigned on match
    pub label: String,
    /// Keywords searched (case-insensitive) in chunk text and file stem
    pub keywords: Vec<String>,
}

/// Maps a path component to a region label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMarker {
    /// Directory component to look for
    pub component: String,
    /// Region label assigned when the component is present
    pub region: String,
}

/// Metadata enrichment rule tables
///
/// These tables are replaceable configuration, not hard-coded logic; the
/// defaults mirror the corpus layout this system ships with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Ordered topic rules, first match wins
    #[serde(default = "default_topic_rules")]
    pub topic_rules: Vec<KeywordRule>,

    /// Ordered industry rules, first match wins
    #[serde(default = "default_industry_rules")]
    pub industry_rules: Vec<KeywordRule>,

    /// Path components that determine the region
    #[serde(default = "default_region_markers")]
    pub region_markers: Vec<PathMarker>,

    /// Path component whose following component names the topic directly
    #[serde(default = "default_topic_path_marker")]
    pub topic_path_marker: String,

    /// Path component marking case-study documents (industry rules apply
    /// only under it)
    #[serde(default = "default_case_marker")]
    pub case_marker: String,

    /// CJK character ratio above which text is classified as "zh"
    #[serde(default = "default_cjk_threshold")]
    pub cjk_threshold: f32,
}

/// Builder behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Persist index and ledger after every file (safer) instead of once at
    /// end-of-run (faster, less crash-safe)
    #[serde(default = "default_flush_per_file")]
    pub flush_per_file: bool,

    /// Fail the whole file when any chunk's embedding fails, so the next run
    /// retries it; default is to drop the failing chunk and log it
    #[serde(default)]
    pub abort_file_on_embed_error: bool,

    /// Wall-clock budget in seconds for extracting and embedding one file
    #[serde(default = "default_file_timeout")]
    pub file_timeout_secs: u64,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

// Default value functions
fn default_corpus_root() -> PathBuf {
    PathBuf::from("data/db_pdf_data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/vector_output")
}

fn default_provider() -> String {
    "fastembed".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_chunk_size() -> usize {
    400
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", "。", ".", "!", "?", "！", "？"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn keyword_rule(label: &str, keywords: &[&str]) -> KeywordRule {
    KeywordRule {
        label: label.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn default_topic_rules() -> Vec<KeywordRule> {
    vec![
        keyword_rule("sustainability", &["sustainability", "esg", "永續", "環境"]),
        keyword_rule("climate", &["climate", "carbon", "氣候", "碳"]),
        keyword_rule("governance", &["governance", "compliance", "治理", "法遵"]),
        keyword_rule("social", &["social", "community", "社會", "社區"]),
    ]
}

fn default_industry_rules() -> Vec<KeywordRule> {
    vec![
        keyword_rule("retail", &["retail", "shopping", "零售", "商場"]),
        keyword_rule("manufacturing", &["manufacturing", "factory", "製造", "工廠"]),
        keyword_rule("technology", &["technology", "software", "科技", "軟體"]),
        keyword_rule("finance", &["banking", "finance", "金融", "銀行"]),
        keyword_rule("energy", &["energy", "power", "能源", "電力"]),
        keyword_rule("healthcare", &["healthcare", "medical", "醫療", "健康"]),
    ]
}

fn default_region_markers() -> Vec<PathMarker> {
    vec![
        PathMarker {
            component: "taiwan".to_string(),
            region: "taiwan".to_string(),
        },
        PathMarker {
            component: "international".to_string(),
            region: "global".to_string(),
        },
    ]
}

fn default_topic_path_marker() -> String {
    "international".to_string()
}

fn default_case_marker() -> String {
    "cases".to_string()
}

fn default_cjk_threshold() -> f32 {
    0.1
}

fn default_flush_per_file() -> bool {
    true
}

fn default_file_timeout() -> u64 {
    300
}

fn default_top_k() -> usize {
    5
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_name: default_model_name(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            topic_rules: default_topic_rules(),
            industry_rules: default_industry_rules(),
            region_markers: default_region_markers(),
            topic_path_marker: default_topic_path_marker(),
            case_marker: default_case_marker(),
            cjk_threshold: default_cjk_threshold(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            flush_per_file: default_flush_per_file(),
            abort_file_on_embed_error: false,
            file_timeout_secs: default_file_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Default config file location: {config_dir}/esg-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("esg-rag")
            .join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding.provider != "fastembed" && self.embedding.provider != "openai" {
            return Err(ConfigError::InvalidValue {
                key: "embedding.provider".to_string(),
                reason: format!(
                    "must be 'fastembed' or 'openai', got '{}'",
                    self.embedding.provider
                ),
            }
            .into());
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.dimension".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunking.chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunking.chunk_overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({}), got {}",
                    self.chunking.chunk_size, self.chunking.chunk_overlap
                ),
            }
            .into());
        }

        if self.chunking.separators.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chunking.separators".to_string(),
                reason: "must list at least one separator".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.enrichment.cjk_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "enrichment.cjk_threshold".to_string(),
                reason: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.enrichment.cjk_threshold
                ),
            }
            .into());
        }

        if self.build.file_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "build.file_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.search.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.top_k".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("ESG_RAG_CORPUS_ROOT") {
            self.corpus.root = PathBuf::from(root);
        }

        if let Ok(dir) = std::env::var("ESG_RAG_OUTPUT_DIR") {
            self.corpus.output_dir = PathBuf::from(dir);
        }

        if let Ok(provider) = std::env::var("ESG_RAG_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("ESG_RAG_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(dimension) = std::env::var("ESG_RAG_DIMENSION")
            && let Ok(dim) = dimension.parse()
        {
            self.embedding.dimension = dim;
        }

        if let Ok(batch_size) = std::env::var("ESG_RAG_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.embedding.batch_size = size;
        }

        if let Ok(top_k) = std::env::var("ESG_RAG_TOP_K")
            && let Ok(k) = top_k.parse()
        {
            self.search.top_k = k;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
