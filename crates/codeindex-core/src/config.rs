use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CodeIndexError;

/// File name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".codeindex.toml";

/// Default Ollama endpoint used by both gateways.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Top-level configuration loaded from `.codeindex.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use codeindex_core::CodeIndexConfig;
///
/// let config = CodeIndexConfig::default();
/// assert_eq!(config.search.top_k, 5);
/// assert_eq!(config.embedding.model, "nomic-embed-text");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeIndexConfig {
    /// Embedding backend settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Text-generation backend settings, used for LLM reranking.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Chunk sizing.
    #[serde(default)]
    pub chunking: ChunkConfig,
    /// Directory walk and embedding behavior while indexing.
    #[serde(default)]
    pub indexing: IndexingConfig,
    /// Search and rerank defaults.
    #[serde(default)]
    pub search: SearchConfig,
}

impl CodeIndexConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Io`] if the file cannot be read, or
    /// [`CodeIndexError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codeindex_core::CodeIndexConfig;
    /// use std::path::Path;
    ///
    /// let config = CodeIndexConfig::from_file(Path::new(".codeindex.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CodeIndexError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeindex_core::CodeIndexConfig;
    ///
    /// let toml = r#"
    /// [chunking]
    /// max_chunk_size = 400
    /// "#;
    /// let config = CodeIndexConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.chunking.max_chunk_size, 400);
    /// assert_eq!(config.chunking.overlap_size, 200);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CodeIndexError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolve configuration for a project directory.
    ///
    /// An explicit `path` must exist. Otherwise `<dir>/.codeindex.toml` is
    /// used when present, falling back to defaults. Environment overrides
    /// are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn resolve(path: Option<&Path>, dir: &Path) -> Result<Self, CodeIndexError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = dir.join(CONFIG_FILE_NAME);
                if local.is_file() {
                    Self::from_file(&local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `OLLAMA_URL` and `OLLAMA_MODEL` overrides read through `lookup`.
    ///
    /// `OLLAMA_URL` only affects sections whose provider is `ollama`;
    /// `OLLAMA_MODEL` sets the embedding model.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeindex_core::CodeIndexConfig;
    ///
    /// let mut config = CodeIndexConfig::default();
    /// config.apply_env_from(|key| match key {
    ///     "OLLAMA_URL" => Some("http://gpu-box:11434".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.embedding.base_url.as_deref(), Some("http://gpu-box:11434"));
    /// ```
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_URL").filter(|v| !v.is_empty()) {
            if self.embedding.provider == "ollama" {
                self.embedding.base_url = Some(url.clone());
            }
            if self.generation.provider == "ollama" {
                self.generation.base_url = Some(url);
            }
        }
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.is_empty()) {
            tracing::debug!(model = %model, "embedding model overridden from environment");
            self.embedding.model = model;
        }
    }
}

/// Embedding backend configuration.
///
/// # Examples
///
/// ```
/// use codeindex_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "ollama");
/// assert_eq!(config.model, "nomic-embed-text");
/// assert!(config.base_url.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: `"ollama"`, `"voyage"` or `"openai"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Custom base URL; the provider default is used when unset.
    pub base_url: Option<String>,
    /// API key for hosted providers.
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "ollama".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Provider name: `"ollama"` or `"openai"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier (default: `"qwen2.5:1.5b"`).
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Custom base URL; the provider default is used when unset.
    pub base_url: Option<String>,
    /// API key for hosted providers.
    pub api_key: Option<String>,
}

fn default_generation_model() -> String {
    "qwen2.5:1.5b".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Size limits for splitting files into chunks, measured in characters.
///
/// # Examples
///
/// ```
/// use codeindex_core::ChunkConfig;
///
/// let config = ChunkConfig::default();
/// assert_eq!(config.max_chunk_size, 1000);
/// assert_eq!(config.overlap_size, 200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Upper bound on the characters accumulated before a chunk is emitted.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_overlap_size() -> usize {
    200
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap_size: default_overlap_size(),
        }
    }
}

/// Directory walk and embedding settings used while indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Extra directory names to skip, on top of the built-in list.
    #[serde(default)]
    pub skip_dirs: Vec<String>,
    /// Honor `.gitignore` files (default: false).
    #[serde(default)]
    pub respect_gitignore: bool,
    /// Files larger than this many bytes are skipped (default: 1 MiB).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Embedding requests in flight per file (default: 1).
    #[serde(default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_embedding_concurrency() -> usize {
    1
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            skip_dirs: Vec::new(),
            respect_gitignore: false,
            max_file_bytes: default_max_file_bytes(),
            embedding_concurrency: default_embedding_concurrency(),
        }
    }
}

/// Search and rerank defaults.
///
/// # Examples
///
/// ```
/// use codeindex_core::SearchConfig;
///
/// let config = SearchConfig::default();
/// assert_eq!(config.min_similarity, 0.3);
/// assert_eq!(config.max_results_for_llm, 10);
/// assert!(!config.use_llm_rerank);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned per query (default: 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Similarity threshold below which results are dropped (default: 0.3).
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    /// Ask the generation backend to score results (default: false).
    #[serde(default)]
    pub use_llm_rerank: bool,
    /// Maximum results sent to the generation backend (default: 10).
    #[serde(default = "default_max_results_for_llm")]
    pub max_results_for_llm: usize,
    /// Weight of the vector similarity in the blended score (default: 0.4).
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,
    /// Weight of the LLM score in the blended score (default: 0.6).
    #[serde(default = "default_llm_weight")]
    pub llm_weight: f64,
    /// Score assumed for snippets the model did not score (default: 0.5).
    #[serde(default = "default_missing_llm_score")]
    pub missing_llm_score: f64,
}

fn default_top_k() -> usize {
    5
}

fn default_min_similarity() -> f64 {
    0.3
}

fn default_max_results_for_llm() -> usize {
    10
}

fn default_similarity_weight() -> f64 {
    0.4
}

fn default_llm_weight() -> f64 {
    0.6
}

fn default_missing_llm_score() -> f64 {
    0.5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            use_llm_rerank: false,
            max_results_for_llm: default_max_results_for_llm(),
            similarity_weight: default_similarity_weight(),
            llm_weight: default_llm_weight(),
            missing_llm_score: default_missing_llm_score(),
        }
    }
}
