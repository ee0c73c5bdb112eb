//! Tool implementations.
//!
//! Five tools are exposed: `index_directory`, `search_code`, `index_stats`,
//! `check_health` and `reload_index`. Each delegates to the indexer or the
//! reranker and returns a [`ToolResponse`]. JSON payloads are pretty-printed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use codeindex_core::{CodeIndexConfig, Result, SearchConfig};
use codeindex_lens::embedding::build_embedder;
use codeindex_lens::indexer::{Indexer, Progress};
use codeindex_lens::store::IndexStats;
use codeindex_rerank::format::{format_compact, format_results};
use codeindex_rerank::llm::{build_generator, GenerationGateway};
use codeindex_rerank::reranker::{Reranker, RerankerConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest raw candidate pool fetched before reranking.
const MIN_CANDIDATE_POOL: usize = 15;

/// Outcome of a tool call: payload text plus an error flag.
///
/// # Examples
///
/// ```
/// use codeindex_tools::tools::ToolResponse;
///
/// let ok = ToolResponse::success("done");
/// assert!(!ok.is_error);
/// let err = ToolResponse::error("path is required");
/// assert!(err.is_error);
/// assert_eq!(err.text, "path is required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// Payload: JSON for structured tools, plain text for search output.
    pub text: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(json) => Self::success(json),
            Err(e) => Self::error(format!("failed to encode response: {e}")),
        }
    }
}

// --- Parameter structs ---

/// Parameters for the `index_directory` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexDirectoryParams {
    /// Directory to index. Relative paths resolve against the working
    /// directory.
    pub path: Option<String>,
}

/// Parameters for the `search_code` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchCodeParams {
    /// Natural-language or code query.
    pub query: Option<String>,
    /// Results to return (default from config, 5). Values <= 0 use the
    /// default.
    pub top_k: Option<i64>,
    /// Similarity threshold, clamped to `[0, 1]` (default from config, 0.3).
    pub min_similarity: Option<f64>,
    /// Ask the generation backend to rescore results (default from config).
    pub use_rerank: Option<bool>,
    /// Cut each snippet to this many characters.
    pub max_content_length: Option<usize>,
    /// Print citations only, without code bodies.
    pub compact: Option<bool>,
}

// --- Response structs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexDirectoryResponse {
    success: bool,
    message: String,
    stats: IndexStats,
    #[serde(rename = "last_message")]
    last_message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReloadResponse {
    success: bool,
    message: String,
    stats: IndexStats,
}

/// The tool surface: an indexer, an optional generator for reranking and
/// search defaults.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use codeindex_core::SearchConfig;
/// use codeindex_lens::embedding::OllamaEmbeddings;
/// use codeindex_lens::indexer::Indexer;
/// use codeindex_tools::tools::CodeIndexTools;
///
/// let embedder = Arc::new(OllamaEmbeddings::new("http://localhost:11434", "nomic-embed-text").unwrap());
/// let indexer = Arc::new(Indexer::new(embedder, "."));
/// let tools = CodeIndexTools::new(indexer, None, SearchConfig::default());
/// ```
pub struct CodeIndexTools {
    indexer: Arc<Indexer>,
    generator: Option<Arc<dyn GenerationGateway>>,
    search: SearchConfig,
    working_dir: PathBuf,
}

impl std::fmt::Debug for CodeIndexTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndexTools")
            .field("indexer", &self.indexer)
            .field(
                "generator",
                &self.generator.as_ref().map(|g| g.model_name().to_string()),
            )
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl CodeIndexTools {
    /// Wrap an existing indexer. Relative tool paths resolve against the
    /// process working directory.
    pub fn new(
        indexer: Arc<Indexer>,
        generator: Option<Arc<dyn GenerationGateway>>,
        search: SearchConfig,
    ) -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            indexer,
            generator,
            search,
            working_dir,
        }
    }

    /// Build gateways, indexer and defaults from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`codeindex_core::CodeIndexError::Config`] for an unknown
    /// provider or a missing API key, and
    /// [`codeindex_core::CodeIndexError::Gateway`] if an HTTP client cannot
    /// be built.
    pub fn from_config(config: &CodeIndexConfig, working_dir: &Path) -> Result<Self> {
        let embedder = build_embedder(&config.embedding)?;
        let generator = build_generator(&config.generation)?;
        let indexer = Indexer::from_config(config, embedder, working_dir);
        Ok(Self::new(Arc::new(indexer), Some(generator), config.search.clone())
            .with_working_dir(working_dir))
    }

    /// Resolve relative tool paths against `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Index a directory, replacing any previous index for it.
    ///
    /// Progress messages go to `progress` as well as being summarised in the
    /// payload's `last_message`.
    pub async fn index_directory_with_progress(
        &self,
        params: IndexDirectoryParams,
        progress: Option<Progress<'_>>,
    ) -> ToolResponse {
        let Some(path) = params.path.filter(|p| !p.trim().is_empty()) else {
            return ToolResponse::error("path is required");
        };
        let root = self.resolve(&path);

        let last_message = Mutex::new(String::new());
        let record: Progress<'_> = &|message: &str| {
            if let Some(progress) = progress {
                progress(message);
            }
            *last_message.lock().unwrap_or_else(PoisonError::into_inner) = message.to_string();
        };

        match self.indexer.index_directory(&root, Some(record)).await {
            Ok(stats) => ToolResponse::json(&IndexDirectoryResponse {
                success: true,
                message: format!("Successfully indexed directory: {path}"),
                stats,
                last_message: last_message
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            }),
            Err(e) => ToolResponse::error(format!("failed to index directory: {e}")),
        }
    }

    /// Index a directory without a progress sink.
    pub async fn index_directory(&self, params: IndexDirectoryParams) -> ToolResponse {
        self.index_directory_with_progress(params, None).await
    }

    /// Search the active index, filter by similarity, optionally rerank and
    /// render the results as text.
    pub async fn search_code(&self, params: SearchCodeParams) -> ToolResponse {
        let Some(query) = params.query.filter(|q| !q.trim().is_empty()) else {
            return ToolResponse::error("query is required");
        };

        let top_k = match params.top_k {
            Some(k) if k > 0 => usize::try_from(k).unwrap_or(usize::MAX),
            _ => self.search.top_k.max(1),
        };
        let min_similarity = params
            .min_similarity
            .unwrap_or(self.search.min_similarity)
            .clamp(0.0, 1.0);
        let use_rerank = params.use_rerank.unwrap_or(self.search.use_llm_rerank);
        let pool = top_k.saturating_mul(3).max(MIN_CANDIDATE_POOL);

        let raw = match self.indexer.search(&query, pool).await {
            Ok(raw) => raw,
            Err(e) => return ToolResponse::error(format!("search failed: {e}")),
        };
        debug!(candidates = raw.len(), top_k, min_similarity, use_rerank, "search complete");

        let reranker = Reranker::new(
            RerankerConfig {
                min_similarity,
                use_llm_rerank: use_rerank,
                ..RerankerConfig::from(&self.search)
            },
            self.generator.clone(),
        );
        let (mut results, mut stats) = reranker.rerank(&query, &raw).await;
        results.truncate(top_k);
        stats.final_count = results.len();

        let text = if params.compact.unwrap_or(false) {
            format_compact(&results, &stats)
        } else {
            format_results(&results, &stats, params.max_content_length)
        };
        ToolResponse::success(text)
    }

    /// Statistics for the active index as JSON. Never fails: with no index
    /// available the counts are zero.
    pub async fn index_stats(&self) -> ToolResponse {
        ToolResponse::json(&self.indexer.stats().await)
    }

    /// Probe the embedding backend.
    pub async fn check_health(&self) -> ToolResponse {
        match self.indexer.check_health().await {
            Ok(()) => ToolResponse::success(format!(
                "Embedding backend is healthy and model '{}' is available",
                self.indexer.embedder().model_name()
            )),
            Err(e) => ToolResponse::error(format!("health check failed: {e}")),
        }
    }

    /// Re-read the active index from disk.
    pub async fn reload_index(&self) -> ToolResponse {
        match self.indexer.reload_index().await {
            Ok(stats) => ToolResponse::json(&ReloadResponse {
                success: true,
                message: "Index reloaded successfully".into(),
                stats,
            }),
            Err(e) => ToolResponse::error(format!("failed to reload index: {e}")),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeindex_lens::mock::{HashEmbedder, UnreachableEmbedder};
    use codeindex_rerank::mock::ScriptedGenerator;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/auth.rs"),
            "pub fn verify_password(hash: &str, password: &str) -> bool {\n    argon_verify(hash, password)\n}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("src/http.rs"),
            "pub async fn serve_http(port: u16) {\n    listen(port).await;\n}\n",
        )
        .unwrap();
        dir
    }

    fn tools_for(dir: &Path, generator: Option<Arc<dyn GenerationGateway>>) -> CodeIndexTools {
        let indexer = Indexer::new(Arc::new(HashEmbedder::new(128)), dir);
        CodeIndexTools::new(Arc::new(indexer), generator, SearchConfig::default())
            .with_working_dir(dir)
    }

    fn json(response: &ToolResponse) -> serde_json::Value {
        assert!(!response.is_error, "unexpected error: {}", response.text);
        serde_json::from_str(&response.text).unwrap()
    }

    #[tokio::test]
    async fn index_directory_requires_path() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        let response = tools.index_directory(IndexDirectoryParams::default()).await;
        assert_eq!(response, ToolResponse::error("path is required"));

        let response = tools
            .index_directory(IndexDirectoryParams {
                path: Some("  ".into()),
            })
            .await;
        assert!(response.is_error);
    }

    #[tokio::test]
    async fn index_directory_reports_stats_and_last_message() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        let seen = Mutex::new(Vec::new());
        let sink: Progress<'_> = &|m: &str| seen.lock().unwrap().push(m.to_string());

        let response = tools
            .index_directory_with_progress(
                IndexDirectoryParams {
                    path: Some(".".into()),
                },
                Some(sink),
            )
            .await;
        let payload = json(&response);

        assert_eq!(payload["success"], true);
        assert_eq!(payload["message"], "Successfully indexed directory: .");
        assert_eq!(payload["stats"]["totalFiles"], 2);
        assert_eq!(payload["stats"]["totalChunks"], 2);
        assert_eq!(payload["last_message"], "Indexed 2 chunks from 2 files");

        let seen = seen.into_inner().unwrap();
        assert!(seen.iter().any(|m| m == "Indexing: src/auth.rs"));
    }

    #[tokio::test]
    async fn index_directory_wraps_errors() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        let response = tools
            .index_directory(IndexDirectoryParams {
                path: Some("does-not-exist".into()),
            })
            .await;
        assert!(response.is_error);
        assert!(response.text.starts_with("failed to index directory: "));
    }

    #[tokio::test]
    async fn search_requires_query() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        let response = tools.search_code(SearchCodeParams::default()).await;
        assert_eq!(response, ToolResponse::error("query is required"));
    }

    #[tokio::test]
    async fn search_without_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tools = tools_for(dir.path(), None);
        let response = tools
            .search_code(SearchCodeParams {
                query: Some("password".into()),
                ..Default::default()
            })
            .await;
        assert!(response.is_error);
        assert!(response.text.starts_with("search failed: "));
    }

    #[tokio::test]
    async fn search_formats_relevant_results() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        tools
            .index_directory(IndexDirectoryParams {
                path: Some(".".into()),
            })
            .await;

        let response = tools
            .search_code(SearchCodeParams {
                query: Some("verify password hash".into()),
                top_k: Some(0),
                ..Default::default()
            })
            .await;
        assert!(!response.is_error, "{}", response.text);
        assert!(response.text.starts_with("Found 1 relevant result(s)"));
        assert!(response.text.contains("auth.rs (lines 1-3)"));
        assert!(!response.text.contains("serve_http"));
    }

    #[tokio::test]
    async fn search_top_k_truncates_and_compact_omits_code() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        tools
            .index_directory(IndexDirectoryParams {
                path: Some(".".into()),
            })
            .await;

        let response = tools
            .search_code(SearchCodeParams {
                query: Some("pub fn".into()),
                top_k: Some(1),
                min_similarity: Some(-3.0),
                compact: Some(true),
                ..Default::default()
            })
            .await;
        assert!(response.text.starts_with("Found 1 relevant result(s)"));
        assert!(response.text.contains("1. "));
        assert!(!response.text.contains("2. "));
        assert!(!response.text.contains("```"));
    }

    #[tokio::test]
    async fn search_with_rerank_consults_generator() {
        let dir = project();
        let generator = Arc::new(ScriptedGenerator::replying("[0.95, 0.1]"));
        let tools = tools_for(
            dir.path(),
            Some(Arc::clone(&generator) as Arc<dyn GenerationGateway>),
        );
        tools
            .index_directory(IndexDirectoryParams {
                path: Some(".".into()),
            })
            .await;

        let response = tools
            .search_code(SearchCodeParams {
                query: Some("pub fn".into()),
                min_similarity: Some(0.0),
                use_rerank: Some(true),
                ..Default::default()
            })
            .await;
        assert_eq!(generator.calls(), 1);
        assert!(response.text.contains("[LLM reranked]"));
        assert!(response.text.contains("llm: 0.950"));
    }

    #[tokio::test]
    async fn stats_before_and_after_indexing() {
        let dir = project();
        let tools = tools_for(dir.path(), None);

        let before = json(&tools.index_stats().await);
        assert_eq!(before["totalChunks"], 0);
        assert_eq!(before["modelName"], "mock-hash");

        tools
            .index_directory(IndexDirectoryParams {
                path: Some(".".into()),
            })
            .await;
        let after = json(&tools.index_stats().await);
        assert_eq!(after["totalFiles"], 2);
    }

    #[tokio::test]
    async fn health_reports_model() {
        let dir = project();
        let healthy = tools_for(dir.path(), None).check_health().await;
        assert_eq!(
            healthy,
            ToolResponse::success("Embedding backend is healthy and model 'mock-hash' is available")
        );

        let indexer = Indexer::new(Arc::new(UnreachableEmbedder::default()), dir.path());
        let tools = CodeIndexTools::new(Arc::new(indexer), None, SearchConfig::default());
        let sick = tools.check_health().await;
        assert!(sick.is_error);
        assert!(sick.text.starts_with("health check failed: "));
        assert!(sick.text.contains("mock-offline"));
    }

    #[tokio::test]
    async fn reload_without_index_fails_then_succeeds() {
        let dir = project();
        let tools = tools_for(dir.path(), None);
        let response = tools.reload_index().await;
        assert!(response.is_error);
        assert!(response.text.starts_with("failed to reload index: "));

        tools
            .index_directory(IndexDirectoryParams {
                path: Some(".".into()),
            })
            .await;
        let payload = json(&tools.reload_index().await);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["message"], "Index reloaded successfully");
        assert_eq!(payload["stats"]["totalChunks"], 2);
    }

    #[test]
    fn params_deserialize_from_tool_arguments() {
        let params: SearchCodeParams = serde_json::from_str(
            r#"{"query":"login","top_k":3,"min_similarity":0.5,"use_rerank":true}"#,
        )
        .unwrap();
        assert_eq!(params.query.as_deref(), Some("login"));
        assert_eq!(params.top_k, Some(3));
        assert_eq!(params.use_rerank, Some(true));
        assert!(params.compact.is_none());
    }
}
