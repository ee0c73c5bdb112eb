//! In-memory vector index with JSON persistence and upward discovery.
//!
//! Chunks and their embeddings are kept in a flat list and scanned linearly
//! at query time. Cosine similarity is computed in `f64`. The whole index is
//! written as a single JSON document under `<root>/.codeindex/index.json`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use codeindex_core::CodeIndexError;
use serde::{Deserialize, Serialize};

use crate::chunker::CodeChunk;

/// Directory holding the persisted index inside a project root.
pub const INDEX_DIR_NAME: &str = ".codeindex";

/// File name of the persisted index.
pub const INDEX_FILE_NAME: &str = "index.json";

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// The source chunk.
    pub chunk: CodeChunk,
    /// Embedding produced by the index's model.
    pub embedding: Vec<f32>,
}

/// A chunk returned from a similarity scan.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeindex_lens::chunker::CodeChunk;
/// use codeindex_lens::store::SearchResult;
///
/// let result = SearchResult {
///     chunk: CodeChunk {
///         file_path: PathBuf::from("/repo/src/auth.rs"),
///         content: "fn login() {}".into(),
///         start_line: 10,
///         end_line: 12,
///         chunk_index: 1,
///     },
///     similarity: 0.87,
/// };
/// assert!(result.similarity > 0.8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: CodeChunk,
    /// Cosine similarity between the query and the chunk.
    pub similarity: f64,
}

/// Index statistics.
///
/// # Examples
///
/// ```
/// use codeindex_lens::store::IndexStats;
///
/// let stats = IndexStats {
///     total_chunks: 120,
///     total_files: 14,
///     model_name: "nomic-embed-text".into(),
///     index_path: None,
/// };
/// assert_eq!(stats.total_files, 14);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of chunks in the index.
    pub total_chunks: usize,
    /// Number of distinct files the chunks came from.
    pub total_files: usize,
    /// Embedding model that produced every vector.
    pub model_name: String,
    /// Where the index lives on disk, if it has been saved or loaded.
    pub index_path: Option<PathBuf>,
}

/// Flat collection of embedded chunks for one project root.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeindex_lens::chunker::CodeChunk;
/// use codeindex_lens::store::CodeIndex;
///
/// let mut index = CodeIndex::new("nomic-embed-text");
/// index.add_chunk(
///     CodeChunk {
///         file_path: PathBuf::from("/repo/a.rs"),
///         content: "fn a() {}".into(),
///         start_line: 1,
///         end_line: 1,
///         chunk_index: 0,
///     },
///     vec![1.0, 0.0],
/// );
/// let hits = index.search(&[1.0, 0.0], 5);
/// assert_eq!(hits.len(), 1);
/// assert!((hits[0].similarity - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeIndex {
    chunks: Vec<IndexedChunk>,
    model_name: String,
    #[serde(skip)]
    index_path: Option<PathBuf>,
}

impl CodeIndex {
    /// Create an empty index for vectors produced by `model_name`.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            model_name: model_name.into(),
            index_path: None,
        }
    }

    /// Append a chunk and its embedding.
    pub fn add_chunk(&mut self, chunk: CodeChunk, embedding: Vec<f32>) {
        self.chunks.push(IndexedChunk { chunk, embedding });
    }

    /// All entries in insertion order.
    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding model name recorded for this index.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Path the index was last saved to or loaded from.
    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Embedding dimensionality, or `None` for an empty index.
    pub fn dimensions(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    /// Rank every chunk against `query` and return the best `top_k`.
    ///
    /// Results are sorted by similarity, highest first. The sort is stable,
    /// so equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .chunks
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                similarity: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        results
    }

    /// Write the index to `path` as JSON.
    ///
    /// Parent directories are created as needed. The document is written to a
    /// sibling temp file and renamed into place, so readers never observe a
    /// half-written index.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Io`] if the directory or file cannot be
    /// written, or [`CodeIndexError::Serialization`] if encoding fails.
    pub fn save(&mut self, path: &Path) -> Result<(), CodeIndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec(&*self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), chunks = self.len(), "index saved");
        self.index_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Read an index previously written by [`CodeIndex::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::NotFound`] if no file exists at `path`,
    /// [`CodeIndexError::Io`] for other read failures, and
    /// [`CodeIndexError::Parse`] if the JSON is malformed or the embeddings
    /// disagree on dimensionality.
    pub fn load(path: &Path) -> Result<Self, CodeIndexError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CodeIndexError::NotFound(format!(
                    "no index file at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut index: Self = serde_json::from_slice(&data).map_err(|e| {
            CodeIndexError::Parse(format!("invalid index file {}: {e}", path.display()))
        })?;
        index.validate()?;
        index.index_path = Some(path.to_path_buf());
        Ok(index)
    }

    /// Summarize the index.
    pub fn stats(&self) -> IndexStats {
        let files: HashSet<&Path> = self
            .chunks
            .iter()
            .map(|c| c.chunk.file_path.as_path())
            .collect();

        IndexStats {
            total_chunks: self.chunks.len(),
            total_files: files.len(),
            model_name: self.model_name.clone(),
            index_path: self.index_path.clone(),
        }
    }

    fn validate(&self) -> Result<(), CodeIndexError> {
        let Some(dims) = self.dimensions() else {
            return Ok(());
        };
        if let Some(bad) = self.chunks.iter().find(|c| c.embedding.len() != dims) {
            return Err(CodeIndexError::Parse(format!(
                "embedding dimension mismatch: expected {dims}, found {} for {}:{}",
                bad.embedding.len(),
                bad.chunk.file_path.display(),
                bad.chunk.start_line
            )));
        }
        Ok(())
    }
}

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when the lengths differ, either vector is empty, or either
/// norm is zero.
///
/// # Examples
///
/// ```
/// use codeindex_lens::store::cosine_similarity;
///
/// assert!((cosine_similarity(&[0.3, 0.4], &[0.3, 0.4]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

/// Location of the index file for a project root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codeindex_lens::store::index_path_for;
///
/// assert_eq!(
///     index_path_for(Path::new("/work/app")),
///     Path::new("/work/app/.codeindex/index.json"),
/// );
/// ```
pub fn index_path_for(root: &Path) -> PathBuf {
    root.join(INDEX_DIR_NAME).join(INDEX_FILE_NAME)
}

/// Find the nearest index at or above `start`.
///
/// Checks `<dir>/.codeindex/index.json` for `start` and each ancestor in
/// turn, the way version control finds its repository root. Returns the
/// project root (the directory containing `.codeindex`).
///
/// # Errors
///
/// Returns [`CodeIndexError::NotFound`] when the filesystem root is reached
/// without finding an index.
pub fn discover_index(start: &Path) -> Result<PathBuf, CodeIndexError> {
    let start = start
        .canonicalize()
        .unwrap_or_else(|_| start.to_path_buf());

    for dir in start.ancestors() {
        if index_path_for(dir).is_file() {
            return Ok(dir.to_path_buf());
        }
    }

    Err(CodeIndexError::NotFound(format!(
        "no {INDEX_DIR_NAME} found in {} or any parent directory; run index_directory first",
        start.display()
    )))
}
