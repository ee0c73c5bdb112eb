//! Index builds and queries for one or more project roots.
//!
//! The [`Indexer`] keeps one slot per project root. A slot is a
//! `tokio::sync::RwLock<Option<CodeIndex>>`: rebuilds hold it exclusively
//! from the moment the old index is discarded until the new one is
//! persisted and installed, while searches and lazy loads hold it shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock as StdRwLock};

use codeindex_core::{ChunkConfig, CodeIndexConfig, CodeIndexError, Result};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info, warn};

use crate::chunker::{chunk_code, clean_code, CodeChunk};
use crate::embedding::EmbeddingGateway;
use crate::store::{discover_index, index_path_for, CodeIndex, IndexStats, SearchResult};
use crate::walker::{read_source, walk_project, WalkOptions};

/// Callback receiving human-readable progress messages during a build.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

type Slot = Arc<RwLock<Option<CodeIndex>>>;

/// Builds, loads and queries code indexes.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use codeindex_lens::embedding::OllamaEmbeddings;
/// use codeindex_lens::indexer::Indexer;
///
/// # async fn example() -> codeindex_core::Result<()> {
/// let embedder = Arc::new(OllamaEmbeddings::new("http://localhost:11434", "nomic-embed-text")?);
/// let indexer = Indexer::new(embedder, std::env::current_dir()?);
/// let stats = indexer.index_directory(std::path::Path::new("."), None).await?;
/// println!("{} chunks from {} files", stats.total_chunks, stats.total_files);
/// let hits = indexer.search("where is the config parsed", 5).await?;
/// # Ok(())
/// # }
/// ```
pub struct Indexer {
    embedder: Arc<dyn EmbeddingGateway>,
    chunk_config: ChunkConfig,
    walk_options: WalkOptions,
    embedding_concurrency: usize,
    working_dir: PathBuf,
    slots: Mutex<HashMap<PathBuf, Slot>>,
    active_root: StdRwLock<Option<PathBuf>>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("model", &self.embedder.model_name())
            .field("chunk_config", &self.chunk_config)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    /// Create an indexer with default chunking and walk settings.
    ///
    /// `working_dir` is where index discovery starts when no project has
    /// been indexed or loaded yet.
    pub fn new(embedder: Arc<dyn EmbeddingGateway>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            chunk_config: ChunkConfig::default(),
            walk_options: WalkOptions::default(),
            embedding_concurrency: 1,
            working_dir: working_dir.into(),
            slots: Mutex::new(HashMap::new()),
            active_root: StdRwLock::new(None),
        }
    }

    /// Create an indexer using the chunking and indexing sections of `config`.
    pub fn from_config(
        config: &CodeIndexConfig,
        embedder: Arc<dyn EmbeddingGateway>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(embedder, working_dir)
            .with_chunk_config(config.chunking)
            .with_walk_options(WalkOptions::from_config(&config.indexing))
            .with_embedding_concurrency(config.indexing.embedding_concurrency)
    }

    #[must_use]
    pub fn with_chunk_config(mut self, config: ChunkConfig) -> Self {
        self.chunk_config = config;
        self
    }

    #[must_use]
    pub fn with_walk_options(mut self, options: WalkOptions) -> Self {
        self.walk_options = options;
        self
    }

    /// Embedding requests in flight per file. Values below 1 mean 1.
    #[must_use]
    pub fn with_embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.embedding_concurrency = concurrency.max(1);
        self
    }

    /// The embedding gateway in use.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingGateway> {
        &self.embedder
    }

    /// Root of the project most recently indexed, loaded or discovered.
    pub fn active_root(&self) -> Option<PathBuf> {
        self.active_root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the index for `root` from scratch and persist it.
    ///
    /// Any resident index for the root is discarded first. Files are walked
    /// in sorted order, cleaned, chunked and embedded. The result is written
    /// to `<root>/.codeindex/index.json` only after every file succeeded;
    /// on error, or if the returned future is dropped, the previous file on
    /// disk is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Walk`] if `root` is not a readable directory
    /// or traversal fails, [`CodeIndexError::Read`] for unreadable files,
    /// [`CodeIndexError::Gateway`] if any embedding call fails, and
    /// [`CodeIndexError::Io`] if the index cannot be written.
    pub async fn index_directory(
        &self,
        root: &Path,
        progress: Option<Progress<'_>>,
    ) -> Result<IndexStats> {
        let root = resolve_root(root)?;
        let slot = self.slot(&root);
        let mut resident = slot.write().await;
        *resident = None;

        info!(root = %root.display(), model = self.embedder.model_name(), "indexing directory");
        let files = walk_project(&root, &self.walk_options)?;
        debug!(files = files.len(), "walk complete");

        let mut index = CodeIndex::new(self.embedder.model_name());
        for path in &files {
            let relative = path.strip_prefix(&root).unwrap_or(path);
            report(progress, &format!("Indexing: {}", relative.display()));

            let Some(content) = read_source(path)? else {
                continue;
            };
            let content = clean_code(&content);
            let chunks = chunk_code(path, &content, &self.chunk_config);
            let embeddings = self.embed_chunks(&chunks).await?;

            for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
                if let Some(dims) = index.dimensions() {
                    if embedding.len() != dims {
                        return Err(CodeIndexError::Gateway(format!(
                            "embedding dimension changed from {dims} to {} at {}:{}",
                            embedding.len(),
                            chunk.file_path.display(),
                            chunk.start_line
                        )));
                    }
                }
                index.add_chunk(chunk, embedding);
            }
        }

        index.save(&index_path_for(&root))?;
        let stats = index.stats();
        *resident = Some(index);
        drop(resident);
        self.set_active(&root);

        info!(
            chunks = stats.total_chunks,
            files = stats.total_files,
            "index build complete"
        );
        report(
            progress,
            &format!(
                "Indexed {} chunks from {} files",
                stats.total_chunks, stats.total_files
            ),
        );
        Ok(stats)
    }

    /// Search the active project, discovering one from the working directory
    /// if nothing has been indexed or loaded yet.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::NotFound`] if no index can be discovered,
    /// [`CodeIndexError::Parse`] if the index on disk is invalid, and
    /// [`CodeIndexError::Gateway`] if the query cannot be embedded.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let root = self.current_root()?;
        self.search_root(&root, query, top_k).await
    }

    /// Search the nearest index at or above `start`.
    ///
    /// # Errors
    ///
    /// Same as [`Indexer::search`].
    pub async fn search_from(
        &self,
        start: &Path,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let root = discover_index(start)?;
        self.set_active(&root);
        self.search_root(&root, query, top_k).await
    }

    /// Statistics for the active project.
    ///
    /// Loads the index quietly if it is not resident yet. When nothing can be
    /// found or loaded, reports an empty index for the configured model.
    pub async fn stats(&self) -> IndexStats {
        let loaded = match self.current_root() {
            Ok(root) => self.loaded(&root).await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(guard) => match guard.as_ref() {
                Some(index) => index.stats(),
                None => self.empty_stats(),
            },
            Err(e) => {
                debug!(error = %e, "no index available for stats");
                self.empty_stats()
            }
        }
    }

    /// Re-read the active project's index from disk, replacing the resident
    /// copy.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::NotFound`] if no index exists, or
    /// [`CodeIndexError::Parse`] if it is invalid. The previously resident
    /// index is kept on failure.
    pub async fn reload_index(&self) -> Result<IndexStats> {
        let root = self.current_root()?;
        let slot = self.slot(&root);
        let mut resident = slot.write().await;

        let index = CodeIndex::load(&index_path_for(&root))?;
        let stats = index.stats();
        info!(root = %root.display(), chunks = stats.total_chunks, "index reloaded");
        *resident = Some(index);
        Ok(stats)
    }

    /// Probe the embedding backend with a trivial request.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Gateway`] naming the configured model when
    /// the backend is unreachable or the model is unavailable.
    pub async fn check_health(&self) -> Result<()> {
        let model = self.embedder.model_name();
        self.embedder.embed("test").await.map(|_| ()).map_err(|e| {
            CodeIndexError::Gateway(format!(
                "embedding backend health check failed: {e} (ensure the backend is running and model '{model}' is available)"
            ))
        })
    }

    async fn search_root(
        &self,
        root: &Path,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let guard = self.loaded(root).await?;
        let index = guard.as_ref().ok_or_else(|| {
            CodeIndexError::NotFound(format!("no index loaded for {}", root.display()))
        })?;

        if index.model_name() != self.embedder.model_name() {
            warn!(
                index_model = index.model_name(),
                query_model = self.embedder.model_name(),
                "index was built with a different embedding model; re-index for meaningful scores"
            );
        }

        let query_vector = self.embedder.embed(query).await?;
        Ok(index.search(&query_vector, top_k))
    }

    /// Shared access to the index for `root`, loading it from disk first if
    /// it is not resident.
    async fn loaded(&self, root: &Path) -> Result<OwnedRwLockReadGuard<Option<CodeIndex>>> {
        let slot = self.slot(root);

        let guard = Arc::clone(&slot).read_owned().await;
        if guard.is_some() {
            return Ok(guard);
        }
        drop(guard);

        let mut guard = slot.write_owned().await;
        if guard.is_none() {
            let index = CodeIndex::load(&index_path_for(root))?;
            info!(
                root = %root.display(),
                chunks = index.len(),
                model = index.model_name(),
                "index loaded"
            );
            *guard = Some(index);
        }
        Ok(guard.downgrade())
    }

    async fn embed_chunks(&self, chunks: &[CodeChunk]) -> Result<Vec<Vec<f32>>> {
        if self.embedding_concurrency <= 1 {
            let mut embeddings = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                embeddings.push(self.embedder.embed(&chunk.content).await?);
            }
            return Ok(embeddings);
        }

        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.content))
            .collect();
        futures::stream::iter(pending)
            .buffered(self.embedding_concurrency)
            .try_collect()
            .await
    }

    fn current_root(&self) -> Result<PathBuf> {
        if let Some(root) = self.active_root() {
            return Ok(root);
        }
        let root = discover_index(&self.working_dir)?;
        self.set_active(&root);
        Ok(root)
    }

    fn slot(&self, root: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(root.to_path_buf()).or_default())
    }

    fn set_active(&self, root: &Path) {
        *self
            .active_root
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(root.to_path_buf());
    }

    fn empty_stats(&self) -> IndexStats {
        IndexStats {
            total_chunks: 0,
            total_files: 0,
            model_name: self.embedder.model_name().to_string(),
            index_path: None,
        }
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    let resolved = root
        .canonicalize()
        .map_err(|e| CodeIndexError::Walk(format!("cannot access {}: {e}", root.display())))?;
    if !resolved.is_dir() {
        return Err(CodeIndexError::Walk(format!(
            "{} is not a directory",
            resolved.display()
        )));
    }
    Ok(resolved)
}

fn report(progress: Option<Progress<'_>>, message: &str) {
    if let Some(progress) = progress {
        progress(message);
    }
}
