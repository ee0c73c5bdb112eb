//! Configuration and error handling shared by the codeindex crates.
//!
//! - [`CodeIndexError`]: unified error type using `thiserror`
//! - [`CodeIndexConfig`]: configuration loaded from `.codeindex.toml`
//! - [`ChunkConfig`]: chunk sizing used by the chunker and indexer

mod config;
mod error;

pub use config::{
    ChunkConfig, CodeIndexConfig, EmbeddingConfig, GenerationConfig, IndexingConfig,
    SearchConfig, CONFIG_FILE_NAME, DEFAULT_OLLAMA_URL,
};
pub use error::CodeIndexError;

/// A convenience `Result` type for codeindex operations.
pub type Result<T> = std::result::Result<T, CodeIndexError>;
