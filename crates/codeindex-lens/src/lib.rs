//! Chunking, embedding and vector search over a project tree.
//!
//! A build walks the tree, splits each eligible file into overlapping
//! line-aligned chunks, embeds every chunk and persists the result as a
//! single JSON index under `<root>/.codeindex/`. Queries embed the text and
//! rank chunks by cosine similarity.

pub mod chunker;
pub mod embedding;
pub mod indexer;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod store;
pub mod walker;
