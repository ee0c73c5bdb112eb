//! Relevance filtering, optional LLM reranking and text rendering of search
//! hits.
//!
//! A [`reranker::Reranker`] drops hits under a similarity threshold, then
//! optionally asks a [`llm::GenerationGateway`] to score the survivors and
//! blends those scores with similarity. Any failure in the model stage falls
//! back to similarity order.

pub mod format;
pub mod llm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod prompt;
pub mod reranker;
