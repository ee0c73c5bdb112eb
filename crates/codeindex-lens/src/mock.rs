//! Deterministic in-process embedders for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use codeindex_core::{CodeIndexError, Result};

use crate::embedding::EmbeddingGateway;

/// Bag-of-words embedder: every lowercase alphanumeric token is hashed into
/// one of `dims` buckets. Texts sharing words get high cosine similarity.
#[derive(Debug)]
pub struct HashEmbedder {
    dims: usize,
    model: String,
    calls: AtomicUsize,
    fail_marker: Option<String>,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            model: "mock-hash".into(),
            calls: AtomicUsize::new(0),
            fail_marker: None,
        }
    }

    /// Fail any request whose text contains `marker`.
    #[must_use]
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Number of `embed` calls made so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Compute the vector for `text` without counting a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[(fnv1a(token) % self.dims as u64) as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingGateway for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(CodeIndexError::Gateway(format!(
                    "mock embedder refused text containing '{marker}'"
                )));
            }
        }
        Ok(self.vector_for(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embedder whose backend is always down.
#[derive(Debug, Clone)]
pub struct UnreachableEmbedder {
    pub model: String,
}

impl Default for UnreachableEmbedder {
    fn default() -> Self {
        Self {
            model: "mock-offline".into(),
        }
    }
}

#[async_trait]
impl EmbeddingGateway for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(CodeIndexError::Gateway("connection refused".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
