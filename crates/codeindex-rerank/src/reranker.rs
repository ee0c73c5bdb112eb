//! Threshold filtering and optional LLM-assisted reranking.
//!
//! Raw similarity hits go through three stages: results under the similarity
//! threshold are dropped, up to `max_results_for_llm` survivors may be
//! scored by a text-generation model and blended with their similarity, and
//! everything left is sorted by final score. A failing model never fails the
//! query; the outcome is recorded in [`LlmStage`] instead.

use std::sync::Arc;

use codeindex_core::SearchConfig;
use codeindex_lens::store::SearchResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::GenerationGateway;
use crate::prompt::{build_rerank_prompt, parse_score_array};

/// How vector similarity and the model's score combine.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::reranker::BlendPolicy;
///
/// let policy = BlendPolicy::default();
/// assert!((policy.blend(0.9, 0.1) - 0.42).abs() < 1e-9);
/// assert!((policy.blend(0.5, 0.9) - 0.74).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendPolicy {
    /// Weight of the embedding similarity.
    pub similarity_weight: f64,
    /// Weight of the model's relevance score.
    pub llm_weight: f64,
    /// Score assumed for snippets the model left unscored.
    pub missing_score: f64,
}

impl Default for BlendPolicy {
    fn default() -> Self {
        Self {
            similarity_weight: 0.4,
            llm_weight: 0.6,
            missing_score: 0.5,
        }
    }
}

impl BlendPolicy {
    /// Weighted sum of `similarity` and `llm_score`.
    pub fn blend(&self, similarity: f64, llm_score: f64) -> f64 {
        self.similarity_weight * similarity + self.llm_weight * llm_score
    }
}

/// Reranker settings.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::reranker::RerankerConfig;
///
/// let config = RerankerConfig::default();
/// assert_eq!(config.min_similarity, 0.3);
/// assert!(!config.use_llm_rerank);
/// assert_eq!(config.max_results_for_llm, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Results with similarity below this are dropped.
    pub min_similarity: f64,
    /// Ask the generation gateway to score survivors.
    pub use_llm_rerank: bool,
    /// Maximum survivors sent to the model, taken in their incoming order.
    pub max_results_for_llm: usize,
    /// Score blending.
    pub blend: BlendPolicy,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for RerankerConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            min_similarity: config.min_similarity,
            use_llm_rerank: config.use_llm_rerank,
            max_results_for_llm: config.max_results_for_llm,
            blend: BlendPolicy {
                similarity_weight: config.similarity_weight,
                llm_weight: config.llm_weight,
                missing_score: config.missing_llm_score,
            },
        }
    }
}

/// A search hit annotated with reranking scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankedResult {
    /// The underlying hit.
    #[serde(flatten)]
    pub result: SearchResult,
    /// Model relevance score in `[0, 1]`, when the model scored this hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_score: Option<f64>,
    /// Score used for ordering.
    pub final_score: f64,
    /// Whether the hit fell under the threshold. Never true in output.
    #[serde(default)]
    pub filtered_out: bool,
}

impl RerankedResult {
    /// Similarity of the underlying hit.
    pub fn similarity(&self) -> f64 {
        self.result.similarity
    }
}

/// What happened in the LLM stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LlmStage {
    /// Reranking was not requested.
    NotRequested,
    /// Requested, but no generation gateway is configured.
    Unavailable,
    /// Requested, but no hit survived the threshold.
    NothingToScore,
    /// The model scored `scored` hits and their scores were blended.
    Blended {
        /// Number of hits that received a model score.
        scored: usize,
    },
    /// The model call or its output failed; similarity order was kept.
    Degraded {
        /// Why the stage was skipped.
        reason: String,
    },
}

/// Counts and outcome of one rerank pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankStats {
    /// Hits received.
    pub original_count: usize,
    /// Hits at or above the threshold.
    pub after_threshold_count: usize,
    /// Hits returned.
    pub final_count: usize,
    /// Threshold used.
    pub min_similarity: f64,
    /// Outcome of the LLM stage.
    pub llm_stage: LlmStage,
}

impl RerankStats {
    /// Whether model scores were actually blended into the ordering.
    pub fn used_llm_rerank(&self) -> bool {
        matches!(self.llm_stage, LlmStage::Blended { .. })
    }

    /// Hits dropped by the threshold.
    pub fn filtered_count(&self) -> usize {
        self.original_count.saturating_sub(self.after_threshold_count)
    }
}

/// Stateless reranking pipeline.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeindex_lens::chunker::CodeChunk;
/// use codeindex_lens::store::SearchResult;
/// use codeindex_rerank::reranker::{Reranker, RerankerConfig};
///
/// # async fn example() {
/// let hit = |sim: f64| SearchResult {
///     chunk: CodeChunk {
///         file_path: PathBuf::from("/r/a.rs"),
///         content: "fn a() {}".into(),
///         start_line: 1,
///         end_line: 1,
///         chunk_index: 0,
///     },
///     similarity: sim,
/// };
/// let reranker = Reranker::new(RerankerConfig { min_similarity: 0.5, ..Default::default() }, None);
/// let (results, stats) = reranker.rerank("q", &[hit(0.9), hit(0.6), hit(0.4), hit(0.2)]).await;
/// assert_eq!(results.len(), 2);
/// assert_eq!(stats.filtered_count(), 2);
/// # }
/// ```
pub struct Reranker {
    config: RerankerConfig,
    generator: Option<Arc<dyn GenerationGateway>>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("config", &self.config)
            .field(
                "generator",
                &self.generator.as_ref().map(|g| g.model_name().to_string()),
            )
            .finish()
    }
}

impl Reranker {
    /// Create a reranker. `generator` is only consulted when
    /// `config.use_llm_rerank` is set.
    pub fn new(config: RerankerConfig, generator: Option<Arc<dyn GenerationGateway>>) -> Self {
        Self { config, generator }
    }

    /// Filter, optionally score with the model, and sort `results`.
    ///
    /// Sorting is stable: hits with equal final scores keep their incoming
    /// order.
    pub async fn rerank(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> (Vec<RerankedResult>, RerankStats) {
        let mut kept: Vec<RerankedResult> = results
            .iter()
            .filter(|r| r.similarity >= self.config.min_similarity)
            .map(|r| RerankedResult {
                result: r.clone(),
                llm_score: None,
                final_score: r.similarity,
                filtered_out: false,
            })
            .collect();
        let after_threshold_count = kept.len();

        let llm_stage = if !self.config.use_llm_rerank {
            LlmStage::NotRequested
        } else if kept.is_empty() || self.config.max_results_for_llm == 0 {
            LlmStage::NothingToScore
        } else {
            match &self.generator {
                None => LlmStage::Unavailable,
                Some(generator) => self.llm_stage(generator.as_ref(), query, &mut kept).await,
            }
        };

        kept.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let stats = RerankStats {
            original_count: results.len(),
            after_threshold_count,
            final_count: kept.len(),
            min_similarity: self.config.min_similarity,
            llm_stage,
        };
        (kept, stats)
    }

    async fn llm_stage(
        &self,
        generator: &dyn GenerationGateway,
        query: &str,
        kept: &mut [RerankedResult],
    ) -> LlmStage {
        let take = kept.len().min(self.config.max_results_for_llm);
        let candidates: Vec<&SearchResult> = kept[..take].iter().map(|r| &r.result).collect();
        let prompt = build_rerank_prompt(query, &candidates);

        let scores = match generator.generate(&prompt).await {
            Ok(response) => parse_score_array(&response, take, self.config.blend.missing_score),
            Err(e) => Err(e),
        };

        match scores {
            Ok(scores) => {
                for (result, score) in kept[..take].iter_mut().zip(scores) {
                    result.llm_score = Some(score);
                    result.final_score = self.config.blend.blend(result.result.similarity, score);
                }
                debug!(scored = take, model = generator.model_name(), "LLM rerank applied");
                LlmStage::Blended { scored: take }
            }
            Err(e) => {
                warn!(error = %e, model = generator.model_name(), "LLM rerank failed; keeping similarity order");
                LlmStage::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Keep only results whose similarity is at least `min_similarity`.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::reranker::filter_by_threshold;
///
/// let kept = filter_by_threshold(Vec::new(), 0.3);
/// assert!(kept.is_empty());
/// ```
pub fn filter_by_threshold(results: Vec<SearchResult>, min_similarity: f64) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.similarity >= min_similarity)
        .collect()
}
