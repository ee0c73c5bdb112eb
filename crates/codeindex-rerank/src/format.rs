//! Plain-text rendering of search results for tool output.

use std::borrow::Cow;
use std::fmt::Write;

use codeindex_lens::store::SearchResult;

use crate::reranker::{RerankStats, RerankedResult};

/// Marker appended to snippets cut by [`truncate_content`].
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Cut `content` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was removed.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::format::truncate_content;
///
/// assert_eq!(truncate_content("short", 10), "short");
/// assert_eq!(truncate_content("abcdefgh", 3), "abc\n... [truncated]");
/// ```
pub fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}

/// Numbered listing of reranked results with scores and code.
///
/// `max_content_length` caps each snippet, in characters.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::format::format_results;
/// use codeindex_rerank::reranker::{LlmStage, RerankStats};
///
/// let stats = RerankStats {
///     original_count: 3,
///     after_threshold_count: 0,
///     final_count: 0,
///     min_similarity: 0.3,
///     llm_stage: LlmStage::NotRequested,
/// };
/// let text = format_results(&[], &stats, None);
/// assert!(text.starts_with("No relevant results found (threshold: 0.30)."));
/// assert!(text.contains("Found 3 results but all were below relevance threshold."));
/// ```
pub fn format_results(
    results: &[RerankedResult],
    stats: &RerankStats,
    max_content_length: Option<usize>,
) -> String {
    if results.is_empty() {
        return no_results(stats);
    }

    let mut out = header(results.len(), stats);
    out.push_str(":\n\n");

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.result.chunk;
        let _ = write!(out, "Result {}", i + 1);
        match result.llm_score {
            Some(llm) => {
                let _ = write!(
                    out,
                    " (similarity: {:.3}, llm: {llm:.3}, final: {:.3})",
                    result.similarity(),
                    result.final_score
                );
            }
            None if stats.used_llm_rerank() => {
                let _ = write!(
                    out,
                    " (similarity: {:.3}, final: {:.3})",
                    result.similarity(),
                    result.final_score
                );
            }
            None => {
                let _ = write!(out, " (similarity: {:.3})", result.similarity());
            }
        }
        out.push_str(":\n");
        let _ = writeln!(
            out,
            "File: {} (lines {}-{})",
            chunk.file_path.display(),
            chunk.start_line,
            chunk.end_line
        );

        let content = match max_content_length {
            Some(max) => truncate_content(&chunk.content, max),
            None => Cow::Borrowed(chunk.content.as_str()),
        };
        let _ = write!(out, "```\n{content}\n```\n\n");
    }

    out
}

/// Citations only: one `path:start-end` line per result, no code bodies.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::format::format_compact;
/// use codeindex_rerank::reranker::{LlmStage, RerankStats};
///
/// let stats = RerankStats {
///     original_count: 0,
///     after_threshold_count: 0,
///     final_count: 0,
///     min_similarity: 0.5,
///     llm_stage: LlmStage::NotRequested,
/// };
/// assert_eq!(format_compact(&[], &stats), "No relevant results found (threshold: 0.50).\n");
/// ```
pub fn format_compact(results: &[RerankedResult], stats: &RerankStats) -> String {
    if results.is_empty() {
        return no_results(stats);
    }

    let mut out = header(results.len(), stats);
    out.push_str(":\n");
    for (i, result) in results.iter().enumerate() {
        let chunk = &result.result.chunk;
        let _ = writeln!(
            out,
            "{}. {}:{}-{} (score {:.3})",
            i + 1,
            chunk.file_path.display(),
            chunk.start_line,
            chunk.end_line,
            result.final_score
        );
    }
    out
}

/// Listing of raw similarity hits, before any reranking.
pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut out = format!("Found {} result(s):\n\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let _ = writeln!(
            out,
            "Result {} (similarity: {:.3}):\nFile: {} (lines {}-{})",
            i + 1,
            result.similarity,
            chunk.file_path.display(),
            chunk.start_line,
            chunk.end_line
        );
        let _ = write!(out, "```\n{}\n```\n\n", chunk.content);
    }
    out
}

fn header(count: usize, stats: &RerankStats) -> String {
    let mut out = format!("Found {count} relevant result(s)");
    if stats.filtered_count() > 0 {
        let _ = write!(
            out,
            " (filtered {} below {:.2} threshold)",
            stats.filtered_count(),
            stats.min_similarity
        );
    }
    if stats.used_llm_rerank() {
        out.push_str(" [LLM reranked]");
    }
    out
}

fn no_results(stats: &RerankStats) -> String {
    let mut msg = format!(
        "No relevant results found (threshold: {:.2}).\n",
        stats.min_similarity
    );
    if stats.original_count > 0 {
        let _ = write!(
            msg,
            "Found {} results but all were below relevance threshold.\n\
             Try a more specific query or lower the threshold.",
            stats.original_count
        );
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::LlmStage;
    use codeindex_lens::chunker::CodeChunk;
    use std::path::PathBuf;

    fn reranked(path: &str, similarity: f64, llm: Option<f64>, content: &str) -> RerankedResult {
        RerankedResult {
            result: SearchResult {
                chunk: CodeChunk {
                    file_path: PathBuf::from(path),
                    content: content.into(),
                    start_line: 4,
                    end_line: 9,
                    chunk_index: 0,
                },
                similarity,
            },
            llm_score: llm,
            final_score: llm.map_or(similarity, |l| 0.4 * similarity + 0.6 * l),
            filtered_out: false,
        }
    }

    fn stats(original: usize, kept: usize, stage: LlmStage) -> RerankStats {
        RerankStats {
            original_count: original,
            after_threshold_count: kept,
            final_count: kept,
            min_similarity: 0.3,
            llm_stage: stage,
        }
    }

    #[test]
    fn listing_shows_similarity_only_without_llm() {
        let results = [reranked("/r/a.rs", 0.8123, None, "fn a() {}")];
        let text = format_results(&results, &stats(1, 1, LlmStage::NotRequested), None);
        assert!(text.starts_with("Found 1 relevant result(s):\n\n"));
        assert!(text.contains("Result 1 (similarity: 0.812):\n"));
        assert!(text.contains("File: /r/a.rs (lines 4-9)\n"));
        assert!(text.contains("```\nfn a() {}\n```"));
        assert!(!text.contains("llm:"));
    }

    #[test]
    fn listing_shows_all_scores_after_llm() {
        let results = [
            reranked("/r/a.rs", 0.5, Some(0.9), "a"),
            reranked("/r/b.rs", 0.9, None, "b"),
        ];
        let text = format_results(
            &results,
            &stats(4, 2, LlmStage::Blended { scored: 1 }),
            None,
        );
        assert!(text.starts_with(
            "Found 2 relevant result(s) (filtered 2 below 0.30 threshold) [LLM reranked]:"
        ));
        assert!(text.contains("Result 1 (similarity: 0.500, llm: 0.900, final: 0.740):"));
        assert!(text.contains("Result 2 (similarity: 0.900, final: 0.900):"));
    }

    #[test]
    fn degraded_stage_is_not_labelled_reranked() {
        let results = [reranked("/r/a.rs", 0.7, None, "a")];
        let stage = LlmStage::Degraded {
            reason: "timeout".into(),
        };
        let text = format_results(&results, &stats(1, 1, stage), None);
        assert!(!text.contains("[LLM reranked]"));
    }

    #[test]
    fn long_snippets_are_truncated() {
        let body = "x".repeat(50);
        let results = [reranked("/r/a.rs", 0.7, None, &body)];
        let text = format_results(&results, &stats(1, 1, LlmStage::NotRequested), Some(10));
        assert!(text.contains(&format!("```\n{}\n... [truncated]\n```", "x".repeat(10))));
        assert!(!text.contains(&"x".repeat(11)));
    }

    #[test]
    fn compact_omits_code() {
        let results = [
            reranked("/r/a.rs", 0.9, None, "SECRET_BODY"),
            reranked("/r/b.rs", 0.6, None, "OTHER_BODY"),
        ];
        let text = format_compact(&results, &stats(2, 2, LlmStage::NotRequested));
        assert_eq!(
            text,
            "Found 2 relevant result(s):\n1. /r/a.rs:4-9 (score 0.900)\n2. /r/b.rs:4-9 (score 0.600)\n"
        );
    }

    #[test]
    fn empty_without_candidates_has_no_guidance() {
        let text = format_results(&[], &stats(0, 0, LlmStage::NotRequested), None);
        assert_eq!(text, "No relevant results found (threshold: 0.30).\n");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_content("ééé", 2), "éé\n... [truncated]");
        assert_eq!(truncate_content("ééé", 3), "ééé");
        assert_eq!(truncate_content("", 0), "");
    }

    #[test]
    fn raw_listing() {
        assert_eq!(format_search_results(&[]), "No results found.");
        let hit = reranked("/r/a.rs", 0.25, None, "fn a() {}").result;
        let text = format_search_results(&[hit]);
        assert!(text.contains("Result 1 (similarity: 0.250):\nFile: /r/a.rs (lines 4-9)"));
    }
}
