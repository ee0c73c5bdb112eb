use codeindex_core::CodeIndexError;
use codeindex_lens::store::SearchResult;

/// Characters of each snippet shown to the model.
const SNIPPET_PREVIEW_CHARS: usize = 500;

/// Build the relevance-scoring prompt for a query and its candidate snippets.
///
/// Snippets are numbered in the order given; the model is asked for a JSON
/// array with one score per snippet in that same order.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeindex_lens::chunker::CodeChunk;
/// use codeindex_lens::store::SearchResult;
/// use codeindex_rerank::prompt::build_rerank_prompt;
///
/// let hit = SearchResult {
///     chunk: CodeChunk {
///         file_path: PathBuf::from("/repo/src/auth.rs"),
///         content: "fn login() {}".into(),
///         start_line: 1,
///         end_line: 1,
///         chunk_index: 0,
///     },
///     similarity: 0.8,
/// };
/// let prompt = build_rerank_prompt("user login", &[&hit]);
/// assert!(prompt.contains("QUERY: user login"));
/// assert!(prompt.contains("--- SNIPPET 1 ---"));
/// assert!(prompt.ends_with("JSON array:"));
/// ```
pub fn build_rerank_prompt(query: &str, results: &[&SearchResult]) -> String {
    let mut prompt = String::from(
        "You are a code relevance scorer. Given a search query and code snippets, \
         rate each snippet's relevance from 0.0 to 1.0.\n\n",
    );
    prompt.push_str(&format!("QUERY: {query}\n\nCODE SNIPPETS:\n"));

    for (i, result) in results.iter().enumerate() {
        prompt.push_str(&format!("\n--- SNIPPET {} ---\n", i + 1));
        prompt.push_str(&format!("File: {}\n", result.chunk.file_path.display()));
        prompt.push_str(&preview(&result.chunk.content));
        prompt.push('\n');
    }

    prompt.push_str("\nRespond with ONLY a JSON array of scores, one for each snippet in order.\n");
    prompt.push_str("Example: [0.9, 0.7, 0.3, 0.8]\n");
    prompt.push_str("Scores should reflect how well each snippet answers or relates to the query.\n");
    prompt.push_str("JSON array:");
    prompt
}

/// Extract per-snippet scores from raw model output.
///
/// The text between the first `[` and the last `]` is decoded as a JSON
/// number array. Scores are clamped to `[0, 1]` and the list is padded with
/// `missing_score` up to `expected` entries. Extra scores are kept; callers
/// ignore them.
///
/// # Errors
///
/// Returns [`CodeIndexError::Parse`] if no array is present or it does not
/// decode as numbers.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::prompt::parse_score_array;
///
/// let scores = parse_score_array("Sure! [0.9, 1.7, -0.2]", 4, 0.5).unwrap();
/// assert_eq!(scores, vec![0.9, 1.0, 0.0, 0.5]);
/// assert!(parse_score_array("no idea", 2, 0.5).is_err());
/// ```
pub fn parse_score_array(
    response: &str,
    expected: usize,
    missing_score: f64,
) -> Result<Vec<f64>, CodeIndexError> {
    let response = response.trim();
    let (Some(start), Some(end)) = (response.find('['), response.rfind(']')) else {
        return Err(CodeIndexError::Parse(
            "no JSON array found in model response".into(),
        ));
    };
    if end <= start {
        return Err(CodeIndexError::Parse(
            "no JSON array found in model response".into(),
        ));
    }

    let mut scores: Vec<f64> = serde_json::from_str(&response[start..=end])
        .map_err(|e| CodeIndexError::Parse(format!("invalid score array: {e}")))?;

    for score in &mut scores {
        *score = score.clamp(0.0, 1.0);
    }
    if scores.len() < expected {
        scores.resize(expected, missing_score);
    }
    Ok(scores)
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeindex_lens::chunker::CodeChunk;
    use std::path::PathBuf;

    fn hit(path: &str, content: &str) -> SearchResult {
        SearchResult {
            chunk: CodeChunk {
                file_path: PathBuf::from(path),
                content: content.into(),
                start_line: 1,
                end_line: 3,
                chunk_index: 0,
            },
            similarity: 0.7,
        }
    }

    #[test]
    fn prompt_numbers_snippets_in_order() {
        let a = hit("/r/a.rs", "fn alpha() {}");
        let b = hit("/r/b.rs", "fn beta() {}");
        let prompt = build_rerank_prompt("greek letters", &[&a, &b]);

        let first = prompt.find("--- SNIPPET 1 ---").unwrap();
        let second = prompt.find("--- SNIPPET 2 ---").unwrap();
        assert!(first < second);
        assert!(prompt[first..second].contains("File: /r/a.rs"));
        assert!(prompt[second..].contains("fn beta() {}"));
        assert!(prompt.contains("Example: [0.9, 0.7, 0.3, 0.8]"));
    }

    #[test]
    fn long_snippets_are_cut_at_500_chars() {
        let long = "ä".repeat(800);
        let a = hit("/r/long.rs", &long);
        let prompt = build_rerank_prompt("q", &[&a]);
        let expected = format!("{}...", "ä".repeat(500));
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&"ä".repeat(501)));
    }

    #[test]
    fn parse_plain_array() {
        assert_eq!(
            parse_score_array("[0.1, 0.5, 1]", 3, 0.5).unwrap(),
            vec![0.1, 0.5, 1.0]
        );
    }

    #[test]
    fn parse_array_wrapped_in_prose_and_fences() {
        let response = "Here are the scores:\n```json\n[0.8, 0.2]\n```\nHope that helps!";
        assert_eq!(
            parse_score_array(response, 2, 0.5).unwrap(),
            vec![0.8, 0.2]
        );
    }

    #[test]
    fn parse_pads_short_arrays() {
        assert_eq!(
            parse_score_array("[0.3]", 3, 0.5).unwrap(),
            vec![0.3, 0.5, 0.5]
        );
    }

    #[test]
    fn parse_rejects_non_numeric_arrays() {
        assert!(matches!(
            parse_score_array("[\"high\", \"low\"]", 2, 0.5),
            Err(CodeIndexError::Parse(_))
        ));
    }

    #[test]
    fn parse_rejects_reversed_brackets() {
        assert!(parse_score_array("] nothing [", 1, 0.5).is_err());
    }
}
