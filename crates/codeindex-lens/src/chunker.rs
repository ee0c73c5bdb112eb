//! Line-aligned chunking with character budgets and trailing overlap.
//!
//! Files are split into contiguous runs of whole lines. A run is emitted as a
//! chunk once the next line would push it past `max_chunk_size` characters,
//! and the next run is seeded with the last few lines of the one just emitted
//! so that matches spanning a boundary are still searchable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use codeindex_core::ChunkConfig;

/// File extensions eligible for indexing, compared case-insensitively.
const INDEXABLE_EXTENSIONS: &[&str] = &[
    "go", "js", "ts", "jsx", "tsx", "py", "java", "c", "cpp", "h", "hpp", "rs", "rb", "php", "cs",
    "swift", "kt", "scala", "sh", "bash", "sql", "proto", "thrift", "graphql", "yaml", "yml",
    "json", "xml", "md",
];

/// Consecutive blank lines kept by [`clean_code`].
const MAX_BLANK_RUN: usize = 2;

/// A contiguous slice of a source file.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeindex_lens::chunker::CodeChunk;
///
/// let chunk = CodeChunk {
///     file_path: PathBuf::from("/work/app/src/main.rs"),
///     content: "fn main() {}".into(),
///     start_line: 1,
///     end_line: 1,
///     chunk_index: 0,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Absolute path of the source file.
    pub file_path: PathBuf,
    /// Chunk text with leading and trailing whitespace removed.
    pub content: String,
    /// First line covered (1-indexed, inclusive).
    pub start_line: usize,
    /// Last line covered (1-indexed, inclusive).
    pub end_line: usize,
    /// Position of this chunk within its file (0-indexed).
    pub chunk_index: usize,
}

/// Split `content` into overlapping, line-aligned chunks.
///
/// Lengths are counted in characters. A single line longer than
/// `max_chunk_size` is never split; it ends up whole in one oversized chunk.
/// Runs that are blank after trimming are not emitted.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codeindex_lens::chunker::{chunk_code, ChunkConfig};
///
/// let chunks = chunk_code(Path::new("lib.rs"), "fn a() {}\nfn b() {}\n", &ChunkConfig::default());
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].start_line, 1);
/// assert_eq!(chunks[0].end_line, 2);
/// ```
pub fn chunk_code(file_path: &Path, content: &str, config: &ChunkConfig) -> Vec<CodeChunk> {
    let lines = split_lines(content);
    let mut chunks = Vec::new();

    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_chars = 0usize;
    let mut start_line = 1usize;

    for (i, line) in lines.iter().enumerate() {
        let line_no = i + 1;
        let line_chars = line.chars().count();

        if !buffer.is_empty() && buffer_chars + 1 + line_chars > config.max_chunk_size {
            emit(&mut chunks, file_path, &buffer, start_line, line_no - 1);

            let keep = overlap_line_count(&buffer, config.overlap_size);
            buffer.drain(..buffer.len() - keep);
            start_line = line_no - keep;
            buffer_chars = joined_chars(&buffer);
        }

        buffer_chars = if buffer.is_empty() {
            line_chars
        } else {
            buffer_chars + 1 + line_chars
        };
        buffer.push(line);
    }

    if !buffer.is_empty() {
        emit(&mut chunks, file_path, &buffer, start_line, lines.len());
    }

    chunks
}

/// Whether a file should be indexed, judged by its extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codeindex_lens::chunker::should_index;
///
/// assert!(should_index(Path::new("src/main.rs")));
/// assert!(should_index(Path::new("README.MD")));
/// assert!(!should_index(Path::new("logo.png")));
/// assert!(!should_index(Path::new("Makefile")));
/// ```
pub fn should_index(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            INDEXABLE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Normalize source text before chunking.
///
/// Trailing whitespace is removed from every line and runs of blank lines
/// longer than two are collapsed to two. Indentation is left alone.
///
/// # Examples
///
/// ```
/// use codeindex_lens::chunker::clean_code;
///
/// let cleaned = clean_code("fn a() {   \n\n\n\n\n    body();\t\n}");
/// assert_eq!(cleaned, "fn a() {\n\n\n    body();\n}");
/// ```
pub fn clean_code(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_RUN {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(trimmed);
    }

    out.join("\n")
}

/// Split on `\n`, ignoring the empty tail produced by a final newline.
fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix('\n').unwrap_or(content);
    body.split('\n').collect()
}

fn joined_chars(lines: &[&str]) -> usize {
    if lines.is_empty() {
        return 0;
    }
    lines.iter().map(|l| l.chars().count()).sum::<usize>() + lines.len() - 1
}

/// How many trailing lines of `buffer` fit in `overlap_size` characters.
///
/// The whole buffer may be carried; the line that forced the flush is
/// appended after seeding, so the next chunk still ends further on.
fn overlap_line_count(buffer: &[&str], overlap_size: usize) -> usize {
    if overlap_size == 0 {
        return 0;
    }
    let mut count = 0usize;
    let mut kept = 0usize;

    for line in buffer.iter().rev() {
        let len = line.chars().count();
        if count + len > overlap_size {
            break;
        }
        count += len + 1;
        kept += 1;
    }

    kept
}

fn emit(
    chunks: &mut Vec<CodeChunk>,
    file_path: &Path,
    buffer: &[&str],
    start_line: usize,
    end_line: usize,
) {
    let content = buffer.join("\n");
    let content = content.trim();
    if content.is_empty() {
        return;
    }
    let chunk_index = chunks.len();
    chunks.push(CodeChunk {
        file_path: file_path.to_path_buf(),
        content: content.to_string(),
        start_line,
        end_line,
        chunk_index,
    });
}
