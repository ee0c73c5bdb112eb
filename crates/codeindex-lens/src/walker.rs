use std::collections::HashSet;
use std::path::{Path, PathBuf};

use codeindex_core::{CodeIndexError, IndexingConfig, Result};

use crate::chunker::should_index;
use crate::store::INDEX_DIR_NAME;

/// Directory names never descended into.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    ".idea",
    "build",
    "dist",
    "target",
    INDEX_DIR_NAME,
];

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Options controlling which files a walk yields.
///
/// # Examples
///
/// ```
/// use codeindex_lens::walker::WalkOptions;
///
/// let options = WalkOptions::default();
/// assert!(options.skip_dirs.contains(&"node_modules".to_string()));
/// assert_eq!(options.max_file_bytes, 1_048_576);
/// ```
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Directory names to skip wherever they appear.
    pub skip_dirs: Vec<String>,
    /// Honor `.gitignore` files.
    pub respect_gitignore: bool,
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::from_config(&IndexingConfig::default())
    }
}

impl WalkOptions {
    /// Built-in skip list plus the configured extras.
    pub fn from_config(config: &IndexingConfig) -> Self {
        let mut skip_dirs: Vec<String> = DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect();
        for extra in &config.skip_dirs {
            if !skip_dirs.contains(extra) {
                skip_dirs.push(extra.clone());
            }
        }
        Self {
            skip_dirs,
            respect_gitignore: config.respect_gitignore,
            max_file_bytes: config.max_file_bytes,
        }
    }
}

/// Collect indexable files under `root`, sorted by path within each directory.
///
/// Skipped directories are pruned by name. Files are kept when their
/// extension passes [`should_index`] and their size is within
/// `max_file_bytes`. Hidden files are not filtered.
///
/// # Errors
///
/// Returns [`CodeIndexError::Walk`] if any directory entry cannot be read.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use codeindex_lens::walker::{walk_project, WalkOptions};
///
/// let files = walk_project(Path::new("."), &WalkOptions::default()).unwrap();
/// for f in &files {
///     println!("{}", f.display());
/// }
/// ```
pub fn walk_project(root: &Path, options: &WalkOptions) -> Result<Vec<PathBuf>> {
    let skip: HashSet<String> = options.skip_dirs.iter().cloned().collect();

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .git_ignore(options.respect_gitignore)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if entry.depth() == 0 || !is_dir {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !skip.contains(&*name)
        });

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|e| CodeIndexError::Walk(e.to_string()))?;

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if !should_index(path) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| CodeIndexError::Walk(e.to_string()))?;
        if metadata.len() > options.max_file_bytes {
            tracing::debug!(path = %path.display(), bytes = metadata.len(), "skipping large file");
            continue;
        }

        files.push(path.to_path_buf());
    }

    Ok(files)
}

/// Read a source file, returning `None` for binary content.
///
/// A NUL byte in the first 8 KiB marks the file as binary. Invalid UTF-8
/// is replaced rather than rejected.
///
/// # Errors
///
/// Returns [`CodeIndexError::Read`] if the file cannot be read.
pub fn read_source(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path).map_err(|source| CodeIndexError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let check_len = bytes.len().min(BINARY_CHECK_SIZE);
    if bytes[..check_len].contains(&0) {
        tracing::debug!(path = %path.display(), "skipping binary file");
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
