use std::path::PathBuf;

/// Errors produced by the code index.
///
/// Library crates return this type directly; the binary converts it to a
/// `miette::Report` at the boundary and the tool layer turns it into an
/// error response.
///
/// # Examples
///
/// ```
/// use codeindex_core::CodeIndexError;
///
/// let err = CodeIndexError::NotFound("no .codeindex found".into());
/// assert!(err.to_string().contains("no .codeindex found"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CodeIndexError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file could not be read while building an index.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(String),

    /// No index could be found or loaded.
    #[error("index not found: {0}")]
    #[diagnostic(help("run `codeindex index <path>` to build one"))]
    NotFound(String),

    /// The embedding or text-generation backend failed.
    #[error("gateway error: {0}")]
    #[diagnostic(help("check that the backend is running; `codeindex health` probes it"))]
    Gateway(String),

    /// Malformed index data or model output.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CodeIndexError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn read_error_names_the_file() {
        let err = CodeIndexError::Read {
            path: PathBuf::from("/tmp/project/main.rs"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/project/main.rs"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn gateway_error_displays_message() {
        let err = CodeIndexError::Gateway("connection refused".into());
        assert_eq!(err.to_string(), "gateway error: connection refused");
    }
}
