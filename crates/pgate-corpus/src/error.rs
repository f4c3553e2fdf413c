//! Error types for corpus compilation and loading

use std::path::PathBuf;

/// Errors while building, writing or loading the evidence corpus
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// Chunking parameters cannot make progress
    #[error("invalid chunking: max_chars={max_chars}, overlap={overlap} (overlap must be at least 1 and smaller than max_chars)")]
    InvalidChunking { max_chars: usize, overlap: usize },

    /// IO error on a specific path
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A corpus line is not a valid record
    #[error("malformed corpus record at {path}:{line}: {source}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Record serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CorpusError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
