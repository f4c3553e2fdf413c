//! Error types for policy and grounding checks
//!
//! Gate rejections ([`PolicyViolation`], [`GroundingMissing`],
//! [`GroundingInsufficient`]) are ordinary outcomes the orchestrator feeds
//! back to the model. [`PolicyError`] covers setup and input failures.

use std::path::PathBuf;

/// Setup and input errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A configured forbidden pattern does not compile
    #[error("invalid forbidden pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Grounding document could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Grounding document has the wrong shape
    #[error("malformed grounding document: {0}")]
    MalformedGrounding(#[from] serde_json::Error),
}

/// Deny-list hit; only the first one found is reported
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Patch mentions a protected path
    #[error("Modification of forbidden target: {0}")]
    ForbiddenTarget(String),

    /// Patch matches a dangerous pattern
    #[error("Forbidden pattern detected: {0}")]
    ForbiddenPattern(String),
}

/// Citations do not exist where they must
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroundingMissing {
    /// No citation at all
    #[error("no grounding evidence")]
    NoCitations,

    /// The corpus is empty or was never built
    #[error("corpus missing")]
    CorpusMissing,

    /// Cited ids absent from the corpus (truncated list)
    #[error("invalid grounding ids: {0:?}")]
    UnknownIds(Vec<String>),

    /// Cited ids that were not offered in the prompt (truncated list)
    #[error("cited ids were not offered for this attempt: {0:?}")]
    NotOffered(Vec<String>),
}

/// Citations exist but do not justify the proposal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroundingInsufficient {
    /// Query missing or trivially short
    #[error("retrieval.query missing/too short (minimum {min_chars} characters)")]
    QueryTooShort { min_chars: usize },

    /// Fewer citations than the record declares necessary
    #[error("insufficient cited_chunk_ids: cited {cited}, required {required}")]
    TooFewCitations { cited: usize, required: usize },

    /// Cited ids with no known source (truncated list)
    #[error("cited ids not found in corpus: {0:?}")]
    UnresolvedIds(Vec<String>),

    /// A mandatory governance document was never cited
    #[error("grounding must cite at least one chunk from {0}")]
    MissingMandatorySource(String),
}
