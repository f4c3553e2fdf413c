//! Pipeline configuration
//!
//! Every section has defaults, so an empty TOML file is a valid
//! configuration:
//!
//! ```toml
//! [retrieval]
//! top_k = 8
//! min_hits = 3
//!
//! [orchestrator]
//! max_attempts = 3
//! log_dir = "logs"
//!
//! [policy]
//! citation_scope = "offered"
//! ```

use crate::error::ConfigError;
use pgate_corpus::CorpusConfig;
use pgate_policy::PolicyConfig;
use pgate_sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Evidence retrieval settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks offered to the model
    pub top_k: usize,
    /// Fewer hits than this stops the run before any model call
    pub min_hits: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8, min_hits: 3 }
    }
}

/// Retry loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Attempt budget
    pub max_attempts: usize,
    /// Attempt artifact directory, relative to the repository root
    pub log_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Corpus compiler
    pub corpus: CorpusConfig,
    /// Retriever
    pub retrieval: RetrievalConfig,
    /// Policy and grounding gates
    pub policy: PolicyConfig,
    /// Module test sandbox
    pub sandbox: SandboxConfig,
    /// Retry loop
    pub orchestrator: OrchestratorConfig,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&toml)
    }

    /// Check values that parse but cannot drive a run
    ///
    /// # Errors
    /// `ConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retrieval.top_k < self.retrieval.min_hits {
            return Err(ConfigError::Invalid(format!(
                "retrieval.top_k ({}) is below retrieval.min_hits ({})",
                self.retrieval.top_k, self.retrieval.min_hits
            )));
        }
        self.corpus
            .chunking
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// With corpus settings
    #[inline]
    #[must_use]
    pub fn with_corpus(mut self, corpus: CorpusConfig) -> Self {
        self.corpus = corpus;
        self
    }

    /// With retrieval settings
    #[inline]
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// With policy settings
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// With sandbox settings
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.orchestrator.max_attempts = max_attempts;
        self
    }

    /// With attempt artifact directory
    #[inline]
    #[must_use]
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.orchestrator.log_dir = log_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgate_policy::CitationScope;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.min_hits, 3);
        assert_eq!(config.orchestrator.max_attempts, 3);
        assert_eq!(config.orchestrator.log_dir, PathBuf::from("logs"));
        assert_eq!(config.policy.citation_scope, CitationScope::Corpus);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [policy]
            citation_scope = "offered"

            [sandbox]
            image = "python:3.12-slim"

            [corpus.chunking]
            max_chars = 800
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.citation_scope, CitationScope::Offered);
        assert_eq!(config.policy.min_query_chars, 5);
        assert_eq!(config.sandbox.image, "python:3.12-slim");
        assert_eq!(config.sandbox.memory, "512m");
        assert_eq!(config.corpus.chunking.max_chars, 800);
        assert_eq!(config.corpus.chunking.overlap, 150);
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let err = PipelineConfig::from_toml_str("[orchestrator]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_chunking_is_invalid() {
        let err = PipelineConfig::from_toml_str("[corpus.chunking]\nmax_chars = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        assert!(matches!(
            PipelineConfig::from_toml_str("[retrieval]\ntop_k = \"many\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
