//! Policy and grounding configuration

use serde::{Deserialize, Serialize};

/// Which citations the grounding-existence gate accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationScope {
    /// Any id present in the live corpus
    #[default]
    Corpus,
    /// Only ids offered in the prompt for the current attempt
    Offered,
}

/// Deny-lists, mandatory sources and grounding thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Substrings naming protected directories and files
    pub forbidden_targets: Vec<String>,
    /// Regular expressions for dangerous commands and primitives
    pub forbidden_patterns: Vec<String>,
    /// Source documents every proposal must cite
    pub mandatory_sources: Vec<String>,
    /// Minimum trimmed query length, in characters
    pub min_query_chars: usize,
    /// Cap on ids listed in a single failure reason
    pub max_reported_ids: usize,
    /// Citation acceptance scope
    pub citation_scope: CitationScope,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_targets: [
                "vendor/",
                ".github/",
                "config/",
                "policies/",
                "standards/",
                "README.md",
                "AGENT_CONTRACT.md",
                "POLICY.md",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            forbidden_patterns: [
                r"subprocess",
                r"os\.system",
                r"eval\(",
                r"exec\(",
                r"curl",
                r"wget",
                r"ssh",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            mandatory_sources: ["AGENT_CONTRACT.md", "POLICY.md"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_query_chars: 5,
            max_reported_ids: 10,
            citation_scope: CitationScope::Corpus,
        }
    }
}

impl PolicyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With citation scope
    #[inline]
    #[must_use]
    pub fn with_citation_scope(mut self, scope: CitationScope) -> Self {
        self.citation_scope = scope;
        self
    }

    /// With mandatory sources
    #[must_use]
    pub fn with_mandatory_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory_sources = sources.into_iter().map(Into::into).collect();
        self
    }
}
