//! Grounding records and the two grounding gates
//!
//! - [`GroundingExistenceGate`]: every cited id is real
//! - [`GroundingSufficiencyGate`]: the citations are enough, and they cover
//!   the mandatory governance documents

use crate::config::{CitationScope, PolicyConfig};
use crate::error::{GroundingInsufficient, GroundingMissing, PolicyError};
use pgate_corpus::Corpus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Default citation minimum when a record does not declare one
pub const DEFAULT_MIN_REQUIRED: usize = 3;

fn default_min_required() -> usize {
    DEFAULT_MIN_REQUIRED
}

/// What a proposal claims to have read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingRecord {
    /// The question the evidence answers
    #[serde(default)]
    pub query: String,
    /// Cited chunk ids, in citation order
    #[serde(default)]
    pub cited_chunk_ids: Vec<String>,
    /// Minimum citations the proposal commits to
    #[serde(default = "default_min_required")]
    pub min_required: usize,
}

impl GroundingRecord {
    /// Create a record with the default minimum
    #[must_use]
    pub fn new<I, S>(query: impl Into<String>, cited: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            cited_chunk_ids: cited.into_iter().map(Into::into).collect(),
            min_required: DEFAULT_MIN_REQUIRED,
        }
    }

    /// With declared minimum
    #[inline]
    #[must_use]
    pub fn with_min_required(mut self, min_required: usize) -> Self {
        self.min_required = min_required;
        self
    }
}

/// On-disk grounding document: `{"retrieval": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingDocument {
    /// The grounding record
    pub retrieval: GroundingRecord,
}

impl GroundingDocument {
    /// Wrap a record
    #[must_use]
    pub fn new(retrieval: GroundingRecord) -> Self {
        Self { retrieval }
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// `PolicyError::MalformedGrounding` on a shape mismatch.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON document
    ///
    /// # Errors
    /// `PolicyError::Io` or `PolicyError::MalformedGrounding`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Checks that cited ids exist in the live corpus
#[derive(Debug, Clone)]
pub struct GroundingExistenceGate {
    scope: CitationScope,
    max_reported_ids: usize,
}

impl GroundingExistenceGate {
    /// Create from policy configuration
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            scope: config.citation_scope,
            max_reported_ids: config.max_reported_ids,
        }
    }

    /// Check citations against the corpus
    ///
    /// # Errors
    /// - `NoCitations` when nothing is cited
    /// - `CorpusMissing` when the corpus is empty
    /// - `UnknownIds` listing up to `max_reported_ids` missing ids
    pub fn check(&self, record: &GroundingRecord, corpus: &Corpus) -> Result<(), GroundingMissing> {
        if record.cited_chunk_ids.is_empty() {
            return Err(GroundingMissing::NoCitations);
        }
        if corpus.is_empty() {
            return Err(GroundingMissing::CorpusMissing);
        }

        let missing: Vec<String> = record
            .cited_chunk_ids
            .iter()
            .filter(|id| !corpus.contains(id))
            .take(self.max_reported_ids)
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(GroundingMissing::UnknownIds(missing));
        }
        Ok(())
    }

    /// Check citations, also restricting them to `offered` under
    /// [`CitationScope::Offered`]
    ///
    /// # Errors
    /// Everything [`Self::check`] reports, plus `NotOffered`.
    pub fn check_offered(
        &self,
        record: &GroundingRecord,
        corpus: &Corpus,
        offered: &[String],
    ) -> Result<(), GroundingMissing> {
        self.check(record, corpus)?;
        if self.scope == CitationScope::Corpus {
            return Ok(());
        }

        let offered: HashSet<&str> = offered.iter().map(String::as_str).collect();
        let outside: Vec<String> = record
            .cited_chunk_ids
            .iter()
            .filter(|id| !offered.contains(id.as_str()))
            .take(self.max_reported_ids)
            .cloned()
            .collect();
        if !outside.is_empty() {
            return Err(GroundingMissing::NotOffered(outside));
        }
        Ok(())
    }
}

/// Checks that the grounding is substantial and covers mandatory sources
#[derive(Debug, Clone)]
pub struct GroundingSufficiencyGate {
    mandatory_sources: Vec<String>,
    min_query_chars: usize,
    max_reported_ids: usize,
}

impl GroundingSufficiencyGate {
    /// Create from policy configuration
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            mandatory_sources: config.mandatory_sources.clone(),
            min_query_chars: config.min_query_chars,
            max_reported_ids: config.max_reported_ids,
        }
    }

    /// Check query length, citation count, resolvability and coverage
    ///
    /// # Errors
    /// The first failing [`GroundingInsufficient`] condition, in that order.
    pub fn check(
        &self,
        record: &GroundingRecord,
        corpus: &Corpus,
    ) -> Result<(), GroundingInsufficient> {
        if record.query.trim().chars().count() < self.min_query_chars {
            return Err(GroundingInsufficient::QueryTooShort {
                min_chars: self.min_query_chars,
            });
        }

        if record.cited_chunk_ids.len() < record.min_required {
            return Err(GroundingInsufficient::TooFewCitations {
                cited: record.cited_chunk_ids.len(),
                required: record.min_required,
            });
        }

        let unresolved: Vec<String> = record
            .cited_chunk_ids
            .iter()
            .filter(|id| corpus.source_of(id).is_none())
            .take(self.max_reported_ids)
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            return Err(GroundingInsufficient::UnresolvedIds(unresolved));
        }

        let cited_sources: BTreeSet<&str> = record
            .cited_chunk_ids
            .iter()
            .filter_map(|id| corpus.source_of(id))
            .collect();
        if let Some(missing) = self
            .mandatory_sources
            .iter()
            .find(|s| !cited_sources.contains(s.as_str()))
        {
            return Err(GroundingInsufficient::MissingMandatorySource(missing.clone()));
        }

        Ok(())
    }
}
