//! Lexical retriever
//!
//! Jaccard overlap between token sets, full scan per query. Good enough for a
//! corpus of governance documents that is rebuilt every run.

use crate::error::CorpusError;
use crate::store::Corpus;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9_./-]{2,}").expect("token pattern is valid"));

/// Lower-cased tokens of length >= 2 over `[a-z0-9_./-]`
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A scored view of a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Chunk id
    pub id: String,
    /// Source document
    pub source: String,
    /// Jaccard score in (0, 1]
    pub score: f64,
    /// Chunk text
    pub text: String,
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    source: String,
    text: String,
    tokens: HashSet<String>,
}

/// Ranks corpus chunks against a query
#[derive(Debug, Clone)]
pub struct Retriever {
    entries: Vec<Entry>,
}

impl Retriever {
    /// Index a corpus; chunk order is kept for tie-breaking
    #[must_use]
    pub fn new(corpus: &Corpus) -> Self {
        let entries = corpus
            .chunks()
            .iter()
            .map(|c| Entry {
                id: c.id.clone(),
                source: c.source.clone(),
                text: c.text.clone(),
                tokens: tokenize(&c.text),
            })
            .collect();
        Self { entries }
    }

    /// Load a corpus file and index it
    ///
    /// # Errors
    /// Propagates [`Corpus::load`] failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        Ok(Self::new(&Corpus::load(path)?))
    }

    /// Number of indexed chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `top_k` chunks by score, highest first
    ///
    /// A query without tokens yields nothing. Zero scores are dropped. Ties
    /// keep corpus order because the sort is stable.
    #[must_use]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Entry)> = self
            .entries
            .iter()
            .filter(|e| !e.tokens.is_empty())
            .filter_map(|e| {
                let intersection = query_tokens.intersection(&e.tokens).count();
                if intersection == 0 {
                    return None;
                }
                let union = query_tokens.union(&e.tokens).count();
                #[allow(clippy::cast_precision_loss)]
                let score = intersection as f64 / union as f64;
                Some((score, e))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let results: Vec<RetrievalResult> = scored
            .into_iter()
            .take(top_k)
            .map(|(score, e)| RetrievalResult {
                id: e.id.clone(),
                source: e.source.clone(),
                score,
                text: e.text.clone(),
            })
            .collect();

        tracing::debug!(hits = results.len(), top_k, "Retrieved evidence");
        results
    }
}
