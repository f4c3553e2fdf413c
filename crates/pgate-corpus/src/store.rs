//! The in-memory corpus and its JSON Lines encoding

use crate::chunk::Chunk;
use crate::digest::{DigestFold, Sha256Digest};
use crate::error::CorpusError;
use std::collections::HashMap;
use std::path::Path;

/// Ordered chunks with an id index
///
/// Order is write order: sorted source path, then chunk index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    /// Build from chunks in write order
    #[must_use]
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self { chunks, by_id }
    }

    /// Read a JSON Lines corpus file; blank lines are skipped
    ///
    /// # Errors
    /// `CorpusError::Io` when the file cannot be read,
    /// `CorpusError::MalformedRecord` naming the first bad line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        Self::parse(&content).map_err(|(line, source)| CorpusError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            source,
        })
    }

    /// Parse JSON Lines content; errors carry the 1-based line number
    fn parse(content: &str) -> Result<Self, (usize, serde_json::Error)> {
        let mut chunks = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(line).map_err(|e| (n + 1, e))?;
            chunks.push(chunk);
        }
        Ok(Self::from_chunks(chunks))
    }

    /// Serialize to JSON Lines and fold the corpus digest
    ///
    /// # Errors
    /// `CorpusError::Serialization` if a record fails to encode.
    pub fn encode(&self) -> Result<(String, Sha256Digest), CorpusError> {
        let mut body = String::new();
        let mut fold = DigestFold::new();
        for chunk in &self.chunks {
            let line = serde_json::to_string(chunk)?;
            fold.push_record(&line);
            body.push_str(&line);
            body.push('\n');
        }
        Ok((body, fold.finish()))
    }

    /// Corpus-wide integrity digest
    ///
    /// # Errors
    /// `CorpusError::Serialization` if a record fails to encode.
    pub fn digest(&self) -> Result<Sha256Digest, CorpusError> {
        self.encode().map(|(_, digest)| digest)
    }

    /// All chunks in write order
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunk was compiled
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a chunk id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up a chunk by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&i| &self.chunks[i])
    }

    /// Source document behind a chunk id
    #[must_use]
    pub fn source_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(|c| c.source.as_str())
    }

    /// Chunk ids in write order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(source: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: Chunk::make_id(source, index),
            source: source.to_string(),
            source_sha256: Sha256Digest::compute(source.as_bytes()),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn lookup_by_id() {
        let corpus = Corpus::from_chunks(vec![
            chunk("POLICY.md", 0, "no network"),
            chunk("POLICY.md", 1, "no secrets"),
        ]);

        assert!(corpus.contains("POLICY.md::chunk1"));
        assert!(!corpus.contains("POLICY.md::chunk2"));
        assert_eq!(corpus.source_of("POLICY.md::chunk0"), Some("POLICY.md"));
        assert_eq!(corpus.ids().collect::<Vec<_>>(), vec!["POLICY.md::chunk0", "POLICY.md::chunk1"]);
    }

    #[test]
    fn encode_then_parse_preserves_records() {
        let corpus = Corpus::from_chunks(vec![chunk("a.md", 0, "alpha \"quoted\"\nline")]);
        let (body, digest) = corpus.encode().unwrap();

        assert!(body.ends_with('\n'));
        assert_eq!(digest, Sha256Digest::compute(body.as_bytes()));

        let parsed = Corpus::parse(&body).unwrap();
        assert_eq!(parsed.chunks(), corpus.chunks());
    }

    #[test]
    fn record_fields_in_write_order() {
        let corpus = Corpus::from_chunks(vec![chunk("a.md", 0, "x")]);
        let (body, _) = corpus.encode().unwrap();
        let id = body.find("\"id\"").unwrap();
        let source = body.find("\"source\"").unwrap();
        let sha = body.find("\"source_sha256\"").unwrap();
        let index = body.find("\"chunk_index\"").unwrap();
        let text = body.find("\"text\"").unwrap();
        assert!(id < source && source < sha && sha < index && index < text);
    }

    #[test]
    fn parse_reports_bad_line() {
        let good = serde_json::to_string(&chunk("a.md", 0, "x")).unwrap();
        let content = format!("{good}\n\nnot json\n");
        let err = Corpus::parse(&content).unwrap_err();
        assert_eq!(err.0, 3);
    }

    #[test]
    fn empty_corpus_digest_is_empty_hash() {
        let corpus = Corpus::default();
        assert!(corpus.is_empty());
        assert_eq!(corpus.digest().unwrap(), Sha256Digest::compute(b""));
    }
}
