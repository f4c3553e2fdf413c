//! Chunk records and the overlapping window splitter

use crate::digest::Sha256Digest;
use crate::error::CorpusError;
use serde::{Deserialize, Serialize};

/// Default window size in characters
pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Default look-back between consecutive windows
pub const DEFAULT_OVERLAP: usize = 150;

/// One citable window of a source document
///
/// Field order is the on-disk record order; the corpus digest depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<source>::chunk<index>`
    pub id: String,
    /// Repository-relative source path, `/`-separated
    pub source: String,
    /// Digest of the whole source file
    pub source_sha256: Sha256Digest,
    /// Position among the kept windows of this source
    pub chunk_index: usize,
    /// Trimmed window text, never empty
    pub text: String,
}

impl Chunk {
    /// Stable chunk id for a source path and index
    #[must_use]
    pub fn make_id(source: &str, chunk_index: usize) -> String {
        format!("{source}::chunk{chunk_index}")
    }
}

/// Window geometry for the splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum window length in characters
    pub max_chars: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// A raw window in character offsets, before trimming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow<'a> {
    /// First character (inclusive)
    pub start: usize,
    /// Last character (exclusive)
    pub end: usize,
    /// Untrimmed slice of the input
    pub text: &'a str,
}

impl ChunkConfig {
    /// Create a config, validating that windows advance and overlap
    ///
    /// # Errors
    /// `CorpusError::InvalidChunking` unless `0 < overlap < max_chars`.
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self, CorpusError> {
        let config = Self { max_chars, overlap };
        config.validate()?;
        Ok(config)
    }

    /// Check that consecutive windows share text and still make progress
    ///
    /// # Errors
    /// `CorpusError::InvalidChunking` unless `0 < overlap < max_chars`.
    pub fn validate(&self) -> Result<(), CorpusError> {
        if self.overlap == 0 || self.overlap >= self.max_chars {
            return Err(CorpusError::InvalidChunking {
                max_chars: self.max_chars,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows
    #[inline]
    #[must_use]
    pub fn step(&self) -> usize {
        self.max_chars - self.overlap
    }

    /// Split `text` into overlapping windows
    ///
    /// Offsets count characters, not bytes, so multi-byte text never splits
    /// inside a code point. The last window is the first one that reaches the
    /// end of the text.
    ///
    /// # Errors
    /// `CorpusError::InvalidChunking` on an invalid geometry.
    pub fn windows<'a>(&self, text: &'a str) -> Result<Vec<ChunkWindow<'a>>, CorpusError> {
        self.validate()?;

        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;

        let mut out = Vec::new();
        if char_count == 0 {
            return Ok(out);
        }

        let mut start = 0;
        loop {
            let end = (start + self.max_chars).min(char_count);
            out.push(ChunkWindow {
                start,
                end,
                text: &text[bounds[start]..bounds[end]],
            });
            if end == char_count {
                break;
            }
            start += self.step();
        }
        Ok(out)
    }

    /// Split `text` into trimmed, non-empty chunk texts
    ///
    /// `\r\n` is normalised to `\n` first.
    ///
    /// # Errors
    /// `CorpusError::InvalidChunking` on an invalid geometry.
    pub fn chunk_text(&self, text: &str) -> Result<Vec<String>, CorpusError> {
        let normalized = text.replace("\r\n", "\n");
        Ok(self
            .windows(&normalized)?
            .into_iter()
            .map(|w| w.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }
}
