//! Corpus compiler configuration

use crate::chunk::ChunkConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where governance inputs come from and where the corpus goes
///
/// All paths are relative to the repository root handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Input roots: files are taken as-is, directories are walked
    pub roots: Vec<String>,
    /// Extensions (without dot) accepted inside directory roots
    pub extensions: Vec<String>,
    /// JSON Lines corpus destination
    pub output: PathBuf,
    /// Build manifest destination
    pub manifest: PathBuf,
    /// Window geometry
    pub chunking: ChunkConfig,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            roots: [
                "README.md",
                "AGENT_CONTRACT.md",
                "POLICY.md",
                "policies",
                "sandbox",
                "pipeline/task_schema.json",
                "pipeline/templates",
                "standards/sources",
                ".github/workflows",
                ".github/CODEOWNERS",
                "pyproject.toml",
                "package.json",
                "package-lock.json",
                "poetry.lock",
                "requirements.txt",
                "requirements.lock",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            extensions: ["md", "py", "json", "yml", "yaml", "toml", "txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            output: PathBuf::from("standards/compiled/rag_corpus.jsonl"),
            manifest: PathBuf::from("standards/compiled/manifest.json"),
            chunking: ChunkConfig::default(),
        }
    }
}

impl CorpusConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the input roots
    #[must_use]
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the window geometry
    #[must_use]
    pub fn with_chunking(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Replace the corpus destination
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Whether a file name carries an accepted extension
    #[must_use]
    pub fn accepts_extension(&self, file_name: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| file_name.ends_with(&format!(".{ext}")))
    }
}
