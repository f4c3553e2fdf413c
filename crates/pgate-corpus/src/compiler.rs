//! Corpus compiler
//!
//! Turns the governance inputs on disk into a reproducible, content-addressed
//! corpus. Every run rebuilds the whole corpus from scratch.

use crate::chunk::Chunk;
use crate::config::CorpusConfig;
use crate::digest::Sha256Digest;
use crate::error::CorpusError;
use crate::store::Corpus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of a compile
#[derive(Debug, Clone)]
pub struct CompiledCorpus {
    /// The chunks, in write order
    pub corpus: Corpus,
    /// Digest over the serialized records
    pub digest: Sha256Digest,
    /// Repository-relative inputs that were read
    pub inputs: Vec<String>,
    /// Absolute corpus file location, when written
    pub path: Option<PathBuf>,
}

/// Build metadata written beside the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusManifest {
    /// RFC 3339 UTC build time
    pub built_at: String,
    /// Corpus digest
    pub corpus_sha256: Sha256Digest,
    /// Number of records
    pub chunk_count: usize,
    /// Inputs in read order
    pub inputs: Vec<String>,
    /// Window size used
    pub max_chars: usize,
    /// Window overlap used
    pub overlap: usize,
}

/// Compiles governance inputs under a repository root
#[derive(Debug, Clone)]
pub struct CorpusCompiler {
    repo_root: PathBuf,
    config: CorpusConfig,
}

impl CorpusCompiler {
    /// Create a compiler for `repo_root`
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, config: CorpusConfig) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Absolute corpus file location
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.repo_root.join(&self.config.output)
    }

    /// Discover inputs without reading or writing anything
    ///
    /// Returns repository-relative, `/`-separated paths, deduplicated and
    /// sorted; enumeration order of the filesystem never leaks through.
    ///
    /// # Errors
    /// `CorpusError::Walk` if a directory root cannot be traversed.
    pub fn plan(&self) -> Result<Vec<String>, CorpusError> {
        let mut files = BTreeSet::new();
        for root in &self.config.roots {
            let full = self.repo_root.join(root);
            if full.is_dir() {
                for entry in WalkDir::new(&full) {
                    let entry = entry.map_err(|source| CorpusError::Walk {
                        root: full.clone(),
                        source,
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if self.config.accepts_extension(&name) {
                        files.insert(self.relative(entry.path()));
                    }
                }
            } else if full.is_file() {
                files.insert(self.relative(&full));
            }
        }
        Ok(files.into_iter().collect())
    }

    /// Read and chunk every input, without touching the destination
    ///
    /// # Errors
    /// Chunking, IO or serialization failures.
    pub fn compile(&self) -> Result<CompiledCorpus, CorpusError> {
        self.config.chunking.validate()?;
        let inputs = self.plan()?;

        let mut chunks = Vec::new();
        for source in &inputs {
            let path = self.repo_root.join(source);
            let bytes = std::fs::read(&path).map_err(|e| CorpusError::io(&path, e))?;
            let source_sha256 = Sha256Digest::compute(&bytes);
            let text = String::from_utf8_lossy(&bytes);

            for (chunk_index, text) in self
                .config
                .chunking
                .chunk_text(&text)?
                .into_iter()
                .enumerate()
            {
                chunks.push(Chunk {
                    id: Chunk::make_id(source, chunk_index),
                    source: source.clone(),
                    source_sha256,
                    chunk_index,
                    text,
                });
            }
        }

        let corpus = Corpus::from_chunks(chunks);
        let digest = corpus.digest()?;
        tracing::debug!(
            inputs = inputs.len(),
            chunks = corpus.len(),
            digest = %digest.short(),
            "Compiled corpus"
        );

        Ok(CompiledCorpus {
            corpus,
            digest,
            inputs,
            path: None,
        })
    }

    /// Compile and replace the corpus file and manifest on disk
    ///
    /// Each file is staged next to its destination and renamed into place,
    /// so a failure leaves the previous corpus intact.
    ///
    /// # Errors
    /// Chunking, IO or serialization failures.
    pub fn build(&self) -> Result<CompiledCorpus, CorpusError> {
        let mut compiled = self.compile()?;
        let (body, digest) = compiled.corpus.encode()?;
        debug_assert_eq!(digest, compiled.digest);

        let output = self.output_path();
        write_atomic(&output, body.as_bytes())?;

        let manifest = CorpusManifest {
            built_at: chrono::Utc::now().to_rfc3339(),
            corpus_sha256: digest,
            chunk_count: compiled.corpus.len(),
            inputs: compiled.inputs.clone(),
            max_chars: self.config.chunking.max_chars,
            overlap: self.config.chunking.overlap,
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&self.repo_root.join(&self.config.manifest), &manifest_json)?;

        tracing::info!(
            path = %output.display(),
            chunks = compiled.corpus.len(),
            sha256 = %digest,
            "Wrote corpus"
        );
        compiled.path = Some(output);
        Ok(compiled)
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.repo_root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), CorpusError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CorpusError::io(dir, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| CorpusError::io(dir, e))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| CorpusError::io(staged.path(), e))?;
    staged
        .persist(dest)
        .map_err(|e| CorpusError::io(dest, e.error))?;
    Ok(())
}
