//! pgate evidence corpus
//!
//! Compiles governance documents into a content-addressed evidence store and
//! answers lexical queries against it.
//!
//! # Core Concepts
//!
//! - [`Chunk`]: an independently citable window of a source document
//! - [`Corpus`]: the ordered chunks, persisted as JSON Lines
//! - [`CorpusCompiler`]: rebuilds the corpus from the inputs on disk
//! - [`Retriever`]: ranks chunks by token-set overlap with a query
//!
//! # Example
//!
//! ```rust,ignore
//! use pgate_corpus::{CorpusCompiler, CorpusConfig, Retriever};
//!
//! let compiled = CorpusCompiler::new(".", CorpusConfig::default()).build()?;
//! println!("corpus sha256={}", compiled.digest);
//!
//! let retriever = Retriever::new(&compiled.corpus);
//! for hit in retriever.retrieve("sandbox network policy", 8) {
//!     println!("{:.3} {}", hit.score, hit.id);
//! }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod chunk;
pub mod compiler;
pub mod config;
pub mod digest;
pub mod error;
pub mod retriever;
pub mod store;

// Re-exports
pub use chunk::{Chunk, ChunkConfig, ChunkWindow};
pub use compiler::{CompiledCorpus, CorpusCompiler, CorpusManifest};
pub use config::CorpusConfig;
pub use digest::{DigestError, DigestFold, Sha256Digest};
pub use error::CorpusError;
pub use retriever::{tokenize, RetrievalResult, Retriever};
pub use store::Corpus;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
