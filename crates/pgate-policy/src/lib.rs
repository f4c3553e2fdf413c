//! pgate policy gates
//!
//! The cheap gates a proposal must clear before anything touches the working
//! tree:
//!
//! - [`PolicyEnforcer`]: deny-list scan of the raw patch text
//! - [`GroundingExistenceGate`]: cited evidence ids exist in the corpus
//! - [`GroundingSufficiencyGate`]: citations are enough and cover the
//!   operating contract and policy documents
//!
//! # Example
//!
//! ```rust,ignore
//! use pgate_policy::{PolicyConfig, PolicyEnforcer};
//!
//! let enforcer = PolicyEnforcer::new(&PolicyConfig::default())?;
//! if let Err(violation) = enforcer.check(&patch) {
//!     println!("{violation}");
//! }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod enforcer;
pub mod error;
pub mod grounding;

pub use config::{CitationScope, PolicyConfig};
pub use enforcer::PolicyEnforcer;
pub use error::{GroundingInsufficient, GroundingMissing, PolicyError, PolicyViolation};
pub use grounding::{
    GroundingDocument, GroundingExistenceGate, GroundingRecord, GroundingSufficiencyGate,
    DEFAULT_MIN_REQUIRED,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
