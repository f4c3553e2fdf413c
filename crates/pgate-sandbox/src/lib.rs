//! pgate sandbox
//!
//! Runs a touched module's tests inside a container with the network
//! disabled, memory and CPU capped, and the module mounted read-only.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgate_sandbox::{ContainerSandbox, SandboxConfig, SandboxRunner};
//!
//! let sandbox = ContainerSandbox::new(".", SandboxConfig::default());
//! let outcome = sandbox.run("foo")?;
//! assert!(outcome.passed());
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod runner;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use runner::{ContainerSandbox, SandboxOutcome, SandboxRunner};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
