//! pgate core
//!
//! Runs an untrusted code-generating model through a fixed sequence of
//! gates. A proposal is accepted only when it passes the policy scan, cites
//! real and sufficient evidence, applies cleanly, and every module it touches
//! passes its sandboxed tests. Rejections are fed back to the model until the
//! attempt budget runs out.
//!
//! # Architecture
//!
//! ```text
//! BuildCorpus -> Retrieve -> Prompt -> ModelCall -> PolicyGate
//!     -> GroundingExistenceGate -> GroundingSufficiencyGate
//!     -> PatchDryRunGate -> PatchApplyGate -> SandboxGate -> Success
//! ```
//!
//! Any gate may send the attempt back to `Prompt`; any stage may end in
//! `Failed`. See [`stage::allowed_transitions`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pgate_core::{CommandModel, GitPatchApplier, Orchestrator, PipelineConfig, Task};
//! use pgate_sandbox::{ContainerSandbox, SandboxConfig};
//!
//! let config = PipelineConfig::default();
//! let model = CommandModel::new("./propose.sh", Vec::<String>::new());
//! let applier = GitPatchApplier::new(".");
//! let sandbox = ContainerSandbox::new(".", config.sandbox.clone());
//!
//! let report = Orchestrator::new(".", config, &model, &applier, &sandbox)
//!     .run(&Task::load("task.json")?)?;
//! println!("accepted on attempt {}", report.attempts.len());
//! ```

#![warn(unreachable_pub)]

pub mod artifacts;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod patch;
pub mod prompt;
pub mod stage;
pub mod task;

pub use artifacts::AttemptArtifacts;
pub use config::{OrchestratorConfig, PipelineConfig, RetrievalConfig};
pub use error::{ConfigError, GateFailure, PipelineError, StageError, TaskError};
pub use model::{CommandModel, ModelClient, ModelError, ModelOutput};
pub use orchestrator::{AttemptRecord, Orchestrator, RetrievalReport, RunReport};
pub use patch::{touched_modules, GitPatchApplier, PatchApplier, PatchError};
pub use prompt::PromptBuilder;
pub use stage::{allowed_transitions, validate_transition, Stage, StageTracker};
pub use task::Task;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
