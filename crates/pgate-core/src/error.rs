//! Error types for the pipeline
//!
//! Two layers:
//! - [`GateFailure`]: a rejected attempt. Retryable; its tagged reason is fed
//!   back to the model on the next attempt.
//! - [`PipelineError`]: the run is over. Either a terminal gate outcome
//!   (insufficient retrieval, exhausted budget) or an infrastructure failure.

use crate::model::ModelError;
use crate::patch::PatchError;
use crate::stage::Stage;
use pgate_corpus::CorpusError;
use pgate_policy::{GroundingInsufficient, GroundingMissing, PolicyError, PolicyViolation};
use pgate_sandbox::SandboxError;
use std::path::PathBuf;

/// Why a single attempt was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateFailure {
    /// Model output failed boundary validation
    #[error("MODEL_OUTPUT_INVALID: {0}")]
    MalformedOutput(String),

    /// Patch hit the deny-lists
    #[error("POLICY_ENFORCER_FAIL: {0}")]
    Policy(#[from] PolicyViolation),

    /// Citations missing or unknown
    #[error("GROUNDING_REQUIRED_FAIL: {0}")]
    GroundingMissing(#[from] GroundingMissing),

    /// Citations too thin or missing mandatory sources
    #[error("GROUNDING_VALIDATOR_FAIL: {0}")]
    GroundingInsufficient(#[from] GroundingInsufficient),

    /// Patch does not apply cleanly
    #[error("GIT_APPLY_CHECK_FAIL: {0}")]
    PatchCheckFailed(String),

    /// Patch passed the dry run but failed to apply
    #[error("GIT_APPLY_FAIL: {0}")]
    PatchApplyFailed(String),

    /// Patch changes nothing under `modules/<name>/`
    #[error("NO_MODULE_TOUCHED: patch must modify modules/<name>/")]
    NoModuleTouched,

    /// A touched module's tests failed
    #[error("SANDBOX_FAIL module={module}\n{stdout}\n{stderr}")]
    SandboxTestFailed {
        module: String,
        stdout: String,
        stderr: String,
    },
}

impl GateFailure {
    /// Stage that produced this failure
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedOutput(_) => Stage::ModelCall,
            Self::Policy(_) => Stage::PolicyGate,
            Self::GroundingMissing(_) => Stage::GroundingExistenceGate,
            Self::GroundingInsufficient(_) => Stage::GroundingSufficiencyGate,
            Self::PatchCheckFailed(_) => Stage::PatchDryRunGate,
            Self::PatchApplyFailed(_) => Stage::PatchApplyGate,
            Self::NoModuleTouched | Self::SandboxTestFailed { .. } => Stage::SandboxGate,
        }
    }

    /// Stable tag prefixing the fed-back reason
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MalformedOutput(_) => "MODEL_OUTPUT_INVALID",
            Self::Policy(_) => "POLICY_ENFORCER_FAIL",
            Self::GroundingMissing(_) => "GROUNDING_REQUIRED_FAIL",
            Self::GroundingInsufficient(_) => "GROUNDING_VALIDATOR_FAIL",
            Self::PatchCheckFailed(_) => "GIT_APPLY_CHECK_FAIL",
            Self::PatchApplyFailed(_) => "GIT_APPLY_FAIL",
            Self::NoModuleTouched => "NO_MODULE_TOUCHED",
            Self::SandboxTestFailed { .. } => "SANDBOX_FAIL",
        }
    }
}

/// Task file errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// File could not be read
    #[error("io error reading task {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not a task document
    #[error("malformed task: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`crate::PipelineConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but cannot be used
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Illegal stage transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal stage transition: {from:?} -> {to:?}")]
pub struct StageError {
    /// Current stage
    pub from: Stage,
    /// Requested stage
    pub to: Stage,
}

/// Terminal pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Too little evidence to ground a proposal; no model call was made
    #[error("INSUFFICIENT_RETRIEVAL: stop to avoid hallucination ({hits} hits, {required} required)")]
    RetrievalInsufficient { hits: usize, required: usize },

    /// Every attempt was rejected
    #[error("max iterations exceeded after {attempts} attempts. Last error: {last_error}")]
    AttemptBudgetExhausted {
        attempts: usize,
        last_error: Box<GateFailure>,
    },

    /// Corpus build failed
    #[error("corpus build failed: {0}")]
    Corpus(#[from] CorpusError),

    /// Policy gates could not be set up
    #[error("policy setup failed: {0}")]
    Policy(#[from] PolicyError),

    /// Model could not be reached
    #[error("model unavailable: {0}")]
    Model(#[source] ModelError),

    /// Patch tooling could not be run
    #[error("patch tooling failed: {0}")]
    Patch(#[source] PatchError),

    /// Sandbox runtime could not be run
    #[error("sandbox unavailable: {0}")]
    Sandbox(#[source] SandboxError),

    /// Attempt artifacts could not be written
    #[error("io error writing {path}: {source}")]
    Artifacts {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Task could not be loaded
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal stage bookkeeping went wrong
    #[error(transparent)]
    Stage(#[from] StageError),
}

impl PipelineError {
    /// True for outcomes decided by the gates rather than the environment
    #[inline]
    #[must_use]
    pub fn is_gate_outcome(&self) -> bool {
        matches!(
            self,
            Self::RetrievalInsufficient { .. } | Self::AttemptBudgetExhausted { .. }
        )
    }

    /// Last gate failure, when the budget ran out
    #[must_use]
    pub fn last_error(&self) -> Option<&GateFailure> {
        match self {
            Self::AttemptBudgetExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_prefix_display() {
        let failures = [
            GateFailure::MalformedOutput("missing patch".into()),
            GateFailure::Policy(PolicyViolation::ForbiddenPattern(r"eval\(".into())),
            GateFailure::GroundingMissing(GroundingMissing::NoCitations),
            GateFailure::GroundingInsufficient(GroundingInsufficient::QueryTooShort {
                min_chars: 5,
            }),
            GateFailure::PatchCheckFailed("corrupt patch".into()),
            GateFailure::PatchApplyFailed("conflict".into()),
            GateFailure::NoModuleTouched,
            GateFailure::SandboxTestFailed {
                module: "foo".into(),
                stdout: "1 failed".into(),
                stderr: String::new(),
            },
        ];
        for failure in failures {
            assert!(failure.to_string().starts_with(failure.tag()), "{failure}");
        }
    }

    #[test]
    fn sandbox_failure_layout() {
        let failure = GateFailure::SandboxTestFailed {
            module: "foo".into(),
            stdout: "out".into(),
            stderr: "err".into(),
        };
        assert_eq!(failure.to_string(), "SANDBOX_FAIL module=foo\nout\nerr");
        assert_eq!(failure.stage(), Stage::SandboxGate);
    }

    #[test]
    fn budget_exhaustion_carries_last_reason() {
        let err = PipelineError::AttemptBudgetExhausted {
            attempts: 3,
            last_error: Box::new(GateFailure::Policy(PolicyViolation::ForbiddenPattern(
                r"eval\(".into(),
            ))),
        };
        assert!(err.is_gate_outcome());
        assert!(err.to_string().contains("POLICY_ENFORCER_FAIL"));
        assert_eq!(err.last_error().map(GateFailure::tag), Some("POLICY_ENFORCER_FAIL"));
    }

    #[test]
    fn infrastructure_errors_are_not_gate_outcomes() {
        let err = PipelineError::Config(ConfigError::Invalid("max_attempts".into()));
        assert!(!err.is_gate_outcome());
        assert!(err.last_error().is_none());
    }
}
