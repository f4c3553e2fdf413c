//! The gated retry loop
//!
//! One run: rebuild the corpus, retrieve evidence, then up to `max_attempts`
//! proposals. Each proposal passes through every gate in a fixed order and
//! the first failing gate ends the attempt. Its tagged reason is appended to
//! the next prompt.

use crate::artifacts::AttemptArtifacts;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, GateFailure, PipelineError, StageError, TaskError};
use crate::model::{ModelClient, ModelOutput};
use crate::patch::{touched_modules, PatchApplier};
use crate::prompt::PromptBuilder;
use crate::stage::{Stage, StageTracker};
use crate::task::Task;
use pgate_corpus::{Corpus, CorpusCompiler, RetrievalResult, Retriever, Sha256Digest};
use pgate_policy::{GroundingExistenceGate, GroundingSufficiencyGate, PolicyEnforcer};
use pgate_sandbox::SandboxRunner;
use std::path::PathBuf;
use ulid::Ulid;

/// One rejected or accepted attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: usize,
    /// Furthest stage reached
    pub stage: Stage,
    /// Rejection, if any
    pub failure: Option<GateFailure>,
}

impl AttemptRecord {
    /// True when every gate passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier, also on every log line of the run
    pub run_id: Ulid,
    /// Digest of the corpus the run was grounded on
    pub corpus_digest: Sha256Digest,
    /// Evidence offered to the model
    pub offered_ids: Vec<String>,
    /// Every attempt, the last one accepted
    pub attempts: Vec<AttemptRecord>,
    /// Modules whose tests passed
    pub modules: Vec<String>,
    /// Stages visited
    pub stages: Vec<Stage>,
}

/// Hits ranked for a query, and whether the run could proceed on them
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    /// Ranked hits
    pub hits: Vec<RetrievalResult>,
    /// Minimum hits required to call the model
    pub required: usize,
}

impl RetrievalReport {
    /// True when there is enough evidence to prompt
    #[inline]
    #[must_use]
    pub fn sufficient(&self) -> bool {
        self.hits.len() >= self.required
    }
}

enum AttemptError {
    Gate(GateFailure),
    Fatal(PipelineError),
}

impl From<GateFailure> for AttemptError {
    fn from(failure: GateFailure) -> Self {
        Self::Gate(failure)
    }
}

impl From<PipelineError> for AttemptError {
    fn from(err: PipelineError) -> Self {
        Self::Fatal(err)
    }
}

impl From<StageError> for AttemptError {
    fn from(err: StageError) -> Self {
        Self::Fatal(err.into())
    }
}

struct Gates {
    enforcer: PolicyEnforcer,
    existence: GroundingExistenceGate,
    sufficiency: GroundingSufficiencyGate,
}

/// Drives one task through the pipeline
///
/// Model, patch application and sandbox are borrowed so callers keep access
/// to them after the run.
pub struct Orchestrator<'a> {
    repo_root: PathBuf,
    config: PipelineConfig,
    model: &'a dyn ModelClient,
    applier: &'a dyn PatchApplier,
    sandbox: &'a dyn SandboxRunner,
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("repo_root", &self.repo_root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator for `repo_root`
    #[must_use]
    pub fn new(
        repo_root: impl Into<PathBuf>,
        config: PipelineConfig,
        model: &'a dyn ModelClient,
        applier: &'a dyn PatchApplier,
        sandbox: &'a dyn SandboxRunner,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
            model,
            applier,
            sandbox,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Rank corpus evidence for `task`
    #[must_use]
    pub fn retrieve(&self, corpus: &Corpus, task: &Task) -> RetrievalReport {
        let hits = Retriever::new(corpus).retrieve(&task.query(), self.config.retrieval.top_k);
        RetrievalReport {
            hits,
            required: self.config.retrieval.min_hits,
        }
    }

    /// Run the whole pipeline for `task`
    ///
    /// # Errors
    /// - `RetrievalInsufficient` before any model call
    /// - `AttemptBudgetExhausted` carrying the last gate failure
    /// - infrastructure failures (corpus, model transport, tooling, logs)
    pub fn run(&self, task: &Task) -> Result<RunReport, PipelineError> {
        let run_id = Ulid::new();
        let span = tracing::info_span!("run", %run_id);
        let _guard = span.enter();

        let mut tracker = StageTracker::new();
        let result = self.run_stages(run_id, task, &mut tracker);
        if let Err(err) = &result {
            if !tracker.current().is_terminal() {
                tracker.advance(Stage::Failed)?;
            }
            tracing::warn!(error = %err, stage = ?tracker.current(), "Run failed");
        }
        result
    }

    fn run_stages(
        &self,
        run_id: Ulid,
        task: &Task,
        tracker: &mut StageTracker,
    ) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let compiled = CorpusCompiler::new(&self.repo_root, self.config.corpus.clone()).build()?;
        tracing::info!(
            chunks = compiled.corpus.len(),
            digest = %compiled.digest.short(),
            "Corpus refreshed"
        );

        tracker.advance(Stage::Retrieve)?;
        let retrieval = self.retrieve(&compiled.corpus, task);
        if !retrieval.sufficient() {
            return Err(PipelineError::RetrievalInsufficient {
                hits: retrieval.hits.len(),
                required: retrieval.required,
            });
        }
        let offered_ids: Vec<String> = retrieval.hits.iter().map(|h| h.id.clone()).collect();
        tracing::info!(hits = offered_ids.len(), "Evidence retrieved");

        let gates = Gates {
            enforcer: PolicyEnforcer::new(&self.config.policy)?,
            existence: GroundingExistenceGate::new(&self.config.policy),
            sufficiency: GroundingSufficiencyGate::new(&self.config.policy),
        };
        let base_prompt = PromptBuilder::new(&self.config.policy.mandatory_sources)
            .base(task, &retrieval.hits)
            .map_err(TaskError::from)?;
        let artifacts = AttemptArtifacts::new(self.repo_root.join(&self.config.orchestrator.log_dir));

        let max_attempts = self.config.orchestrator.max_attempts;
        let mut attempts = Vec::with_capacity(max_attempts);
        let mut last_error: Option<GateFailure> = None;

        for attempt in 1..=max_attempts {
            let span = tracing::info_span!("attempt", attempt);
            let _guard = span.enter();

            tracker.advance(Stage::Prompt)?;
            let prompt = PromptBuilder::for_attempt(&base_prompt, last_error.as_ref());

            match self.attempt(&prompt, &compiled.corpus, &offered_ids, &gates, &artifacts, tracker) {
                Ok(modules) => {
                    tracker.advance(Stage::Success)?;
                    tracing::info!(?modules, "All gates passed");
                    attempts.push(AttemptRecord {
                        attempt,
                        stage: Stage::SandboxGate,
                        failure: None,
                    });
                    return Ok(RunReport {
                        run_id,
                        corpus_digest: compiled.digest,
                        offered_ids,
                        attempts,
                        modules,
                        stages: tracker.history().to_vec(),
                    });
                }
                Err(AttemptError::Gate(failure)) => {
                    tracing::warn!(tag = failure.tag(), stage = ?failure.stage(), "Gate rejected attempt");
                    attempts.push(AttemptRecord {
                        attempt,
                        stage: failure.stage(),
                        failure: Some(failure.clone()),
                    });
                    last_error = Some(failure);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }

        match last_error {
            Some(last_error) => Err(PipelineError::AttemptBudgetExhausted {
                attempts: attempts.len(),
                last_error: Box::new(last_error),
            }),
            None => Err(ConfigError::Invalid(
                "orchestrator.max_attempts must be at least 1".to_string(),
            )
            .into()),
        }
    }

    fn attempt(
        &self,
        prompt: &str,
        corpus: &Corpus,
        offered_ids: &[String],
        gates: &Gates,
        artifacts: &AttemptArtifacts,
        tracker: &mut StageTracker,
    ) -> Result<Vec<String>, AttemptError> {
        tracker.advance(Stage::ModelCall)?;
        let output: ModelOutput = match self.model.propose(prompt) {
            Ok(output) => output,
            Err(e) if e.is_retryable() => return Err(GateFailure::MalformedOutput(e.to_string()).into()),
            Err(e) => return Err(PipelineError::Model(e).into()),
        };
        artifacts.write(&output)?;
        let record = &output.grounding.retrieval;

        tracker.advance(Stage::PolicyGate)?;
        gates.enforcer.check(&output.patch).map_err(GateFailure::from)?;
        tracing::info!("Policy gate passed");

        tracker.advance(Stage::GroundingExistenceGate)?;
        gates
            .existence
            .check_offered(record, corpus, offered_ids)
            .map_err(GateFailure::from)?;
        tracing::info!(cited = record.cited_chunk_ids.len(), "Grounding existence gate passed");

        tracker.advance(Stage::GroundingSufficiencyGate)?;
        gates
            .sufficiency
            .check(record, corpus)
            .map_err(GateFailure::from)?;
        tracing::info!("Grounding sufficiency gate passed");

        tracker.advance(Stage::PatchDryRunGate)?;
        self.applier.check(&output.patch).map_err(|e| {
            if e.is_retryable() {
                AttemptError::Gate(GateFailure::PatchCheckFailed(e.to_string()))
            } else {
                AttemptError::Fatal(PipelineError::Patch(e))
            }
        })?;
        tracing::info!("Patch dry run passed");

        tracker.advance(Stage::PatchApplyGate)?;
        self.applier.apply(&output.patch).map_err(|e| {
            if e.is_retryable() {
                AttemptError::Gate(GateFailure::PatchApplyFailed(e.to_string()))
            } else {
                AttemptError::Fatal(PipelineError::Patch(e))
            }
        })?;
        tracing::info!("Patch applied");

        tracker.advance(Stage::SandboxGate)?;
        let modules = touched_modules(&output.patch);
        if modules.is_empty() {
            return Err(GateFailure::NoModuleTouched.into());
        }
        for module in &modules {
            let outcome = match self.sandbox.run(module) {
                Ok(outcome) => outcome,
                Err(e) if e.is_retryable() => {
                    return Err(GateFailure::SandboxTestFailed {
                        module: module.clone(),
                        stdout: String::new(),
                        stderr: e.to_string(),
                    }
                    .into())
                }
                Err(e) => return Err(PipelineError::Sandbox(e).into()),
            };
            if !outcome.passed() {
                return Err(GateFailure::SandboxTestFailed {
                    module: module.clone(),
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                }
                .into());
            }
            tracing::info!(%module, "Module tests passed");
        }

        Ok(modules)
    }
}
