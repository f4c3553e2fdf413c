//! Testing utilities for the pgate workspace
//!
//! Fixture repository, scripted model, fake patch applier and fake sandbox.

#![allow(missing_docs)]

use pgate_core::{ModelClient, ModelError, ModelOutput, PatchApplier, PatchError, Task};
use pgate_corpus::{CompiledCorpus, CorpusCompiler, CorpusConfig};
use pgate_policy::{GroundingDocument, GroundingRecord};
use pgate_sandbox::{SandboxError, SandboxOutcome, SandboxRunner};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CONTRACT_CHUNK: &str = "AGENT_CONTRACT.md::chunk0";
pub const POLICY_CHUNK: &str = "POLICY.md::chunk0";
pub const SANDBOX_CHUNK: &str = "sandbox/README.md::chunk0";

/// Chunk ids that satisfy both grounding gates against [`FixtureRepo`]
pub const GOOD_CITATIONS: [&str; 3] = [CONTRACT_CHUNK, POLICY_CHUNK, SANDBOX_CHUNK];

/// A governance repository in a temp directory
pub struct FixtureRepo {
    dir: TempDir,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().unwrap(),
        };
        repo.write(
            "AGENT_CONTRACT.md",
            "# Agent contract\nThe agent may only fix a module under modules/. \
             Every foo module change must keep its tests passing.\n",
        );
        repo.write(
            "POLICY.md",
            "# Policy\nNo network access. A module fix must follow POLICY.md \
             and the tests for the module must pass in the sandbox.\n",
        );
        repo.write(
            "README.md",
            "# Governance fixture\nModules live under modules/. The foo module is a sample.\n",
        );
        repo.write(
            "policies/rules.md",
            "Forbidden targets include policies/ and vendor/. Fix requests name a module.\n",
        );
        repo.write(
            "sandbox/README.md",
            "The sandbox runs module tests with pytest. The foo module tests must pass.\n",
        );
        repo.write("modules/foo/foo.py", "def foo():\n    return 1\n");
        repo.write(
            "modules/foo/test_foo.py",
            "from foo import foo\n\ndef test_foo():\n    assert foo() == 1\n",
        );
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.join(rel)).unwrap();
    }

    pub fn compile(&self) -> CompiledCorpus {
        CorpusCompiler::new(self.path(), CorpusConfig::default())
            .build()
            .unwrap()
    }
}

impl Default for FixtureRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// A task whose query retrieves every fixture document
pub fn fix_foo_task() -> Task {
    Task::new("Fix the foo module so its tests pass")
        .with_constraint("follow POLICY.md")
        .with_constraint("respect AGENT_CONTRACT.md")
}

/// Unified diff touching `modules/<module>/<module>.py`
pub fn module_patch(module: &str) -> String {
    [
        format!("--- a/modules/{module}/{module}.py"),
        format!("+++ b/modules/{module}/{module}.py"),
        "@@ -1,2 +1,2 @@".to_string(),
        format!(" def {module}():"),
        "-    return 1".to_string(),
        "+    return 2".to_string(),
        String::new(),
    ]
    .join("\n")
}

/// A proposal with the given patch and citations
pub fn proposal(patch: &str, cited: &[&str]) -> ModelOutput {
    ModelOutput {
        plan: serde_json::json!({"steps": ["edit foo"]}),
        patch: patch.to_string(),
        grounding: GroundingDocument::new(GroundingRecord::new(
            "fix the foo module",
            cited.iter().copied(),
        )),
    }
}

/// A proposal that passes every gate against [`FixtureRepo`]
pub fn good_proposal() -> ModelOutput {
    proposal(&module_patch("foo"), &GOOD_CITATIONS)
}

/// Model replaying a fixed script and recording every prompt
#[derive(Default)]
pub struct ScriptedModel {
    script: RefCell<VecDeque<Result<ModelOutput, ModelError>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, output: ModelOutput) -> Self {
        self.script.borrow_mut().push_back(Ok(output));
        self
    }

    pub fn then_err(self, err: ModelError) -> Self {
        self.script.borrow_mut().push_back(Err(err));
        self
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl ModelClient for ScriptedModel {
    fn propose(&self, prompt: &str) -> Result<ModelOutput, ModelError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".to_string())))
    }
}

/// Patch applier that records patches instead of touching the tree
#[derive(Default)]
pub struct FakePatchApplier {
    check_rejection: Option<String>,
    apply_rejection: Option<String>,
    applied: RefCell<Vec<String>>,
}

impl FakePatchApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_check(mut self, output: &str) -> Self {
        self.check_rejection = Some(output.to_string());
        self
    }

    pub fn rejecting_apply(mut self, output: &str) -> Self {
        self.apply_rejection = Some(output.to_string());
        self
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.borrow().clone()
    }
}

impl PatchApplier for FakePatchApplier {
    fn check(&self, _patch: &str) -> Result<(), PatchError> {
        match &self.check_rejection {
            Some(output) => Err(PatchError::Rejected {
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }

    fn apply(&self, patch: &str) -> Result<(), PatchError> {
        if let Some(output) = &self.apply_rejection {
            return Err(PatchError::Rejected {
                output: output.clone(),
            });
        }
        self.applied.borrow_mut().push(patch.to_string());
        Ok(())
    }
}

/// Sandbox with scripted per-module outcomes; unscripted modules pass
#[derive(Default)]
pub struct FakeSandbox {
    outcomes: HashMap<String, SandboxOutcome>,
    runs: RefCell<Vec<String>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, module: &str, stdout: &str, stderr: &str) -> Self {
        self.outcomes.insert(
            module.to_string(),
            SandboxOutcome {
                exit_code: 1,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Modules run, in order
    pub fn runs(&self) -> Vec<String> {
        self.runs.borrow().clone()
    }
}

impl SandboxRunner for FakeSandbox {
    fn run(&self, module: &str) -> Result<SandboxOutcome, SandboxError> {
        self.runs.borrow_mut().push(module.to_string());
        Ok(self
            .outcomes
            .get(module)
            .cloned()
            .unwrap_or_else(|| SandboxOutcome::with_exit_code(0)))
    }
}
