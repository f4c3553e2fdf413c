//! Patch inspection and application

use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

const NEW_PREFIX: &str = "+++ b/modules/";
const OLD_PREFIX: &str = "--- a/modules/";

/// Modules named by `modules/<name>/` diff headers, sorted and unique
///
/// Both the old-file and new-file sides count, so deletions and renames
/// still select the module.
#[must_use]
pub fn touched_modules(patch: &str) -> Vec<String> {
    patch
        .lines()
        .filter_map(|line| {
            line.strip_prefix(NEW_PREFIX)
                .or_else(|| line.strip_prefix(OLD_PREFIX))
        })
        .filter_map(|rest| {
            let name = rest.split('/').next().unwrap_or_default().trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Patch tool failures
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The tool ran and refused the patch
    #[error("{output}")]
    Rejected { output: String },

    /// The tool could not be run
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    /// A rejected patch can be fixed by the next proposal
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Dry-runs and applies patches to the working tree
pub trait PatchApplier {
    /// Check that `patch` applies cleanly, without changing anything
    ///
    /// # Errors
    /// [`PatchError`]
    fn check(&self, patch: &str) -> Result<(), PatchError>;

    /// Apply `patch` to the working tree
    ///
    /// # Errors
    /// [`PatchError`]
    fn apply(&self, patch: &str) -> Result<(), PatchError>;
}

/// `git apply` in the repository root, patch on stdin
#[derive(Debug, Clone)]
pub struct GitPatchApplier {
    repo_root: PathBuf,
    program: String,
}

impl GitPatchApplier {
    /// Create for `repo_root`
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            program: "git".to_string(),
        }
    }

    /// With a different git binary
    #[inline]
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn git_apply(&self, extra: &[&str], patch: &str) -> Result<(), PatchError> {
        let launch = |source| PatchError::Launch {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .arg("apply")
            .args(extra)
            .arg("-")
            .current_dir(&self.repo_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch)?;

        let writer = child.stdin.take().map(|mut stdin| {
            let patch = patch.to_owned();
            thread::spawn(move || stdin.write_all(patch.as_bytes()))
        });
        let output = child.wait_with_output().map_err(launch)?;
        if let Some(Ok(Err(e))) = writer.map(thread::JoinHandle::join) {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(launch(e));
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Err(PatchError::Rejected { output: text })
        }
    }
}

impl PatchApplier for GitPatchApplier {
    fn check(&self, patch: &str) -> Result<(), PatchError> {
        self.git_apply(&["--check"], patch)
    }

    fn apply(&self, patch: &str) -> Result<(), PatchError> {
        self.git_apply(&[], patch)
    }
}
