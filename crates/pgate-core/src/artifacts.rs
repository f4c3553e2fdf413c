//! Attempt artifacts
//!
//! The latest attempt's plan, patch and grounding record are kept under the
//! log directory. Each attempt overwrites the previous one.

use crate::error::PipelineError;
use crate::model::ModelOutput;
use std::path::{Path, PathBuf};

/// Writes `plan.json`, `patch.diff` and `grounding.json`
#[derive(Debug, Clone)]
pub struct AttemptArtifacts {
    dir: PathBuf,
}

impl AttemptArtifacts {
    /// Create for a log directory
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Plan location
    #[must_use]
    pub fn plan_path(&self) -> PathBuf {
        self.dir.join("plan.json")
    }

    /// Patch location
    #[must_use]
    pub fn patch_path(&self) -> PathBuf {
        self.dir.join("patch.diff")
    }

    /// Grounding record location
    #[must_use]
    pub fn grounding_path(&self) -> PathBuf {
        self.dir.join("grounding.json")
    }

    /// Overwrite all three artifacts with `output`
    ///
    /// # Errors
    /// `PipelineError::Artifacts` naming the file that failed.
    pub fn write(&self, output: &ModelOutput) -> Result<(), PipelineError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PipelineError::Artifacts { path, source }
        };

        std::fs::create_dir_all(&self.dir).map_err(io(&self.dir))?;

        let grounding = serde_json::to_string_pretty(&output.grounding).map_err(|e| {
            PipelineError::Artifacts {
                path: self.grounding_path(),
                source: e.into(),
            }
        })?;

        for (path, body) in [
            (self.plan_path(), output.plan_text()),
            (self.patch_path(), output.patch.clone()),
            (self.grounding_path(), grounding),
        ] {
            std::fs::write(&path, body).map_err(io(&path))?;
        }
        tracing::debug!(dir = %self.dir.display(), "Wrote attempt artifacts");
        Ok(())
    }
}
