//! Sandbox error types

use std::path::PathBuf;

/// Failures that prevent a module's tests from running at all
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Module name is empty or would escape the modules directory
    #[error("invalid module name '{0}'")]
    InvalidModule(String),

    /// Module directory does not exist
    #[error("module directory not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    /// Container runtime could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    /// Whether a different patch could avoid this error
    ///
    /// A missing runtime binary is an environment problem; everything else
    /// depends on what the patch touched.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Launch { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
