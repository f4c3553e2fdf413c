//! Module test runners

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

/// Captured result of one module test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxOutcome {
    /// Process exit code; -1 when killed by a signal
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl SandboxOutcome {
    /// Outcome with empty output
    #[must_use]
    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// True when the tests passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs the tests of one module in isolation
pub trait SandboxRunner {
    /// Run `module`'s tests and capture the result
    ///
    /// # Errors
    /// [`SandboxError`] when the tests could not be started. A failing test
    /// run is an `Ok` outcome with a non-zero exit code.
    fn run(&self, module: &str) -> Result<SandboxOutcome, SandboxError>;
}

/// Runs module tests in a throwaway, network-less container
///
/// The module directory is mounted read-only; memory and CPU are capped.
#[derive(Debug, Clone)]
pub struct ContainerSandbox {
    repo_root: PathBuf,
    config: SandboxConfig,
}

impl ContainerSandbox {
    /// Create a runner for modules under `repo_root`
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, config: SandboxConfig) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Resolve and check the module directory
    ///
    /// # Errors
    /// `InvalidModule` for names that are not a single normal path
    /// component, `ModuleNotFound` when the directory is missing.
    pub fn module_dir(&self, module: &str) -> Result<PathBuf, SandboxError> {
        let mut components = Path::new(module).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if module.is_empty() || !single_normal || module.contains(['/', '\\']) {
            return Err(SandboxError::InvalidModule(module.to_string()));
        }

        let dir = self
            .repo_root
            .join(&self.config.modules_dir)
            .join(module);
        if !dir.is_dir() {
            return Err(SandboxError::ModuleNotFound(dir));
        }
        Ok(dir.canonicalize().unwrap_or(dir))
    }

    /// Runtime arguments for `module`, without the runtime binary
    ///
    /// # Errors
    /// See [`Self::module_dir`].
    pub fn command_args(&self, module: &str) -> Result<Vec<String>, SandboxError> {
        let dir = self.module_dir(module)?;
        let c = &self.config;
        Ok(vec![
            "run".to_string(),
            "--rm".to_string(),
            format!("--memory={}", c.memory),
            format!("--cpus={}", c.cpus),
            format!("--network={}", c.network),
            "-v".to_string(),
            format!("{}:{}:ro", dir.display(), c.mount_point),
            c.image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            c.test_command.clone(),
        ])
    }
}

impl SandboxRunner for ContainerSandbox {
    fn run(&self, module: &str) -> Result<SandboxOutcome, SandboxError> {
        let args = self.command_args(module)?;
        tracing::info!(%module, runtime = %self.config.runtime, image = %self.config.image, "Running module tests");

        let output = Command::new(&self.config.runtime)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SandboxError::Launch {
                program: self.config.runtime.clone(),
                source,
            })?;

        let outcome = SandboxOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(%module, exit_code = outcome.exit_code, "Module tests finished");
        Ok(outcome)
    }
}
