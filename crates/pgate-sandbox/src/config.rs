//! Container runtime settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How module tests are isolated and run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container runtime binary
    pub runtime: String,
    /// Image providing the test interpreter and runner
    pub image: String,
    /// Memory cap passed as `--memory`
    pub memory: String,
    /// CPU cap passed as `--cpus`
    pub cpus: String,
    /// Network mode passed as `--network`
    pub network: String,
    /// Directory holding modules, relative to the repository root
    pub modules_dir: PathBuf,
    /// Mount point of the module inside the container
    pub mount_point: String,
    /// Shell command run inside the container
    pub test_command: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "python:3.11-slim".to_string(),
            memory: "512m".to_string(),
            cpus: "0.5".to_string(),
            network: "none".to_string(),
            modules_dir: PathBuf::from("modules"),
            mount_point: "/workspace".to_string(),
            test_command: "cd /workspace && python -m pytest -q -p no:cacheprovider".to_string(),
        }
    }
}

impl SandboxConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With runtime binary
    #[inline]
    #[must_use]
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// With image
    #[inline]
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// With test command
    #[inline]
    #[must_use]
    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = command.into();
        self
    }
}
