//! Model boundary
//!
//! The model is an untrusted proposer. Its output is parsed into
//! [`ModelOutput`] here and everything else happens in the gates.

use pgate_policy::GroundingDocument;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

/// A proposal: plan, patch and grounding record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Free-form plan
    #[serde(alias = "plan_json", default)]
    pub plan: serde_json::Value,
    /// Unified diff
    #[serde(alias = "patch_diff")]
    pub patch: String,
    /// Evidence the proposal claims to rely on
    #[serde(alias = "grounding_json", deserialize_with = "grounding_object_or_string")]
    pub grounding: GroundingDocument,
}

fn grounding_object_or_string<'de, D>(deserializer: D) -> Result<GroundingDocument, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(encoded) => serde_json::from_str(&encoded).map_err(D::Error::custom),
        other => serde_json::from_value(other).map_err(D::Error::custom),
    }
}

impl ModelOutput {
    /// Parse and validate raw model output
    ///
    /// # Errors
    /// `ModelError::Malformed` when the JSON does not match or the patch is
    /// blank.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let output: Self =
            serde_json::from_str(json.trim()).map_err(|e| ModelError::Malformed(e.to_string()))?;
        if output.patch.trim().is_empty() {
            return Err(ModelError::Malformed("patch is empty".to_string()));
        }
        Ok(output)
    }

    /// Plan as written to the attempt log; strings are kept verbatim
    #[must_use]
    pub fn plan_text(&self) -> String {
        match &self.plan {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

/// Model call failures
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model could not be reached or gave up
    #[error("{0}")]
    Unavailable(String),

    /// The model command could not be started
    #[error("failed to launch model command {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The model answered with something that is not a proposal
    #[error("{0}")]
    Malformed(String),
}

impl ModelError {
    /// Only malformed output is worth another attempt
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Anything that turns a prompt into a proposal
pub trait ModelClient {
    /// Propose a change for `prompt`
    ///
    /// # Errors
    /// [`ModelError`]; see [`ModelError::is_retryable`].
    fn propose(&self, prompt: &str) -> Result<ModelOutput, ModelError>;
}

/// Runs an external command per proposal
///
/// The prompt goes to stdin; stdout must be the proposal JSON.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    /// Create from a program and its arguments
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl ModelClient for CommandModel {
    fn propose(&self, prompt: &str) -> Result<ModelOutput, ModelError> {
        let launch = |source| ModelError::Launch {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch)?;

        // Stdin is fed on its own thread while the output pipes drain.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_owned();
            thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });
        let output = child.wait_with_output().map_err(launch)?;

        // A child may answer without reading the whole prompt.
        if let Some(Ok(Err(e))) = writer.map(thread::JoinHandle::join) {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(launch(e));
            }
            tracing::debug!(program = %self.program, "Model closed stdin early");
        }

        if !output.status.success() {
            return Err(ModelError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(program = %self.program, bytes = output.stdout.len(), "Model answered");
        ModelOutput::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUNDING: &str =
        r#"{"retrieval": {"query": "fix foo", "cited_chunk_ids": ["POLICY.md::chunk0"]}}"#;

    #[test]
    fn accepts_object_grounding() {
        let json = format!(r#"{{"plan": {{"steps": 1}}, "patch": "diff", "grounding": {GROUNDING}}}"#);
        let output = ModelOutput::from_json(&json).unwrap();
        assert_eq!(output.grounding.retrieval.query, "fix foo");
        assert_eq!(output.plan["steps"], 1);
    }

    #[test]
    fn accepts_aliases_and_string_grounding() {
        let json = serde_json::json!({
            "plan_json": "{\"steps\": []}",
            "patch_diff": "diff",
            "grounding_json": GROUNDING,
        })
        .to_string();
        let output = ModelOutput::from_json(&json).unwrap();
        assert_eq!(output.plan_text(), "{\"steps\": []}");
        assert_eq!(output.grounding.retrieval.cited_chunk_ids, vec!["POLICY.md::chunk0"]);
    }

    #[test]
    fn missing_patch_is_malformed() {
        let json = format!(r#"{{"grounding": {GROUNDING}}}"#);
        let err = ModelOutput::from_json(&json).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn blank_patch_is_malformed() {
        let json = format!(r#"{{"patch": "  \n", "grounding": {GROUNDING}}}"#);
        assert!(matches!(
            ModelOutput::from_json(&json),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn grounding_string_must_be_json() {
        let json = r#"{"patch": "diff", "grounding": "not json"}"#;
        assert!(ModelOutput::from_json(json).is_err());
    }

    #[test]
    fn missing_command_is_not_retryable() {
        let model = CommandModel::new("pgate-no-such-model", Vec::<String>::new());
        let err = model.propose("prompt").unwrap_err();
        assert!(matches!(err, ModelError::Launch { .. }));
        assert!(!err.is_retryable());
    }

    #[cfg(unix)]
    #[test]
    fn command_model_reads_stdout() {
        let script = format!(
            "cat > /dev/null; printf '%s' '{{\"patch\": \"diff\", \"grounding\": {GROUNDING}}}'"
        );
        let model = CommandModel::new("sh", ["-c", script.as_str()]);
        let output = model.propose("prompt").unwrap();
        assert_eq!(output.patch, "diff");
    }

    #[cfg(unix)]
    #[test]
    fn large_prompt_ignored_by_command() {
        let script = format!("printf '%s' '{{\"patch\": \"diff\", \"grounding\": {GROUNDING}}}'");
        let model = CommandModel::new("sh", ["-c", script.as_str()]);
        let output = model.propose(&"x".repeat(300 * 1024)).unwrap();
        assert_eq!(output.patch, "diff");
    }

    #[cfg(unix)]
    #[test]
    fn large_prompt_echoed_to_stderr() {
        let script = format!("cat >&2; printf '%s' '{{\"patch\": \"diff\", \"grounding\": {GROUNDING}}}'");
        let model = CommandModel::new("sh", ["-c", script.as_str()]);
        let output = model.propose(&"x".repeat(300 * 1024)).unwrap();
        assert_eq!(output.patch, "diff");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_unavailable() {
        let model = CommandModel::new("sh", ["-c", "cat > /dev/null; echo boom >&2; exit 3"]);
        let err = model.propose("prompt").unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(ref m) if m.contains("boom")));
    }
}
