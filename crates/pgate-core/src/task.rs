//! Task input

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the model is asked to do
///
/// Fields other than `goal` and `constraints` are kept and shown to the
/// model verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Desired change
    #[serde(default)]
    pub goal: String,
    /// Additional requirements, in order
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Anything else the task file carries
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// Create a task with no constraints
    #[must_use]
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// With an additional constraint
    #[inline]
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Retrieval query: goal followed by constraints, space-joined
    #[must_use]
    pub fn query(&self) -> String {
        std::iter::once(self.goal.as_str())
            .chain(self.constraints.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a task document
    ///
    /// # Errors
    /// `TaskError::Malformed` on a shape mismatch.
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a task file
    ///
    /// # Errors
    /// `TaskError::Io` or `TaskError::Malformed`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TaskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_joins_goal_and_constraints() {
        let task = Task::new("Fix foo")
            .with_constraint("keep API")
            .with_constraint("add tests");
        assert_eq!(task.query(), "Fix foo keep API add tests");
        assert_eq!(Task::new("Fix foo").query(), "Fix foo");
    }

    #[test]
    fn constraints_default_to_empty() {
        let task = Task::from_json(r#"{"goal": "Fix foo"}"#).unwrap();
        assert!(task.constraints.is_empty());
    }

    #[test]
    fn extra_fields_survive() {
        let task = Task::from_json(r#"{"goal": "g", "constraints": [], "ticket": 42}"#).unwrap();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["ticket"], 42);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        assert!(matches!(
            Task::from_json(r#"{"goal": ["not", "text"]}"#),
            Err(TaskError::Malformed(_))
        ));
    }
}
