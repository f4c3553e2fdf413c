//! Pipeline stages and their legal transitions

use crate::error::StageError;
use serde::{Deserialize, Serialize};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Refreshing the evidence corpus
    BuildCorpus,
    /// Ranking evidence for the task
    Retrieve,
    /// Building the prompt for an attempt
    Prompt,
    /// Waiting on the model
    ModelCall,
    /// Deny-list scan
    PolicyGate,
    /// Cited ids exist
    GroundingExistenceGate,
    /// Citations are sufficient
    GroundingSufficiencyGate,
    /// Patch applies cleanly
    PatchDryRunGate,
    /// Patch applied to the working tree
    PatchApplyGate,
    /// Touched module tests
    SandboxGate,
    /// Every gate passed
    Success,
    /// Run stopped without success
    Failed,
}

impl Stage {
    /// Terminal stages have no successors
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Gate stages can send an attempt back to [`Stage::Prompt`]
    #[inline]
    #[must_use]
    pub fn is_gate(self) -> bool {
        matches!(
            self,
            Self::ModelCall
                | Self::PolicyGate
                | Self::GroundingExistenceGate
                | Self::GroundingSufficiencyGate
                | Self::PatchDryRunGate
                | Self::PatchApplyGate
                | Self::SandboxGate
        )
    }
}

/// Validates a stage transition
///
/// # Errors
/// [`StageError`] when `to` is not reachable from `from`.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), StageError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StageError { from, to })
    }
}

/// Stages reachable from `from`
#[must_use]
pub fn allowed_transitions(from: Stage) -> Vec<Stage> {
    use Stage::*;
    match from {
        BuildCorpus => vec![Retrieve, Failed],
        Retrieve => vec![Prompt, Failed],
        Prompt => vec![ModelCall, Failed],
        ModelCall => vec![PolicyGate, Prompt, Failed],
        PolicyGate => vec![GroundingExistenceGate, Prompt, Failed],
        GroundingExistenceGate => vec![GroundingSufficiencyGate, Prompt, Failed],
        GroundingSufficiencyGate => vec![PatchDryRunGate, Prompt, Failed],
        PatchDryRunGate => vec![PatchApplyGate, Prompt, Failed],
        PatchApplyGate => vec![SandboxGate, Prompt, Failed],
        SandboxGate => vec![Success, Prompt, Failed],
        Success | Failed => vec![],
    }
}

/// Current stage of a run, moved only through legal transitions
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Stage,
    history: Vec<Stage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// Start at [`Stage::BuildCorpus`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Stage::BuildCorpus,
            history: vec![Stage::BuildCorpus],
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn current(&self) -> Stage {
        self.current
    }

    /// Every stage visited, in order
    #[must_use]
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Move to `to`
    ///
    /// # Errors
    /// [`StageError`] on an illegal transition; the tracker is unchanged.
    pub fn advance(&mut self, to: Stage) -> Result<(), StageError> {
        validate_transition(self.current, to)?;
        tracing::debug!(from = ?self.current, to = ?to, "Stage transition");
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 12] = [
        Stage::BuildCorpus,
        Stage::Retrieve,
        Stage::Prompt,
        Stage::ModelCall,
        Stage::PolicyGate,
        Stage::GroundingExistenceGate,
        Stage::GroundingSufficiencyGate,
        Stage::PatchDryRunGate,
        Stage::PatchApplyGate,
        Stage::SandboxGate,
        Stage::Success,
        Stage::Failed,
    ];

    #[test]
    fn happy_path_is_legal() {
        let mut tracker = StageTracker::new();
        for stage in &ALL[1..11] {
            tracker.advance(*stage).unwrap();
        }
        assert_eq!(tracker.current(), Stage::Success);
        assert_eq!(tracker.history().len(), 11);
    }

    #[test]
    fn terminal_stages_have_no_successors() {
        for from in [Stage::Success, Stage::Failed] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(validate_transition(from, to).is_err());
            }
        }
    }

    #[test]
    fn only_gates_retry() {
        for from in ALL {
            assert_eq!(
                validate_transition(from, Stage::Prompt).is_ok(),
                from.is_gate() || from == Stage::Retrieve,
                "{from:?}"
            );
        }
    }

    #[test]
    fn every_non_terminal_stage_can_fail() {
        for from in ALL.iter().copied().filter(|s| !s.is_terminal()) {
            assert!(validate_transition(from, Stage::Failed).is_ok(), "{from:?}");
        }
    }

    #[test]
    fn gates_cannot_be_skipped() {
        assert_eq!(
            validate_transition(Stage::PolicyGate, Stage::PatchApplyGate),
            Err(StageError {
                from: Stage::PolicyGate,
                to: Stage::PatchApplyGate
            })
        );
        assert!(validate_transition(Stage::Retrieve, Stage::ModelCall).is_err());
    }

    #[test]
    fn illegal_advance_leaves_tracker_unchanged() {
        let mut tracker = StageTracker::new();
        assert!(tracker.advance(Stage::Success).is_err());
        assert_eq!(tracker.current(), Stage::BuildCorpus);
    }
}
