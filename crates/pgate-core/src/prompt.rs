//! Prompt assembly

use crate::error::GateFailure;
use crate::task::Task;
use pgate_corpus::RetrievalResult;

/// Builds the attempt prompt from the task and retrieved evidence
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    governing_docs: Vec<String>,
}

impl PromptBuilder {
    /// Create naming the documents the model must follow
    #[must_use]
    pub fn new(governing_docs: &[String]) -> Self {
        Self {
            governing_docs: governing_docs.to_vec(),
        }
    }

    /// Prompt shared by every attempt of a run
    ///
    /// # Errors
    /// Task serialization failure.
    pub fn base(&self, task: &Task, hits: &[RetrievalResult]) -> Result<String, serde_json::Error> {
        let offered: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        let evidence = hits
            .iter()
            .map(|h| format!("[{}] {}", h.id, h.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(format!(
            "You are an untrusted coding agent.\n\
             Follow {docs}.\n\
             \n\
             You MUST output a single JSON object with:\n\
             - plan_json (JSON)\n\
             - patch_diff (unified diff)\n\
             - grounding_json (JSON) {{\"retrieval\": {{\"query\", \"cited_chunk_ids\", \"min_required\"}}}} \
             with cited_chunk_ids from this list only: {ids}\n\
             \n\
             TASK:\n\
             {task}\n\
             \n\
             RETRIEVED GROUNDS:\n\
             {evidence}\n",
            docs = self.governing_docs.join(" and "),
            ids = serde_json::to_string(&offered)?,
            task = serde_json::to_string_pretty(task)?,
        ))
    }

    /// Base prompt, plus the previous attempt's reason when there is one
    #[must_use]
    pub fn for_attempt(base: &str, last_error: Option<&GateFailure>) -> String {
        match last_error {
            Some(err) => format!("{base}\n\nPREVIOUS_ERROR:\n{err}"),
            None => base.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgate_policy::PolicyViolation;

    fn hit(id: &str, text: &str) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            source: id.split("::").next().unwrap().to_string(),
            score: 0.5,
            text: text.to_string(),
        }
    }

    fn builder() -> PromptBuilder {
        PromptBuilder::new(&["AGENT_CONTRACT.md".to_string(), "POLICY.md".to_string()])
    }

    #[test]
    fn base_lists_offered_ids_and_evidence() {
        let task = Task::new("Fix foo").with_constraint("no network");
        let hits = [hit("POLICY.md::chunk0", "No network."), hit("a.md::chunk1", "Alpha")];
        let prompt = builder().base(&task, &hits).unwrap();

        assert!(prompt.starts_with("You are an untrusted coding agent.\nFollow AGENT_CONTRACT.md and POLICY.md."));
        assert!(prompt.contains(r#"["POLICY.md::chunk0","a.md::chunk1"]"#));
        assert!(prompt.contains("\"goal\": \"Fix foo\""));
        assert!(prompt.contains("[POLICY.md::chunk0] No network.\n\n[a.md::chunk1] Alpha"));
    }

    #[test]
    fn first_attempt_has_no_previous_error() {
        assert_eq!(PromptBuilder::for_attempt("base", None), "base");
    }

    #[test]
    fn previous_error_is_appended() {
        let err = GateFailure::Policy(PolicyViolation::ForbiddenPattern(r"eval\(".into()));
        let prompt = PromptBuilder::for_attempt("base", Some(&err));
        assert_eq!(
            prompt,
            "base\n\nPREVIOUS_ERROR:\nPOLICY_ENFORCER_FAIL: Forbidden pattern detected: eval\\("
        );
    }
}
