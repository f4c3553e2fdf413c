//! Textual deny-list scan of a proposed patch
//!
//! This is a cheap first filter over the literal diff text. It does not try to
//! see through obfuscation; the sandbox is the isolation boundary.

use crate::config::PolicyConfig;
use crate::error::{PolicyError, PolicyViolation};
use regex::Regex;

/// Scans patch text for protected targets, then for dangerous patterns
#[derive(Debug, Clone)]
pub struct PolicyEnforcer {
    targets: Vec<String>,
    patterns: Vec<(String, Regex)>,
}

impl PolicyEnforcer {
    /// Compile the configured deny-lists
    ///
    /// # Errors
    /// `PolicyError::InvalidPattern` for the first pattern that fails to
    /// compile.
    pub fn new(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let patterns = config
            .forbidden_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map(|re| (p.clone(), re))
                    .map_err(|source| PolicyError::InvalidPattern {
                        pattern: p.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            targets: config.forbidden_targets.clone(),
            patterns,
        })
    }

    /// Check a patch; the first violation short-circuits
    ///
    /// Targets are checked before patterns, each in configured order.
    ///
    /// # Errors
    /// The first [`PolicyViolation`] found.
    pub fn check(&self, patch_text: &str) -> Result<(), PolicyViolation> {
        if let Some(target) = self.targets.iter().find(|t| patch_text.contains(t.as_str())) {
            tracing::debug!(%target, "Patch touches forbidden target");
            return Err(PolicyViolation::ForbiddenTarget(target.clone()));
        }

        if let Some((pattern, _)) = self.patterns.iter().find(|(_, re)| re.is_match(patch_text)) {
            tracing::debug!(%pattern, "Patch matches forbidden pattern");
            return Err(PolicyViolation::ForbiddenPattern(pattern.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enforcer() -> PolicyEnforcer {
        PolicyEnforcer::new(&PolicyConfig::default()).unwrap()
    }

    const CLEAN_PATCH: &str = "\
--- a/modules/foo/foo.py
+++ b/modules/foo/foo.py
@@ -1 +1 @@
-def foo(): return 1
+def foo(): return 2
";

    #[test]
    fn clean_patch_passes() {
        assert_eq!(enforcer().check(CLEAN_PATCH), Ok(()));
    }

    #[test]
    fn forbidden_target_fails() {
        let patch = "+++ b/policies/enforcer.py\n+pass\n";
        let err = enforcer().check(patch).unwrap_err();
        assert_eq!(err, PolicyViolation::ForbiddenTarget("policies/".to_string()));
        assert!(err.to_string().to_lowercase().contains("forbidden target"));
    }

    #[test]
    fn forbidden_pattern_fails() {
        let patch = format!("{CLEAN_PATCH}+import os\n+os.system('ls')\n");
        let err = enforcer().check(&patch).unwrap_err();
        assert_eq!(err, PolicyViolation::ForbiddenPattern(r"os\.system".to_string()));
        assert!(err.to_string().to_lowercase().contains("forbidden pattern"));
    }

    #[test]
    fn eval_call_fails() {
        let patch = format!("{CLEAN_PATCH}+x = eval(data)\n");
        assert!(matches!(
            enforcer().check(&patch),
            Err(PolicyViolation::ForbiddenPattern(_))
        ));
    }

    #[test]
    fn target_reported_before_pattern() {
        let patch = "+++ b/vendor/lib.py\n+eval(x)\n";
        assert_eq!(
            enforcer().check(patch),
            Err(PolicyViolation::ForbiddenTarget("vendor/".to_string()))
        );
    }

    #[test]
    fn only_first_target_is_reported() {
        let patch = "+++ b/config/a\n+++ b/vendor/b\n";
        assert_eq!(
            enforcer().check(patch),
            Err(PolicyViolation::ForbiddenTarget("vendor/".to_string()))
        );
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let mut config = PolicyConfig::default();
        config.forbidden_patterns.push("(unclosed".to_string());
        assert!(matches!(
            PolicyEnforcer::new(&config),
            Err(PolicyError::InvalidPattern { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_digit_only_lines_pass(body in "[0-9 +\\-\n]{0,200}") {
            prop_assert_eq!(enforcer().check(&body), Ok(()));
        }

        #[test]
        fn prop_any_target_anywhere_fails(
            prefix in "[0-9 \n]{0,50}",
            suffix in "[0-9 \n]{0,50}",
            idx in 0usize..8,
        ) {
            let config = PolicyConfig::default();
            let target = &config.forbidden_targets[idx];
            let patch = format!("{prefix}{target}{suffix}");
            prop_assert!(matches!(
                enforcer().check(&patch),
                Err(PolicyViolation::ForbiddenTarget(_))
            ));
        }
    }
}
