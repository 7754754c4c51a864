use serde::{Deserialize, Serialize};

/// Outcome of one validator run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Machine-readable failure category, e.g. `racial_spells_not_cleared`
    pub pattern: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn pass_with_warnings(warnings: Vec<String>) -> Self {
        Self {
            passed: true,
            warnings,
            ..Self::default()
        }
    }

    pub fn fail(errors: Vec<String>, pattern: Option<&str>) -> Self {
        Self {
            passed: false,
            errors,
            warnings: Vec::new(),
            pattern: pattern.map(str::to_string),
        }
    }

    /// Passed iff `errors` is empty; warnings are kept either way.
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>, pattern: Option<&str>) -> Self {
        let passed = errors.is_empty();
        Self {
            passed,
            errors,
            warnings,
            pattern: if passed { None } else { pattern.map(str::to_string) },
        }
    }

    /// Combine two results; the first failing pattern wins.
    pub fn merge(self, other: ValidationResult) -> Self {
        let pattern = if !self.passed {
            self.pattern
        } else if !other.passed {
            other.pattern
        } else {
            None
        };
        let mut errors = self.errors;
        errors.extend(other.errors);
        let mut warnings = self.warnings;
        warnings.extend(other.warnings);
        Self {
            passed: self.passed && other.passed,
            errors,
            warnings,
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_failing_pattern() {
        let merged = ValidationResult::pass_with_warnings(vec!["w".into()])
            .merge(ValidationResult::fail(vec!["a".into()], Some("first")))
            .merge(ValidationResult::fail(vec!["b".into()], Some("second")));
        assert!(!merged.passed);
        assert_eq!(merged.pattern.as_deref(), Some("first"));
        assert_eq!(merged.errors, vec!["a", "b"]);
        assert_eq!(merged.warnings, vec!["w"]);
    }

    #[test]
    fn findings_without_errors_pass() {
        let r = ValidationResult::from_findings(vec![], vec!["soft".into()], Some("ignored"));
        assert!(r.passed);
        assert_eq!(r.pattern, None);
    }
}
