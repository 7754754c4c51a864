use crate::domain::payload::ValidationPayload;
use crate::domain::snapshot::StateSnapshot;
use crate::domain::validation::ValidationResult;

/// Correlates the subject's completeness flag with outstanding required choices
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionValidator;

impl CompletionValidator {
    pub fn new() -> Self {
        Self
    }

    /// `report` is the `/validate` body when available; the snapshot's
    /// character flags are used otherwise.
    pub fn validate(&self, after: &StateSnapshot, report: Option<&ValidationPayload>) -> ValidationResult {
        let derived = &after.derived;
        let (is_complete, missing) = match report {
            Some(report) => (report.is_complete && derived.is_complete, merged_missing(report, after)),
            None => (derived.is_complete, derived.validation_status.missing.clone()),
        };

        let required = &derived.required_pending_types;

        if !is_complete {
            let mut errors: Vec<String> = missing.iter().map(|m| format!("Missing: {}", m)).collect();
            errors.extend(
                required
                    .iter()
                    .map(|t| format!("Unresolved required choice: {}", t)),
            );
            if errors.is_empty() {
                errors.push("Character is not complete".to_string());
            }
            return ValidationResult::fail(errors, Some("character_incomplete"));
        }

        if !required.is_empty() {
            return ValidationResult::fail(
                vec![format!(
                    "Character reported complete with required choices pending: {}",
                    required.join(", ")
                )],
                Some("complete_with_required_choices"),
            );
        }

        ValidationResult::pass_with_warnings(
            derived
                .optional_pending_types
                .iter()
                .map(|t| format!("Optional choice still pending: {}", t))
                .collect(),
        )
    }
}

fn merged_missing(report: &ValidationPayload, after: &StateSnapshot) -> Vec<String> {
    let mut missing = report.missing.clone();
    for field in &after.derived.validation_status.missing {
        if !missing.contains(field) {
            missing.push(field.clone());
        }
    }
    missing
}
