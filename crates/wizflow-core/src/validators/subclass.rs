//! Checks that a chosen subclass actually granted its features, spells and proficiencies.
//!
//! Counts decide failures. When the subject granted as many entries as expected but
//! under different identifiers, only a warning is raised.

use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::domain::catalog::{Catalog, SubclassEntry};
use crate::domain::payload::source;
use crate::domain::snapshot::StateSnapshot;
use crate::domain::validation::ValidationResult;

#[derive(Debug, Clone)]
pub struct SubclassValidator {
    catalog: Arc<Catalog>,
    config: HarnessConfig,
}

impl SubclassValidator {
    pub fn new(catalog: Arc<Catalog>, config: HarnessConfig) -> Self {
        Self { catalog, config }
    }

    /// Run every subclass check against `after` and merge the results.
    pub fn validate(&self, after: &StateSnapshot, subclass_slug: &str, level: u32) -> ValidationResult {
        let Some((class, subclass)) = self.catalog.subclass(subclass_slug) else {
            return ValidationResult::pass_with_warnings(vec![format!(
                "Subclass '{}' not found in catalog, skipping subclass checks",
                subclass_slug
            )]);
        };

        let mut result = self.validate_features(after, subclass, level);
        if self.config.is_always_prepared_class(&class.slug) {
            result = result.merge(self.validate_spells(after, subclass, level));
        }
        result.merge(self.validate_proficiencies(after, subclass, level))
    }

    pub fn validate_features(
        &self,
        after: &StateSnapshot,
        subclass: &SubclassEntry,
        level: u32,
    ) -> ValidationResult {
        let expected: Vec<&str> = subclass
            .expected_features(level)
            .into_iter()
            .map(|f| f.slug.as_str())
            .collect();
        if expected.is_empty() {
            return ValidationResult::pass_with_warnings(vec![format!(
                "Subclass {} has no features at level {} in catalog",
                subclass.name, level
            )]);
        }

        let granted: Vec<&str> = after
            .raw
            .features
            .iter()
            .filter(|f| f.source == source::SUBCLASS && !f.is_choice_option)
            .map(|f| f.slug.as_str())
            .collect();

        compare_counts(
            &expected,
            &granted,
            Labels {
                what: "subclass features",
                subclass: &subclass.name,
                none_pattern: "subclass_features_missing",
                fewer_pattern: "subclass_features_incomplete",
            },
        )
    }

    pub fn validate_spells(
        &self,
        after: &StateSnapshot,
        subclass: &SubclassEntry,
        level: u32,
    ) -> ValidationResult {
        let expected: Vec<&str> = subclass
            .expected_always_prepared_spells(level)
            .into_iter()
            .map(|s| s.slug.as_str())
            .collect();
        if expected.is_empty() {
            return ValidationResult::pass();
        }

        let granted: Vec<&str> = after
            .raw
            .spells
            .iter()
            .filter(|s| s.source == source::SUBCLASS || s.always_prepared)
            .map(|s| s.slug.as_str())
            .collect();

        compare_counts(
            &expected,
            &granted,
            Labels {
                what: "always-prepared subclass spells",
                subclass: &subclass.name,
                none_pattern: "subclass_spells_missing",
                fewer_pattern: "subclass_spells_missing",
            },
        )
    }

    pub fn validate_proficiencies(
        &self,
        after: &StateSnapshot,
        subclass: &SubclassEntry,
        level: u32,
    ) -> ValidationResult {
        let expected: Vec<&str> = subclass
            .expected_proficiencies(level)
            .into_iter()
            .map(|p| p.slug.as_str())
            .collect();
        if expected.is_empty() {
            return ValidationResult::pass();
        }

        let granted: Vec<&str> = after
            .raw
            .proficiencies
            .iter()
            .filter(|p| p.source == source::SUBCLASS)
            .map(|p| p.slug.as_str())
            .collect();

        compare_counts(
            &expected,
            &granted,
            Labels {
                what: "subclass proficiencies",
                subclass: &subclass.name,
                none_pattern: "subclass_proficiencies_missing",
                fewer_pattern: "subclass_proficiencies_missing",
            },
        )
    }
}

struct Labels<'a> {
    what: &'static str,
    subclass: &'a str,
    none_pattern: &'static str,
    fewer_pattern: &'static str,
}

fn compare_counts(expected: &[&str], granted: &[&str], labels: Labels<'_>) -> ValidationResult {
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|slug| !granted.contains(slug))
        .collect();

    if granted.is_empty() {
        return ValidationResult::fail(
            vec![format!(
                "No {} granted for {} (expected {}: {})",
                labels.what,
                labels.subclass,
                expected.len(),
                expected.join(", ")
            )],
            Some(labels.none_pattern),
        );
    }

    if granted.len() < expected.len() {
        return ValidationResult::fail(
            vec![format!(
                "Only {} of {} {} granted for {}, missing: {}",
                granted.len(),
                expected.len(),
                labels.what,
                labels.subclass,
                missing.join(", ")
            )],
            Some(labels.fewer_pattern),
        );
    }

    if !missing.is_empty() {
        return ValidationResult::pass_with_warnings(vec![format!(
            "Expected {} not found by identifier for {}: {}",
            labels.what,
            labels.subclass,
            missing.join(", ")
        )]);
    }

    ValidationResult::pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog_from_json, snapshot_from_json};
    use serde_json::json;

    fn validator() -> SubclassValidator {
        let catalog = catalog_from_json(json!({
            "races": [],
            "backgrounds": [],
            "classes": [
                {
                    "slug": "cleric", "name": "Cleric", "spellcaster": true, "subclass_level": 1,
                    "subclasses": [{
                        "slug": "life-domain", "name": "Life Domain",
                        "features": [
                            {"slug": "disciple-of-life", "level": 1},
                            {"slug": "bonus-proficiency", "level": 1},
                            {"slug": "preserve-life", "level": 2}
                        ],
                        "spells": [
                            {"slug": "bless", "level": 1, "always_prepared": true},
                            {"slug": "cure-wounds", "level": 1, "always_prepared": true}
                        ],
                        "proficiencies": [{"slug": "heavy-armor", "level": 1}]
                    }]
                },
                {
                    "slug": "warlock", "name": "Warlock", "spellcaster": true, "subclass_level": 1,
                    "subclasses": [{
                        "slug": "fiend", "name": "The Fiend",
                        "features": [{"slug": "dark-ones-blessing", "level": 1}],
                        "spells": [{"slug": "burning-hands", "level": 1, "always_prepared": true}]
                    }, {
                        "slug": "empty-patron", "name": "Empty Patron"
                    }]
                }
            ]
        }));
        SubclassValidator::new(Arc::new(catalog), HarnessConfig::default())
    }

    fn life_domain(features: &[&str], spells: &[&str], proficiencies: &[&str]) -> StateSnapshot {
        let sourced = |slugs: &[&str]| -> Vec<serde_json::Value> {
            slugs.iter().map(|s| json!({"slug": s, "source": "subclass"})).collect()
        };
        snapshot_from_json(json!({
            "features": sourced(features),
            "spells": sourced(spells),
            "proficiencies": sourced(proficiencies)
        }))
    }

    #[test]
    fn fully_granted_subclass_passes() {
        let after = life_domain(
            &["disciple-of-life", "bonus-proficiency"],
            &["bless", "cure-wounds"],
            &["heavy-armor"],
        );
        let result = validator().validate(&after, "life-domain", 1);
        assert!(result.passed, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn no_features_is_a_hard_failure() {
        let after = life_domain(&[], &["bless", "cure-wounds"], &["heavy-armor"]);
        let result = validator().validate(&after, "life-domain", 1);
        assert!(!result.passed);
        assert_eq!(result.pattern.as_deref(), Some("subclass_features_missing"));
    }

    #[test]
    fn fewer_features_lists_missing() {
        let after = life_domain(&["disciple-of-life"], &["bless", "cure-wounds"], &["heavy-armor"]);
        let result = validator().validate(&after, "life-domain", 1);
        assert_eq!(result.pattern.as_deref(), Some("subclass_features_incomplete"));
        assert!(result.errors[0].contains("bonus-proficiency"));
    }

    #[test]
    fn renamed_features_only_warn() {
        let after = life_domain(
            &["disciple-of-life", "bonus-proficiency-heavy-armor"],
            &["bless", "cure-wounds"],
            &["heavy-armor"],
        );
        let result = validator().validate(&after, "life-domain", 1);
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn spell_check_gated_by_class_list() {
        let v = validator();
        let cleric = life_domain(&["disciple-of-life", "bonus-proficiency"], &[], &["heavy-armor"]);
        assert_eq!(
            v.validate(&cleric, "life-domain", 1).pattern.as_deref(),
            Some("subclass_spells_missing")
        );

        let warlock = snapshot_from_json(json!({
            "features": [{"slug": "dark-ones-blessing", "source": "subclass"}]
        }));
        assert!(v.validate(&warlock, "fiend", 1).passed);
    }

    #[test]
    fn subclass_without_catalog_features_passes_with_warning() {
        let result = validator().validate(&snapshot_from_json(json!({})), "empty-patron", 1);
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
    }
}
