//! Cascade checks after a race, background or class switch.
//!
//! Hard failures are reserved for stale data that provably leaked through the switch.
//! Anything two catalog entities may legitimately share (speed, size, saves) only warns.

use std::collections::BTreeSet;

use crate::domain::context::EquipmentMode;
use crate::domain::flow_step::StepAction;
use crate::domain::payload::source;
use crate::domain::snapshot::{DerivedFields, StateSnapshot};
use crate::domain::validation::ValidationResult;

#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchValidator;

/// Collects findings; the first error's pattern becomes the result pattern.
#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    pattern: Option<&'static str>,
}

impl Findings {
    fn error(&mut self, message: String, pattern: &'static str) {
        self.errors.push(message);
        self.pattern.get_or_insert(pattern);
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    fn finish(self) -> ValidationResult {
        ValidationResult::from_findings(self.errors, self.warnings, self.pattern)
    }
}

/// Slugs present under `source` both before and after, in before order
fn persisting(before: &[String], after: &[String]) -> Vec<String> {
    let after: BTreeSet<&String> = after.iter().collect();
    before.iter().filter(|s| after.contains(s)).cloned().collect()
}

impl SwitchValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        action: StepAction,
        before: &StateSnapshot,
        after: &StateSnapshot,
        equipment_mode: Option<EquipmentMode>,
    ) -> ValidationResult {
        let (b, a) = (&before.derived, &after.derived);
        match action {
            StepAction::SwitchRace => self.validate_race_switch(b, a),
            StepAction::SwitchBackground => self.validate_background_switch(b, a, equipment_mode),
            StepAction::SwitchClass => self.validate_class_switch(b, a, equipment_mode),
            _ => ValidationResult::pass(),
        }
    }

    fn validate_race_switch(&self, before: &DerivedFields, after: &DerivedFields) -> ValidationResult {
        let mut findings = Findings::default();

        if before.race_slug == after.race_slug {
            findings.error("Race did not change".to_string(), "race_not_changed");
        }

        let spells = persisting(
            DerivedFields::sourced(&before.spells_by_source, source::RACE),
            DerivedFields::sourced(&after.spells_by_source, source::RACE),
        );
        if !spells.is_empty() {
            findings.error(
                format!("Racial spells not cleared after race switch: {}", spells.join(", ")),
                "racial_spells_not_cleared",
            );
        }

        let features = persisting(
            DerivedFields::sourced(&before.features_by_source, source::RACE),
            DerivedFields::sourced(&after.features_by_source, source::RACE),
        );
        if !features.is_empty() {
            findings.error(
                format!("Racial features not cleared after race switch: {}", features.join(", ")),
                "racial_features_not_cleared",
            );
        }

        if before.language_count == after.language_count && !after.has_pending("language") {
            findings.warning(
                "Language count unchanged after race switch - verify racial languages were properly replaced",
            );
        }
        if before.speed == after.speed {
            findings.warning("Speed unchanged after race switch - may be expected if both races have same speed");
        }
        if before.size == after.size {
            findings.warning("Size unchanged after race switch - may be expected if both races have same size");
        }

        findings.finish()
    }

    fn validate_background_switch(
        &self,
        before: &DerivedFields,
        after: &DerivedFields,
        equipment_mode: Option<EquipmentMode>,
    ) -> ValidationResult {
        let mut findings = Findings::default();

        if before.background_slug == after.background_slug {
            findings.error("Background did not change".to_string(), "background_not_changed");
        }

        let features = persisting(
            DerivedFields::sourced(&before.features_by_source, source::BACKGROUND),
            DerivedFields::sourced(&after.features_by_source, source::BACKGROUND),
        );
        if !features.is_empty() {
            findings.error(
                format!("Background features not cleared: {}", features.join(", ")),
                "background_features_not_cleared",
            );
        }

        if equipment_mode == Some(EquipmentMode::Equipment)
            && before.equipment_slugs == after.equipment_slugs
            && !after.has_pending("equipment")
        {
            findings.warning(
                "Equipment unchanged after background switch in equipment mode - verify background equipment was reset",
            );
        }

        findings.finish()
    }

    fn validate_class_switch(
        &self,
        before: &DerivedFields,
        after: &DerivedFields,
        equipment_mode: Option<EquipmentMode>,
    ) -> ValidationResult {
        let mut findings = Findings::default();

        if before.class_slugs == after.class_slugs {
            findings.error("Class did not change".to_string(), "class_not_changed");
        }

        let spells = persisting(
            DerivedFields::sourced(&before.spells_by_source, source::CLASS),
            DerivedFields::sourced(&after.spells_by_source, source::CLASS),
        );
        if !spells.is_empty() {
            findings.error(
                format!("Class spells not cleared after class switch: {}", spells.join(", ")),
                "class_spells_not_cleared",
            );
        }

        let features = persisting(
            DerivedFields::sourced(&before.features_by_source, source::CLASS),
            DerivedFields::sourced(&after.features_by_source, source::CLASS),
        );
        if !features.is_empty() {
            findings.error(
                format!("Class features not cleared after class switch: {}", features.join(", ")),
                "class_features_not_cleared",
            );
        }

        if let (Some(prev), Some(next)) = (&before.spellcasting_ability, &after.spellcasting_ability) {
            if prev == next {
                findings.warning("Spellcasting unchanged after class switch - verify this is expected");
            }
        }

        if equipment_mode == Some(EquipmentMode::Equipment)
            && before.equipment_slugs == after.equipment_slugs
            && !after.has_pending("equipment")
        {
            findings.warning(
                "Equipment unchanged after class switch in equipment mode - verify class equipment was reset",
            );
        }

        if before.saving_throw_proficiencies == after.saving_throw_proficiencies {
            findings.warning("Saving throw proficiencies unchanged after class switch");
        }

        findings.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot_from_json;
    use serde_json::json;

    fn race_state(race: &str, speed: u32, spells: &[&str], features: &[&str]) -> StateSnapshot {
        let spells: Vec<_> = spells.iter().map(|s| json!({"slug": s, "source": "race"})).collect();
        let features: Vec<_> = features.iter().map(|s| json!({"slug": s, "source": "race"})).collect();
        snapshot_from_json(json!({
            "character": {"race": {"slug": race}, "speed": speed, "size": "Medium"},
            "spells": spells,
            "features": features,
            "languages": [{"slug": "common", "source": "race"}]
        }))
    }

    #[test]
    fn clean_race_switch_passes_with_soft_warnings() {
        let before = race_state("tiefling", 30, &["thaumaturgy"], &["hellish-resistance"]);
        let after = race_state("dwarf", 25, &[], &["dwarven-resilience"]);
        let result = SwitchValidator::new().validate(StepAction::SwitchRace, &before, &after, None);
        assert!(result.passed);
        // same size, same language count
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn leaked_racial_spell_fails() {
        let before = race_state("tiefling", 30, &["thaumaturgy"], &[]);
        let after = race_state("human", 30, &["thaumaturgy"], &[]);
        let result = SwitchValidator::new().validate(StepAction::SwitchRace, &before, &after, None);
        assert!(!result.passed);
        assert_eq!(result.pattern.as_deref(), Some("racial_spells_not_cleared"));
        assert!(result.errors[0].contains("thaumaturgy"));
    }

    #[test]
    fn unchanged_race_pattern_takes_precedence() {
        let before = race_state("elf", 30, &[], &["fey-ancestry"]);
        let after = race_state("elf", 30, &[], &["fey-ancestry"]);
        let result = SwitchValidator::new().validate(StepAction::SwitchRace, &before, &after, None);
        assert_eq!(result.pattern.as_deref(), Some("race_not_changed"));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn class_switch_flags_leaked_features_and_warns_on_saves() {
        let before = snapshot_from_json(json!({
            "character": {"classes": [{"class": {"slug": "fighter"}}]},
            "features": [{"slug": "second-wind", "source": "class"}],
            "stats": {"saving_throws": {"strength": {"proficient": true}}}
        }));
        let after = snapshot_from_json(json!({
            "character": {"classes": [{"class": {"slug": "rogue"}}]},
            "features": [{"slug": "second-wind", "source": "class"}, {"slug": "sneak-attack", "source": "class"}],
            "stats": {"saving_throws": {"strength": {"proficient": true}}}
        }));
        let result = SwitchValidator::new().validate(
            StepAction::SwitchClass,
            &before,
            &after,
            Some(EquipmentMode::Gold),
        );
        assert!(!result.passed);
        assert_eq!(result.pattern.as_deref(), Some("class_features_not_cleared"));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Saving throw proficiencies unchanged")));
    }

    #[test]
    fn background_equipment_warning_only_in_equipment_mode() {
        let before = snapshot_from_json(json!({
            "character": {"background": {"slug": "acolyte"}},
            "equipment": [{"item_slug": "holy-symbol", "custom_description": {"source": "background"}}]
        }));
        let after = snapshot_from_json(json!({
            "character": {"background": {"slug": "sage"}},
            "equipment": [{"item_slug": "holy-symbol", "custom_description": {"source": "background"}}]
        }));
        let validator = SwitchValidator::new();
        let gold = validator.validate(StepAction::SwitchBackground, &before, &after, Some(EquipmentMode::Gold));
        let equipment =
            validator.validate(StepAction::SwitchBackground, &before, &after, Some(EquipmentMode::Equipment));
        assert!(gold.passed && gold.warnings.is_empty());
        assert!(equipment.passed);
        assert_eq!(equipment.warnings.len(), 1);
    }
}
