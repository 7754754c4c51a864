//! Equipment checks for both starting-equipment modes and for switching between them.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::catalog::Catalog;
use crate::domain::context::EquipmentMode;
use crate::domain::payload::{ChoiceType, EquipmentEntry, PendingChoice};
use crate::domain::snapshot::StateSnapshot;
use crate::domain::validation::ValidationResult;

#[derive(Debug, Clone)]
pub struct EquipmentValidator {
    catalog: Arc<Catalog>,
}

/// Inputs of [`EquipmentValidator::validate_equipment_state`]
#[derive(Debug, Clone, Copy)]
pub struct EquipmentExpectation<'a> {
    pub mode: EquipmentMode,
    /// Choice group -> item slugs recorded while resolving equipment choices
    pub selections: &'a BTreeMap<String, Vec<String>>,
    pub class_slug: Option<&'a str>,
    pub background_slug: Option<&'a str>,
    /// Fixed class equipment is only granted once every equipment choice is made
    pub all_choices_resolved: bool,
}

impl EquipmentValidator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn validate_equipment_state(
        &self,
        snapshot: &StateSnapshot,
        expectation: EquipmentExpectation<'_>,
    ) -> ValidationResult {
        let equipment = &snapshot.raw.equipment;
        let slugs: Vec<&str> = equipment.iter().filter_map(EquipmentEntry::slug).collect();
        let mut errors: Vec<(String, &'static str)> = Vec::new();

        if let Some(background) = expectation.background_slug {
            errors.extend(self.check_background_equipment(equipment, &slugs, background));
        }

        match expectation.mode {
            EquipmentMode::Gold => errors.extend(Self::check_gold_mode(equipment)),
            EquipmentMode::Equipment => {
                if let Some(class_slug) = expectation.class_slug {
                    errors.extend(self.check_equipment_mode(&slugs, expectation, class_slug));
                }
            }
        }

        let pattern = errors.first().map(|(_, p)| *p);
        ValidationResult::from_findings(
            errors.into_iter().map(|(message, _)| message).collect(),
            Vec::new(),
            pattern,
        )
    }

    /// After switching into equipment mode every class choice group must be offered again.
    pub fn validate_equipment_choices_available(
        &self,
        pending: &[PendingChoice],
        class_slug: Option<&str>,
    ) -> ValidationResult {
        let Some(class_slug) = class_slug else {
            return ValidationResult::pass();
        };
        let Some(class) = self.catalog.class(class_slug) else {
            return ValidationResult::pass_with_warnings(vec![format!(
                "Could not find class '{}' to validate equipment choices",
                class_slug
            )]);
        };

        let expected = &class.equipment_choice_groups;
        if expected.is_empty() {
            return ValidationResult::pass();
        }

        let found: Vec<&str> = pending
            .iter()
            .filter(|c| c.choice_type == ChoiceType::Equipment)
            .filter_map(|c| c.metadata.choice_group.as_deref())
            .collect();
        let missing: Vec<&str> = expected
            .iter()
            .map(String::as_str)
            .filter(|g| !found.contains(g))
            .collect();

        if missing.is_empty() {
            return ValidationResult::pass();
        }

        let found_text = if found.is_empty() {
            "none".to_string()
        } else {
            found.join(", ")
        };
        ValidationResult::fail(
            vec![format!(
                "Missing equipment choices for choice groups: {} (expected: {}, found: {})",
                missing.join(", "),
                expected.join(", "),
                found_text
            )],
            Some("equipment_choices_missing"),
        )
    }

    pub fn validate_mode_switch(
        &self,
        before: &StateSnapshot,
        after: &StateSnapshot,
        previous: EquipmentMode,
        next: EquipmentMode,
    ) -> ValidationResult {
        let before_equipment = &before.raw.equipment;
        let after_equipment = &after.raw.equipment;

        match (previous, next) {
            (EquipmentMode::Equipment, EquipmentMode::Gold) => {
                let mut errors = Vec::new();
                let mut warnings = Vec::new();
                if after_equipment.iter().any(EquipmentEntry::is_class_sourced) {
                    errors.push("Class equipment not cleared after switching to gold mode".to_string());
                }
                let count = |items: &[EquipmentEntry]| {
                    items.iter().filter(|e| e.is_background_sourced()).count()
                };
                if count(after_equipment) < count(before_equipment) {
                    warnings.push(
                        "Background equipment count decreased after switching to gold mode".to_string(),
                    );
                }
                ValidationResult::from_findings(errors, warnings, Some("class_equipment_not_cleared"))
            }
            (EquipmentMode::Gold, EquipmentMode::Equipment) => {
                if after_equipment.iter().any(EquipmentEntry::is_starting_gold) {
                    ValidationResult::fail(
                        vec!["Starting wealth gold not cleared after switching to equipment mode".to_string()],
                        Some("starting_gold_not_cleared"),
                    )
                } else {
                    ValidationResult::pass()
                }
            }
            _ => ValidationResult::pass(),
        }
    }

    fn check_background_equipment(
        &self,
        equipment: &[EquipmentEntry],
        slugs: &[&str],
        background_slug: &str,
    ) -> Vec<(String, &'static str)> {
        let Some(background) = self.catalog.background(background_slug) else {
            return vec![(
                format!("Could not find background '{}' to validate equipment", background_slug),
                "background_equipment_missing",
            )];
        };

        let has_description_item = equipment
            .iter()
            .any(|e| e.is_background_sourced() && e.is_description_only());

        background
            .equipment
            .iter()
            .filter(|item| !slugs.contains(&item.slug.as_str()) && !has_description_item)
            .map(|item| {
                (
                    format!(
                        "Missing background equipment: {} ({})",
                        item.name.as_deref().unwrap_or(&item.slug),
                        item.slug
                    ),
                    "background_equipment_missing",
                )
            })
            .collect()
    }

    fn check_gold_mode(equipment: &[EquipmentEntry]) -> Vec<(String, &'static str)> {
        let mut errors = Vec::new();

        let gold_entries = equipment.iter().filter(|e| e.is_starting_gold()).count();
        if gold_entries == 0 {
            errors.push((
                "Gold mode selected but no starting wealth gold found in equipment".to_string(),
                "starting_gold_missing",
            ));
        } else if gold_entries > 1 {
            errors.push((
                format!(
                    "Gold mode selected but found {} starting wealth gold entries",
                    gold_entries
                ),
                "starting_gold_duplicated",
            ));
        }

        let class_items: Vec<&str> = equipment
            .iter()
            .filter(|e| e.is_class_sourced())
            .map(|e| e.slug().unwrap_or("(description)"))
            .collect();
        if !class_items.is_empty() {
            errors.push((
                format!(
                    "Gold mode selected but found class equipment that should be cleared: {}",
                    class_items.join(", ")
                ),
                "class_equipment_in_gold_mode",
            ));
        }

        errors
    }

    fn check_equipment_mode(
        &self,
        slugs: &[&str],
        expectation: EquipmentExpectation<'_>,
        class_slug: &str,
    ) -> Vec<(String, &'static str)> {
        let Some(class) = self.catalog.class(class_slug) else {
            return vec![(
                format!("Could not find class '{}' to validate equipment", class_slug),
                "fixed_class_equipment_missing",
            )];
        };

        let mut errors = Vec::new();
        if expectation.all_choices_resolved {
            for item in &class.fixed_equipment {
                if !slugs.contains(&item.slug.as_str()) {
                    errors.push((
                        format!(
                            "Missing fixed class equipment: {} ({})",
                            item.name.as_deref().unwrap_or(&item.slug),
                            item.slug
                        ),
                        "fixed_class_equipment_missing",
                    ));
                }
            }
        }

        for (group, selected) in expectation.selections {
            for slug in selected {
                if !slugs.contains(&slug.as_str()) {
                    errors.push((
                        format!("Missing selected equipment from choice group {}: {}", group, slug),
                        "selected_equipment_missing",
                    ));
                }
            }
        }

        errors
    }
}
