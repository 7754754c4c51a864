//! Point-in-time state of one subject plus the flattened fields validators compare.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::payload::{
    CharacterPayload, EquipmentEntry, PendingChoice, SourcedEntry, StatsPayload, ValidationStatus,
};

/// Raw bodies of every read endpoint, decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayloads {
    pub character: CharacterPayload,
    pub stats: StatsPayload,
    pub pending_choices: Vec<PendingChoice>,
    pub spells: Vec<SourcedEntry>,
    pub equipment: Vec<EquipmentEntry>,
    pub languages: Vec<SourcedEntry>,
    pub proficiencies: Vec<SourcedEntry>,
    pub features: Vec<SourcedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub max: Option<i32>,
    pub current: Option<i32>,
}

/// Flattened comparison view of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub race_slug: Option<String>,
    pub race_name: Option<String>,
    pub background_slug: Option<String>,
    pub background_name: Option<String>,
    pub class_slugs: Vec<String>,
    pub subclass_slugs: Vec<String>,
    pub ability_scores: BTreeMap<String, i32>,
    pub speed: Option<u32>,
    pub size: Option<String>,
    pub spells_by_source: BTreeMap<String, Vec<String>>,
    pub spell_count: usize,
    pub languages: Vec<String>,
    pub language_count: usize,
    pub proficiencies: Vec<String>,
    pub proficiency_count: usize,
    pub features_by_source: BTreeMap<String, Vec<String>>,
    pub feature_count: usize,
    pub equipment_slugs: Vec<String>,
    pub equipment_count: usize,
    pub equipment_mode: Option<String>,
    /// Distinct types of choices with something left to pick
    pub pending_choice_types: Vec<String>,
    pub required_pending_types: Vec<String>,
    pub optional_pending_types: Vec<String>,
    pub pending_choice_count: usize,
    pub saving_throw_proficiencies: Vec<String>,
    pub spellcasting_ability: Option<String>,
    pub spell_slots: BTreeMap<String, u32>,
    pub hit_points: HitPoints,
    pub armor_class: Option<i32>,
    pub proficiency_bonus: Option<i32>,
    pub is_complete: bool,
    pub validation_status: ValidationStatus,
}

impl DerivedFields {
    pub fn from_payloads(raw: &SnapshotPayloads) -> Self {
        let character = &raw.character;
        let open: Vec<&PendingChoice> = raw.pending_choices.iter().filter(|c| c.is_open()).collect();

        let distinct_types = |filter: &dyn Fn(&PendingChoice) -> bool| -> Vec<String> {
            open.iter()
                .filter(|c| filter(**c))
                .map(|c| c.choice_type.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        Self {
            race_slug: character.race.as_ref().map(|r| r.slug.clone()),
            race_name: character.race.as_ref().and_then(|r| r.name.clone()),
            background_slug: character.background.as_ref().map(|b| b.slug.clone()),
            background_name: character.background.as_ref().and_then(|b| b.name.clone()),
            class_slugs: character.classes.iter().map(|c| c.class.slug.clone()).collect(),
            subclass_slugs: character
                .classes
                .iter()
                .filter_map(|c| c.subclass.as_ref().map(|s| s.slug.clone()))
                .collect(),
            ability_scores: character.ability_scores.clone(),
            speed: character.speed,
            size: character.size.clone(),
            spells_by_source: group_by_source(&raw.spells),
            spell_count: raw.spells.len(),
            languages: raw.languages.iter().map(|l| l.slug.clone()).collect(),
            language_count: raw.languages.len(),
            proficiencies: raw.proficiencies.iter().map(|p| p.slug.clone()).collect(),
            proficiency_count: raw.proficiencies.len(),
            features_by_source: group_by_source(&raw.features),
            feature_count: raw.features.len(),
            equipment_slugs: raw
                .equipment
                .iter()
                .filter_map(|e| e.slug().map(str::to_string))
                .collect(),
            equipment_count: raw.equipment.len(),
            equipment_mode: character.equipment_mode.clone(),
            pending_choice_types: distinct_types(&|_| true),
            required_pending_types: distinct_types(&|c| c.required),
            optional_pending_types: distinct_types(&|c| !c.required),
            pending_choice_count: open.len(),
            saving_throw_proficiencies: raw
                .stats
                .saving_throws
                .iter()
                .filter(|(_, save)| save.proficient)
                .map(|(ability, _)| ability.clone())
                .collect(),
            spellcasting_ability: raw.stats.spellcasting.as_ref().map(|s| s.ability.clone()),
            spell_slots: raw.stats.spell_slots.clone(),
            hit_points: HitPoints {
                max: character.max_hit_points,
                current: character.current_hit_points,
            },
            armor_class: character.armor_class,
            proficiency_bonus: character.proficiency_bonus,
            is_complete: character.is_complete,
            validation_status: character.validation_status.clone(),
        }
    }

    /// Slugs granted by `source` in a by-source grouping
    pub fn sourced<'a>(grouping: &'a BTreeMap<String, Vec<String>>, source: &str) -> &'a [String] {
        grouping.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_pending(&self, choice_type: &str) -> bool {
        self.pending_choice_types.iter().any(|t| t == choice_type)
    }
}

fn group_by_source(entries: &[SourcedEntry]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.source.clone())
            .or_default()
            .push(entry.slug.clone());
    }
    grouped
}

/// Before/after values of one derived field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub subject_id: u64,
    pub raw: SnapshotPayloads,
    pub derived: DerivedFields,
}

impl StateSnapshot {
    pub fn new(subject_id: u64, raw: SnapshotPayloads) -> Self {
        let derived = DerivedFields::from_payloads(&raw);
        Self {
            timestamp: Utc::now(),
            subject_id,
            raw,
            derived,
        }
    }

    /// Field-wise differences of the derived views, keyed by field name.
    pub fn diff(before: &StateSnapshot, after: &StateSnapshot) -> BTreeMap<String, FieldChange> {
        let before = derived_map(&before.derived);
        let after = derived_map(&after.derived);
        let mut changes = BTreeMap::new();
        for (key, after_value) in after {
            let before_value = before.get(&key).cloned().unwrap_or(Value::Null);
            if before_value != after_value {
                changes.insert(
                    key,
                    FieldChange {
                        before: before_value,
                        after: after_value,
                    },
                );
            }
        }
        changes
    }
}

fn derived_map(derived: &DerivedFields) -> serde_json::Map<String, Value> {
    match serde_json::to_value(derived) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot_from_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn elf_wizard() -> StateSnapshot {
        snapshot_from_json(json!({
            "character": {
                "race": {"slug": "high-elf", "name": "High Elf"},
                "classes": [{"class": {"slug": "wizard"}, "level": 1}],
                "speed": 30, "size": "Medium"
            },
            "spells": [
                {"slug": "fire-bolt", "source": "race"},
                {"slug": "magic-missile", "source": "class"}
            ],
            "features": [{"slug": "darkvision", "source": "race"}],
            "pending_choices": [
                {"id": "lang-1", "type": "language", "required": true, "remaining": 1},
                {"id": "mode", "type": "equipment_mode", "required": true, "remaining": 0},
                {"id": "feat", "type": "optional_feature", "required": false, "remaining": 1}
            ],
            "stats": {"saving_throws": {"intelligence": {"proficient": true}, "strength": {"proficient": false}}}
        }))
    }

    #[test]
    fn diff_against_itself_is_empty() {
        let snap = elf_wizard();
        assert!(StateSnapshot::diff(&snap, &snap).is_empty());
    }

    #[test]
    fn diff_reports_changed_fields_only() {
        let before = elf_wizard();
        let mut raw = before.raw.clone();
        raw.character.speed = Some(25);
        let after = StateSnapshot::new(before.subject_id, raw);
        let diff = StateSnapshot::diff(&before, &after);
        assert_eq!(diff.keys().cloned().collect::<Vec<_>>(), vec!["speed".to_string()]);
        assert_eq!(diff["speed"].before, json!(30));
        assert_eq!(diff["speed"].after, json!(25));
    }

    #[test]
    fn derived_fields_group_and_split_pending_types() {
        let d = elf_wizard().derived;
        assert_eq!(d.race_slug.as_deref(), Some("high-elf"));
        assert_eq!(DerivedFields::sourced(&d.spells_by_source, "race"), ["fire-bolt".to_string()]);
        assert_eq!(d.pending_choice_types, vec!["language", "optional_feature"]);
        assert_eq!(d.required_pending_types, vec!["language"]);
        assert_eq!(d.optional_pending_types, vec!["optional_feature"]);
        assert_eq!(d.pending_choice_count, 2);
        assert_eq!(d.saving_throw_proficiencies, vec!["intelligence"]);
    }
}
