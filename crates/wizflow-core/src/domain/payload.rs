//! Typed response bodies of the subject system.
//!
//! These structures are the contract the harness holds the subject to. Anything
//! that fails to decode into them is reported as a contract violation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Item slug of the gold granted in place of class equipment
pub const STARTING_GOLD_SLUG: &str = "gold-gp";

/// Values of `source` markers on granted entities
pub mod source {
    pub const RACE: &str = "race";
    pub const CLASS: &str = "class";
    pub const SUBCLASS: &str = "subclass";
    pub const BACKGROUND: &str = "background";
    pub const STARTING_WEALTH: &str = "starting_wealth";
}

/// `{"data": ...}` wrapper used by every successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCharacter {
    pub id: u64,
    pub public_id: String,
}

/// Slug plus optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: Some(name.into()),
        }
    }
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterClassEntry {
    pub class: EntityRef,
    #[serde(default)]
    pub subclass: Option<EntityRef>,
    #[serde(default = "default_level")]
    pub level: u32,
}

/// Completion flag plus the names of the requirements still missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub is_complete: bool,
    #[serde(default)]
    pub missing: Vec<String>,
}

/// `GET /characters/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterPayload {
    pub id: u64,
    pub public_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alignment: Option<String>,
    #[serde(default)]
    pub race: Option<EntityRef>,
    #[serde(default)]
    pub background: Option<EntityRef>,
    #[serde(default)]
    pub classes: Vec<CharacterClassEntry>,
    #[serde(default)]
    pub ability_scores: BTreeMap<String, i32>,
    #[serde(default)]
    pub speed: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub equipment_mode: Option<String>,
    #[serde(default)]
    pub max_hit_points: Option<i32>,
    #[serde(default)]
    pub current_hit_points: Option<i32>,
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub proficiency_bonus: Option<i32>,
    pub is_complete: bool,
    pub validation_status: ValidationStatus,
}

impl CharacterPayload {
    pub fn primary_class(&self) -> Option<&CharacterClassEntry> {
        self.classes.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrow {
    pub proficient: bool,
    #[serde(default)]
    pub modifier: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spellcasting {
    pub ability: String,
    #[serde(default)]
    pub spell_save_dc: Option<i32>,
}

/// `GET /characters/{id}/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub saving_throws: BTreeMap<String, SavingThrow>,
    #[serde(default)]
    pub spellcasting: Option<Spellcasting>,
    #[serde(default)]
    pub spell_slots: BTreeMap<String, u32>,
}

/// Spell, feature, language or proficiency together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedEntry {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source: String,
    #[serde(default)]
    pub always_prepared: bool,
    #[serde(default)]
    pub is_choice_option: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_group: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// One line of `GET /characters/{id}/equipment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentEntry {
    #[serde(default)]
    pub item_slug: Option<String>,
    #[serde(default)]
    pub item: Option<EntityRef>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub custom_description: Option<CustomDescription>,
}

impl EquipmentEntry {
    /// Item slug, falling back to the nested item reference
    pub fn slug(&self) -> Option<&str> {
        self.item_slug
            .as_deref()
            .or_else(|| self.item.as_ref().map(|i| i.slug.as_str()))
    }

    pub fn source(&self) -> Option<&str> {
        self.custom_description
            .as_ref()
            .and_then(|d| d.source.as_deref())
    }

    pub fn choice_group(&self) -> Option<&str> {
        self.custom_description
            .as_ref()
            .and_then(|d| d.choice_group.as_deref())
    }

    pub fn is_starting_gold(&self) -> bool {
        self.item_slug.as_deref() == Some(STARTING_GOLD_SLUG)
            && self.source() == Some(source::STARTING_WEALTH)
    }

    /// Class equipment is marked with a class source or carries a choice group
    pub fn is_class_sourced(&self) -> bool {
        self.source() == Some(source::CLASS) || self.choice_group().is_some()
    }

    pub fn is_background_sourced(&self) -> bool {
        self.source() == Some(source::BACKGROUND)
    }

    /// Entry that only describes an item (no catalog item attached)
    pub fn is_description_only(&self) -> bool {
        self.item.is_none() && self.item_slug.is_none()
    }
}

/// Kind of pending choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChoiceType {
    Proficiency,
    Language,
    Spell,
    Equipment,
    EquipmentMode,
    Subclass,
    OptionalFeature,
    Other(String),
}

impl ChoiceType {
    pub fn as_str(&self) -> &str {
        match self {
            ChoiceType::Proficiency => "proficiency",
            ChoiceType::Language => "language",
            ChoiceType::Spell => "spell",
            ChoiceType::Equipment => "equipment",
            ChoiceType::EquipmentMode => "equipment_mode",
            ChoiceType::Subclass => "subclass",
            ChoiceType::OptionalFeature => "optional_feature",
            ChoiceType::Other(other) => other,
        }
    }
}

impl From<String> for ChoiceType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "proficiency" => ChoiceType::Proficiency,
            "language" => ChoiceType::Language,
            "spell" => ChoiceType::Spell,
            "equipment" => ChoiceType::Equipment,
            "equipment_mode" => ChoiceType::EquipmentMode,
            "subclass" => ChoiceType::Subclass,
            "optional_feature" => ChoiceType::OptionalFeature,
            _ => ChoiceType::Other(value),
        }
    }
}

impl From<ChoiceType> for String {
    fn from(value: ChoiceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentOptionItem {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default)]
    pub is_pack: bool,
    #[serde(default)]
    pub contents: Vec<EntityRef>,
}

/// Lettered option of an equipment choice (`a`, `b`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentOption {
    pub option: String,
    pub is_category: bool,
    #[serde(default)]
    pub items: Vec<EquipmentOptionItem>,
}

impl EquipmentOption {
    /// Items the player picks from when the option is a category
    pub fn selectable_items(&self) -> impl Iterator<Item = &EquipmentOptionItem> {
        self.items.iter().filter(|i| !i.is_fixed)
    }

    /// A category with nothing selectable cannot be submitted
    pub fn is_valid(&self) -> bool {
        !self.is_category || self.selectable_items().next().is_some()
    }
}

/// Plain selectable value (language, proficiency, spell, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafOption {
    #[serde(alias = "value")]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LeafOption {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: None,
        }
    }
}

/// An option offered by a pending choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceOption {
    Equipment(EquipmentOption),
    Leaf(LeafOption),
}

impl ChoiceOption {
    pub fn as_equipment(&self) -> Option<&EquipmentOption> {
        match self {
            ChoiceOption::Equipment(opt) => Some(opt),
            ChoiceOption::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafOption> {
        match self {
            ChoiceOption::Leaf(opt) => Some(opt),
            ChoiceOption::Equipment(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One entry of `GET /characters/{id}/pending-choices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub id: String,
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    pub required: bool,
    pub remaining: u32,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_endpoint: Option<String>,
    #[serde(default)]
    pub metadata: ChoiceMetadata,
}

impl PendingChoice {
    pub fn is_open(&self) -> bool {
        self.remaining > 0
    }

    /// Number of values to submit
    pub fn selection_count(&self) -> usize {
        self.quantity.unwrap_or(self.remaining).max(1) as usize
    }

    /// Group the choice belongs to, falling back to its id
    pub fn choice_group(&self) -> &str {
        self.metadata.choice_group.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoices {
    #[serde(default)]
    pub choices: Vec<PendingChoice>,
}

/// `GET /characters/{id}/validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPayload {
    pub is_complete: bool,
    #[serde(default)]
    pub missing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn choice_options_decode_into_tagged_kinds() {
        let options: Vec<ChoiceOption> = serde_json::from_value(json!([
            {"option": "a", "is_category": true, "items": [{"slug": "longsword"}, {"slug": "shield", "is_fixed": true}]},
            {"option": "b", "is_category": false, "items": [{"slug": "explorers-pack", "is_pack": true, "contents": [{"slug": "rope"}]}]},
            {"slug": "elvish", "name": "Elvish"},
            {"value": "gold"}
        ]))
        .unwrap();
        let categories: Vec<Option<bool>> = options
            .iter()
            .map(|o| o.as_equipment().map(|e| e.is_category))
            .collect();
        assert_eq!(categories, vec![Some(true), Some(false), None, None]);
        assert_eq!(options[2].as_leaf().unwrap().slug, "elvish");
        assert_eq!(options[3].as_leaf().unwrap().slug, "gold");
    }

    #[test]
    fn category_without_selectable_items_is_invalid() {
        let opt = EquipmentOption {
            option: "a".into(),
            is_category: true,
            items: vec![EquipmentOptionItem {
                slug: "shield".into(),
                name: None,
                is_fixed: true,
                is_pack: false,
                contents: vec![],
            }],
        };
        assert!(!opt.is_valid());
    }

    #[test]
    fn unknown_choice_type_round_trips() {
        let ty: ChoiceType = serde_json::from_value(json!("expertise")).unwrap();
        assert_eq!(ty, ChoiceType::Other("expertise".into()));
        assert_eq!(serde_json::to_value(&ty).unwrap(), json!("expertise"));
    }

    #[test]
    fn starting_gold_needs_slug_and_source() {
        let gold: EquipmentEntry = serde_json::from_value(json!({
            "item_slug": "gold-gp", "quantity": 25,
            "custom_description": {"source": "starting_wealth"}
        }))
        .unwrap();
        assert!(gold.is_starting_gold());
        assert!(!gold.is_class_sourced());

        let loot: EquipmentEntry = serde_json::from_value(json!({"item_slug": "gold-gp"})).unwrap();
        assert!(!loot.is_starting_gold());
    }

    #[test]
    fn missing_required_field_fails_to_decode() {
        let result = serde_json::from_value::<PendingChoice>(json!({"id": "x", "type": "language"}));
        assert!(result.is_err());
    }
}
