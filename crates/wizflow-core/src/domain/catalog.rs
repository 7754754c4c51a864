//! Read-only view of the subject's races, classes and backgrounds.

use serde::{Deserialize, Serialize};

use crate::domain::flow_step::ClassType;
use crate::domain::payload::EntityRef;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubraceEntry {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub slug: String,
    pub name: String,
    pub speed: u32,
    pub size: String,
    #[serde(default)]
    pub subraces: Vec<SubraceEntry>,
}

/// Feature or proficiency granted at a given level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelledEntry {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub level: u32,
    #[serde(default)]
    pub is_choice_option: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassSpell {
    pub slug: String,
    pub level: u32,
    #[serde(default)]
    pub always_prepared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub features: Vec<LevelledEntry>,
    #[serde(default)]
    pub spells: Vec<SubclassSpell>,
    #[serde(default)]
    pub proficiencies: Vec<LevelledEntry>,
}

impl SubclassEntry {
    /// Top-level features (choice options excluded) granted at or below `level`
    pub fn expected_features(&self, level: u32) -> Vec<&LevelledEntry> {
        self.features
            .iter()
            .filter(|f| f.level <= level && !f.is_choice_option)
            .collect()
    }

    pub fn expected_always_prepared_spells(&self, level: u32) -> Vec<&SubclassSpell> {
        self.spells
            .iter()
            .filter(|s| s.level <= level && s.always_prepared)
            .collect()
    }

    pub fn expected_proficiencies(&self, level: u32) -> Vec<&LevelledEntry> {
        self.proficiencies
            .iter()
            .filter(|p| p.level <= level && !p.is_choice_option)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub slug: String,
    pub name: String,
    pub spellcaster: bool,
    /// Level at which the subclass is chosen
    #[serde(default)]
    pub subclass_level: Option<u32>,
    #[serde(default)]
    pub subclasses: Vec<SubclassEntry>,
    #[serde(default)]
    pub equipment_choice_groups: Vec<String>,
    #[serde(default)]
    pub fixed_equipment: Vec<EntityRef>,
}

impl ClassEntry {
    pub fn class_type(&self) -> ClassType {
        if self.spellcaster {
            ClassType::Spellcaster
        } else {
            ClassType::Martial
        }
    }

    /// Subclass is picked during creation only when chosen at level 1
    pub fn selects_subclass_at_creation(&self) -> bool {
        self.subclass_level == Some(1) && !self.subclasses.is_empty()
    }

    pub fn subclass(&self, slug: &str) -> Option<&SubclassEntry> {
        self.subclasses.iter().find(|s| s.slug == slug)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub equipment: Vec<EntityRef>,
}

/// Everything a flow may pick from, loaded once per batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub races: Vec<RaceEntry>,
    pub classes: Vec<ClassEntry>,
    pub backgrounds: Vec<BackgroundEntry>,
}

impl Catalog {
    pub fn race(&self, slug: &str) -> Option<&RaceEntry> {
        self.races.iter().find(|r| r.slug == slug)
    }

    pub fn class(&self, slug: &str) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.slug == slug)
    }

    pub fn background(&self, slug: &str) -> Option<&BackgroundEntry> {
        self.backgrounds.iter().find(|b| b.slug == slug)
    }

    pub fn require_race(&self, slug: &str) -> CoreResult<&RaceEntry> {
        self.race(slug)
            .ok_or_else(|| CoreError::CatalogError(format!("race '{}' not found", slug)))
    }

    pub fn require_class(&self, slug: &str) -> CoreResult<&ClassEntry> {
        self.class(slug)
            .ok_or_else(|| CoreError::CatalogError(format!("class '{}' not found", slug)))
    }

    pub fn require_background(&self, slug: &str) -> CoreResult<&BackgroundEntry> {
        self.background(slug)
            .ok_or_else(|| CoreError::CatalogError(format!("background '{}' not found", slug)))
    }

    /// Subclass lookup across every class
    pub fn subclass(&self, slug: &str) -> Option<(&ClassEntry, &SubclassEntry)> {
        self.classes
            .iter()
            .find_map(|c| c.subclass(slug).map(|s| (c, s)))
    }

    pub fn race_slugs(&self) -> Vec<String> {
        self.races.iter().map(|r| r.slug.clone()).collect()
    }

    /// Classes filtered by type, excluding `exclude`
    pub fn classes_matching(
        &self,
        class_type: Option<ClassType>,
        exclude: Option<&str>,
    ) -> Vec<&ClassEntry> {
        self.classes
            .iter()
            .filter(|c| class_type.map_or(true, |t| c.class_type() == t))
            .filter(|c| Some(c.slug.as_str()) != exclude)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty() || self.classes.is_empty() || self.backgrounds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subclass() -> SubclassEntry {
        SubclassEntry {
            slug: "life-domain".into(),
            name: "Life Domain".into(),
            features: vec![
                LevelledEntry { slug: "disciple-of-life".into(), name: None, level: 1, is_choice_option: false },
                LevelledEntry { slug: "blessed-healer".into(), name: None, level: 6, is_choice_option: false },
                LevelledEntry { slug: "option-a".into(), name: None, level: 1, is_choice_option: true },
            ],
            spells: vec![
                SubclassSpell { slug: "bless".into(), level: 1, always_prepared: true },
                SubclassSpell { slug: "lesser-restoration".into(), level: 3, always_prepared: true },
            ],
            proficiencies: vec![],
        }
    }

    #[test]
    fn expected_features_respect_level_and_choice_options() {
        let sc = subclass();
        let slugs: Vec<&str> = sc.expected_features(1).iter().map(|f| f.slug.as_str()).collect();
        assert_eq!(slugs, vec!["disciple-of-life"]);
        assert_eq!(sc.expected_always_prepared_spells(1).len(), 1);
        assert_eq!(sc.expected_always_prepared_spells(5).len(), 2);
    }

    #[test]
    fn classes_matching_filters_type_and_excludes_current() {
        let catalog = Catalog {
            races: vec![],
            backgrounds: vec![],
            classes: vec![
                ClassEntry { slug: "fighter".into(), name: "Fighter".into(), spellcaster: false, subclass_level: Some(3), subclasses: vec![], equipment_choice_groups: vec![], fixed_equipment: vec![] },
                ClassEntry { slug: "wizard".into(), name: "Wizard".into(), spellcaster: true, subclass_level: Some(2), subclasses: vec![], equipment_choice_groups: vec![], fixed_equipment: vec![] },
                ClassEntry { slug: "cleric".into(), name: "Cleric".into(), spellcaster: true, subclass_level: Some(1), subclasses: vec![subclass()], equipment_choice_groups: vec![], fixed_equipment: vec![] },
            ],
        };
        let casters: Vec<&str> = catalog
            .classes_matching(Some(ClassType::Spellcaster), Some("wizard"))
            .iter()
            .map(|c| c.slug.as_str())
            .collect();
        assert_eq!(casters, vec!["cleric"]);
        assert!(catalog.class("cleric").unwrap().selects_subclass_at_creation());
        assert!(!catalog.class("fighter").unwrap().selects_subclass_at_creation());
        assert_eq!(catalog.subclass("life-domain").unwrap().0.slug, "cleric");
    }
}
