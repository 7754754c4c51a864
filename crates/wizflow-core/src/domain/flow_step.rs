//! Step descriptors that make up a flow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::context::EquipmentMode;
use crate::error::CoreError;

/// Every action the executor knows how to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Create,
    SetRace,
    SetSubrace,
    SetClass,
    SetSubclass,
    SetBackground,
    SetAbilityScores,
    ResolveProficiencyChoices,
    ResolveLanguageChoices,
    SetEquipmentMode,
    ResolveEquipmentChoices,
    ResolveSpellChoices,
    SetDetails,
    Validate,
    SwitchRace,
    SwitchBackground,
    SwitchClass,
}

impl StepAction {
    pub const SWITCHES: [StepAction; 3] = [
        StepAction::SwitchRace,
        StepAction::SwitchBackground,
        StepAction::SwitchClass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Create => "create",
            StepAction::SetRace => "set_race",
            StepAction::SetSubrace => "set_subrace",
            StepAction::SetClass => "set_class",
            StepAction::SetSubclass => "set_subclass",
            StepAction::SetBackground => "set_background",
            StepAction::SetAbilityScores => "set_ability_scores",
            StepAction::ResolveProficiencyChoices => "resolve_proficiency_choices",
            StepAction::ResolveLanguageChoices => "resolve_language_choices",
            StepAction::SetEquipmentMode => "set_equipment_mode",
            StepAction::ResolveEquipmentChoices => "resolve_equipment_choices",
            StepAction::ResolveSpellChoices => "resolve_spell_choices",
            StepAction::SetDetails => "set_details",
            StepAction::Validate => "validate",
            StepAction::SwitchRace => "switch_race",
            StepAction::SwitchBackground => "switch_background",
            StepAction::SwitchClass => "switch_class",
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            StepAction::SwitchRace | StepAction::SwitchBackground | StepAction::SwitchClass
        )
    }

    /// The "set" step a switch must come after.
    pub fn anchor(&self) -> Option<StepAction> {
        match self {
            StepAction::SwitchRace => Some(StepAction::SetRace),
            StepAction::SwitchBackground => Some(StepAction::SetBackground),
            StepAction::SwitchClass => Some(StepAction::SetClass),
            _ => None,
        }
    }

    /// Steps whose validation compares against state captured right before them.
    pub fn is_equipment_related(&self) -> bool {
        matches!(
            self,
            StepAction::SetEquipmentMode | StepAction::ResolveEquipmentChoices
        )
    }

    pub fn switch_description(&self) -> &'static str {
        match self {
            StepAction::SwitchRace => "SWITCH: Change race (should cascade reset)",
            StepAction::SwitchBackground => "SWITCH: Change background (should cascade reset)",
            StepAction::SwitchClass => "SWITCH: Change class (should cascade reset)",
            _ => "",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepAction {
    type Err = CoreError;

    /// Accepts the action name; switch types also accept their short form (`race`, `class`, `background`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.trim() {
            "create" => StepAction::Create,
            "set_race" => StepAction::SetRace,
            "set_subrace" => StepAction::SetSubrace,
            "set_class" => StepAction::SetClass,
            "set_subclass" => StepAction::SetSubclass,
            "set_background" => StepAction::SetBackground,
            "set_ability_scores" => StepAction::SetAbilityScores,
            "resolve_proficiency_choices" => StepAction::ResolveProficiencyChoices,
            "resolve_language_choices" => StepAction::ResolveLanguageChoices,
            "set_equipment_mode" => StepAction::SetEquipmentMode,
            "resolve_equipment_choices" => StepAction::ResolveEquipmentChoices,
            "resolve_spell_choices" => StepAction::ResolveSpellChoices,
            "set_details" => StepAction::SetDetails,
            "validate" => StepAction::Validate,
            "switch_race" | "race" => StepAction::SwitchRace,
            "switch_background" | "background" => StepAction::SwitchBackground,
            "switch_class" | "class" => StepAction::SwitchClass,
            other => {
                return Err(CoreError::ConfigurationError(format!(
                    "unknown step action '{}'",
                    other
                )))
            }
        };
        Ok(action)
    }
}

/// Broad class category used by class-type switch flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Spellcaster,
    Martial,
}

impl ClassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Spellcaster => "spellcaster",
            ClassType::Martial => "martial",
        }
    }

    pub fn is_spellcaster(&self) -> bool {
        matches!(self, ClassType::Spellcaster)
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spellcaster" => Ok(ClassType::Spellcaster),
            "martial" => Ok(ClassType::Martial),
            other => Err(CoreError::ConfigurationError(format!(
                "unknown class type '{}'",
                other
            ))),
        }
    }
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub action: StepAction,
    pub description: String,
    #[serde(default)]
    pub conditional: bool,
    #[serde(default)]
    pub is_switch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_race: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_subclass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_equipment_mode: Option<EquipmentMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_type_from: Option<ClassType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_type_to: Option<ClassType>,
    /// Inserted by the equipment-mode chaos generator
    #[serde(default)]
    pub equipment_mode_test: bool,
}

impl FlowStep {
    pub fn new(action: StepAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            conditional: false,
            is_switch: action.is_switch(),
            force_race: None,
            force_class: None,
            force_subclass: None,
            force_equipment_mode: None,
            class_type_from: None,
            class_type_to: None,
            equipment_mode_test: false,
        }
    }

    /// Step that may not apply to every character (e.g. subrace)
    pub fn conditional(action: StepAction, description: impl Into<String>) -> Self {
        Self {
            conditional: true,
            ..Self::new(action, description)
        }
    }

    /// Switch step with its standard description
    pub fn switch(action: StepAction) -> Self {
        Self::new(action, action.switch_description())
    }

    pub fn is_switch(&self) -> bool {
        self.is_switch || self.action.is_switch()
    }

    /// Whether the executor must capture state before running this step
    pub fn needs_before_snapshot(&self) -> bool {
        self.is_switch()
            || self.action.is_equipment_related()
            || matches!(self.action, StepAction::SetSubclass | StepAction::Validate)
    }
}

/// Ordered list of steps
pub type Flow = Vec<FlowStep>;
