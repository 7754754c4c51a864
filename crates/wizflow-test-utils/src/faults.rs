//! Known defects the in-memory subject can be told to exhibit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TestUtilsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Spells of the previous race survive a race change
    LeakRacialSpells,
    /// Features of the previous race survive a race change
    LeakRacialFeatures,
    /// Features of the previous class survive a class change
    LeakClassFeatures,
    /// Features of the previous background survive a background change
    LeakBackgroundFeatures,
    /// Class equipment is kept when switching to gold
    KeepClassEquipmentInGold,
    /// Starting wealth is kept when switching back to equipment
    KeepStartingGold,
    /// Equipment choice groups are not offered again after leaving gold mode
    DropEquipmentChoices,
    /// Choosing a subclass grants none of its features
    SkipSubclassFeatures,
    /// Background items are never granted
    SkipBackgroundEquipment,
    /// Every background change is rejected with a validation error
    RejectBackgroundPatch,
    /// Ability scores keep being reported missing, so the character never completes
    StaleCompletion,
    /// Pending choices are served without their `required` flag
    MalformedPendingChoices,
}

impl Fault {
    pub const ALL: [Fault; 12] = [
        Fault::LeakRacialSpells,
        Fault::LeakRacialFeatures,
        Fault::LeakClassFeatures,
        Fault::LeakBackgroundFeatures,
        Fault::KeepClassEquipmentInGold,
        Fault::KeepStartingGold,
        Fault::DropEquipmentChoices,
        Fault::SkipSubclassFeatures,
        Fault::SkipBackgroundEquipment,
        Fault::RejectBackgroundPatch,
        Fault::StaleCompletion,
        Fault::MalformedPendingChoices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Fault::LeakRacialSpells => "leak_racial_spells",
            Fault::LeakRacialFeatures => "leak_racial_features",
            Fault::LeakClassFeatures => "leak_class_features",
            Fault::LeakBackgroundFeatures => "leak_background_features",
            Fault::KeepClassEquipmentInGold => "keep_class_equipment_in_gold",
            Fault::KeepStartingGold => "keep_starting_gold",
            Fault::DropEquipmentChoices => "drop_equipment_choices",
            Fault::SkipSubclassFeatures => "skip_subclass_features",
            Fault::SkipBackgroundEquipment => "skip_background_equipment",
            Fault::RejectBackgroundPatch => "reject_background_patch",
            Fault::StaleCompletion => "stale_completion",
            Fault::MalformedPendingChoices => "malformed_pending_choices",
        }
    }

    /// Failure pattern (or flow error kind) the harness reports for this defect
    pub fn expected_pattern(&self) -> &'static str {
        match self {
            Fault::LeakRacialSpells => "racial_spells_not_cleared",
            Fault::LeakRacialFeatures => "racial_features_not_cleared",
            Fault::LeakClassFeatures => "class_features_not_cleared",
            Fault::LeakBackgroundFeatures => "background_features_not_cleared",
            Fault::KeepClassEquipmentInGold => "class_equipment_not_cleared",
            Fault::KeepStartingGold => "starting_gold_not_cleared",
            Fault::DropEquipmentChoices => "equipment_choices_missing",
            Fault::SkipSubclassFeatures => "subclass_features_missing",
            Fault::SkipBackgroundEquipment => "background_equipment_missing",
            Fault::RejectBackgroundPatch => "rejected",
            Fault::StaleCompletion => "character_incomplete",
            Fault::MalformedPendingChoices => "contract_violation",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fault {
    type Err = TestUtilsError;

    /// Accepts `snake_case` and `kebab-case` names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Fault::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| TestUtilsError::UnknownFault(s.to_string()))
    }
}

/// Faults enabled on one subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSet {
    enabled: BTreeSet<Fault>,
}

impl FaultSet {
    /// A subject that behaves correctly
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, fault: Fault) -> Self {
        self.enabled.insert(fault);
        self
    }

    pub fn enable(&mut self, fault: Fault) {
        self.enabled.insert(fault);
    }

    pub fn has(&self, fault: Fault) -> bool {
        self.enabled.contains(&fault)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Fault> + '_ {
        self.enabled.iter().copied()
    }

    /// Parse a list of fault names, failing on the first unknown one.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, TestUtilsError> {
        let mut set = Self::none();
        for name in names {
            set.enable(name.as_ref().parse()?);
        }
        Ok(set)
    }
}

impl FromIterator<Fault> for FaultSet {
    fn from_iter<I: IntoIterator<Item = Fault>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for fault in Fault::ALL {
            assert_eq!(fault.as_str().parse::<Fault>().unwrap(), fault);
        }
        assert_eq!(
            "keep-starting-gold".parse::<Fault>().unwrap(),
            Fault::KeepStartingGold
        );
        assert!(matches!(
            "leak_everything".parse::<Fault>(),
            Err(TestUtilsError::UnknownFault(_))
        ));
    }

    #[test]
    fn parse_collects_every_name() {
        let set = FaultSet::parse(&["leak_racial_spells", "stale-completion"]).unwrap();
        assert!(set.has(Fault::LeakRacialSpells));
        assert!(set.has(Fault::StaleCompletion));
        assert!(!set.has(Fault::KeepStartingGold));
        assert_eq!(set.iter().count(), 2);
        assert!(FaultSet::parse(&["nope"]).is_err());
    }
}
