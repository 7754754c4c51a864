use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// How a character receives starting equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentMode {
    /// Class equipment picked through choice groups
    Equipment,
    /// Starting wealth in gold instead of class equipment
    Gold,
}

impl EquipmentMode {
    /// Draw order used by the randomizer
    pub const ALL: [EquipmentMode; 2] = [EquipmentMode::Gold, EquipmentMode::Equipment];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentMode::Equipment => "equipment",
            EquipmentMode::Gold => "gold",
        }
    }
}

impl fmt::Display for EquipmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equipment" => Ok(EquipmentMode::Equipment),
            "gold" => Ok(EquipmentMode::Gold),
            other => Err(CoreError::ConfigurationError(format!(
                "unknown equipment mode '{}'",
                other
            ))),
        }
    }
}

/// Mutable state of one flow execution.
///
/// Owned by a single `FlowExecutor::execute` call and handed to step handlers by
/// `&mut`; it never outlives the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    pub subject_id: Option<u64>,
    pub public_id: Option<String>,
    pub race: Option<String>,
    pub subrace: Option<String>,
    pub class: Option<String>,
    pub subclass: Option<String>,
    pub background: Option<String>,
    pub equipment_mode: Option<EquipmentMode>,
    pub previous_equipment_mode: Option<EquipmentMode>,
    /// Choice group -> item slugs the last equipment resolution should have granted
    pub equipment_selections: BTreeMap<String, Vec<String>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the last `set_equipment_mode` moved between two known modes.
    pub fn equipment_mode_changed(&self) -> bool {
        matches!(
            (self.previous_equipment_mode, self.equipment_mode),
            (Some(prev), Some(cur)) if prev != cur
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment_mode_parses_and_displays() {
        assert_eq!("gold".parse::<EquipmentMode>().unwrap(), EquipmentMode::Gold);
        assert_eq!(EquipmentMode::Equipment.to_string(), "equipment");
        assert!("silver".parse::<EquipmentMode>().is_err());
    }

    #[test]
    fn mode_change_needs_both_modes() {
        let mut ctx = ExecutionContext::new();
        ctx.equipment_mode = Some(EquipmentMode::Gold);
        assert!(!ctx.equipment_mode_changed());
        ctx.previous_equipment_mode = Some(EquipmentMode::Equipment);
        assert!(ctx.equipment_mode_changed());
        ctx.previous_equipment_mode = Some(EquipmentMode::Gold);
        assert!(!ctx.equipment_mode_changed());
    }
}
