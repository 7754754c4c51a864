//! Flows that reliably drive the reference subject into a given defect.

use wizflow_core::{EquipmentMode, Flow, FlowGenerator, StepAction};

use crate::faults::Fault;

/// Linear flow with `set_race` pinned to `race` and one race switch.
pub fn race_switch_flow(race: &str) -> Flow {
    let mut flow = FlowGenerator::new().with_switches(&[StepAction::SwitchRace]);
    if let Some(step) = flow.iter_mut().find(|s| s.action == StepAction::SetRace) {
        step.force_race = Some(race.to_string());
    }
    flow
}

/// Linear flow for `class_slug` with `set_equipment_mode` pinned to `mode`.
pub fn linear_flow_with_mode(class_slug: &str, mode: EquipmentMode) -> Flow {
    let generator = FlowGenerator::new();
    generator.force_class(generator.equipment_mode_toggle(&[mode]), class_slug)
}

/// A flow in which `fault` is bound to surface.
pub fn flow_exposing(fault: Fault) -> Flow {
    let generator = FlowGenerator::new();
    match fault {
        Fault::LeakRacialSpells => race_switch_flow("tiefling"),
        Fault::LeakRacialFeatures => race_switch_flow("dwarf"),
        Fault::LeakClassFeatures => generator.with_switches(&[StepAction::SwitchClass]),
        Fault::LeakBackgroundFeatures | Fault::RejectBackgroundPatch => {
            generator.with_switches(&[StepAction::SwitchBackground])
        }
        Fault::KeepClassEquipmentInGold => generator.force_class(
            generator.equipment_mode_toggle(&[EquipmentMode::Equipment, EquipmentMode::Gold]),
            "fighter",
        ),
        Fault::KeepStartingGold | Fault::DropEquipmentChoices => generator.force_class(
            generator.equipment_mode_toggle(&[EquipmentMode::Gold, EquipmentMode::Equipment]),
            "rogue",
        ),
        Fault::SkipSubclassFeatures => {
            generator.force_subclass(generator.force_class(generator.linear(), "cleric"), "life-domain")
        }
        Fault::SkipBackgroundEquipment => linear_flow_with_mode("wizard", EquipmentMode::Equipment),
        Fault::StaleCompletion | Fault::MalformedPendingChoices => generator.linear(),
    }
}
