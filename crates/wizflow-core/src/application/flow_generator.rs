//! Builds flows: the linear wizard order plus switch steps spliced in at valid positions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::context::EquipmentMode;
use crate::domain::flow_step::{ClassType, Flow, FlowStep, StepAction};
use crate::domain::randomizer::Randomizer;
use crate::error::{CoreError, CoreResult};

/// Flow shapes the runner can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Linear,
    Chaos,
    EquipmentChaos,
    ClassTypeSwitch,
    Parameterized,
    AllRaces,
    EquipmentToggle,
}

impl FlowKind {
    pub const ALL: [FlowKind; 7] = [
        FlowKind::Linear,
        FlowKind::Chaos,
        FlowKind::EquipmentChaos,
        FlowKind::ClassTypeSwitch,
        FlowKind::Parameterized,
        FlowKind::AllRaces,
        FlowKind::EquipmentToggle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Linear => "linear",
            FlowKind::Chaos => "chaos",
            FlowKind::EquipmentChaos => "equipment_chaos",
            FlowKind::ClassTypeSwitch => "class_type_switch",
            FlowKind::Parameterized => "parameterized",
            FlowKind::AllRaces => "all_races",
            FlowKind::EquipmentToggle => "equipment_toggle",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FlowKind::Linear => "Standard wizard flow with no switches",
            FlowKind::Chaos => "Random switches inserted at random points",
            FlowKind::EquipmentChaos => "Tests equipment mode with switches after equipment selection",
            FlowKind::ClassTypeSwitch => "Tests switching between spellcaster and martial classes",
            FlowKind::Parameterized => "Specific switch sequence",
            FlowKind::AllRaces => "One chaos flow per race",
            FlowKind::EquipmentToggle => "Equipment mode switched back and forth",
        }
    }
}

/// Inclusive range of indices a switch may be inserted at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertRange {
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FlowGenerator;

impl FlowGenerator {
    pub fn new() -> Self {
        Self
    }

    /// The wizard in UI order, no switches.
    pub fn linear(&self) -> Flow {
        vec![
            FlowStep::new(StepAction::Create, "Create character shell"),
            FlowStep::new(StepAction::SetRace, "Select race"),
            FlowStep::conditional(StepAction::SetSubrace, "Select subrace (if applicable)"),
            FlowStep::new(StepAction::SetClass, "Select class"),
            FlowStep::conditional(StepAction::SetSubclass, "Select subclass (if level 1 subclass)"),
            FlowStep::new(StepAction::SetBackground, "Select background"),
            FlowStep::new(StepAction::SetAbilityScores, "Assign ability scores"),
            FlowStep::conditional(
                StepAction::ResolveProficiencyChoices,
                "Resolve proficiency choices",
            ),
            FlowStep::conditional(StepAction::ResolveLanguageChoices, "Resolve language choices"),
            FlowStep::new(StepAction::SetEquipmentMode, "Choose equipment or gold"),
            FlowStep::conditional(
                StepAction::ResolveEquipmentChoices,
                "Resolve equipment choices",
            ),
            FlowStep::conditional(StepAction::ResolveSpellChoices, "Resolve spell choices"),
            FlowStep::new(StepAction::SetDetails, "Set name and alignment"),
            FlowStep::new(StepAction::Validate, "Validate character completion"),
        ]
    }

    /// Linear flow with `min_switches..=max_switches` random switches.
    pub fn chaos(
        &self,
        randomizer: &mut Randomizer,
        min_switches: u32,
        max_switches: u32,
    ) -> CoreResult<Flow> {
        let mut flow = self.linear();
        let switch_count = randomizer.random_int(i64::from(min_switches), i64::from(max_switches))?;

        for _ in 0..switch_count {
            let action = *randomizer
                .choose(&StepAction::SWITCHES)
                .ok_or_else(|| CoreError::RandomizerError("no switch types".into()))?;
            let Some(range) = Self::insert_range(&flow, action) else {
                debug!(switch = %action, "No valid insertion range, skipping switch");
                continue;
            };
            let position = randomizer.random_int(range.min as i64, range.max as i64)? as usize;
            flow.insert(position, FlowStep::switch(action));
        }

        Ok(flow)
    }

    /// Linear flow with each requested switch at the midpoint of its valid range.
    pub fn with_switches(&self, switches: &[StepAction]) -> Flow {
        let mut flow = self.linear();
        for action in switches.iter().filter(|a| a.is_switch()) {
            if let Some(range) = Self::insert_range(&flow, *action) {
                flow.insert((range.min + range.max) / 2, FlowStep::switch(*action));
            }
        }
        flow
    }

    /// Background or class switch right after equipment choices are resolved.
    pub fn equipment_mode_chaos(&self, randomizer: &mut Randomizer) -> CoreResult<Flow> {
        let mut flow = self.linear();
        if let Some(index) = Self::find_action(&flow, StepAction::ResolveEquipmentChoices) {
            let action = if randomizer.random_int(0, 1)? == 0 {
                StepAction::SwitchBackground
            } else {
                StepAction::SwitchClass
            };
            let mut step = FlowStep::new(
                action,
                format!("{} (after equipment)", action.switch_description()),
            );
            step.equipment_mode_test = true;
            flow.insert(index + 1, step);
        }
        Ok(flow)
    }

    /// Class switch between class types, right after spell choices.
    ///
    /// The initial `set_class` is restricted to `from`.
    pub fn class_type_switch(&self, from: ClassType, to: ClassType) -> Flow {
        let mut flow = self.linear();
        if let Some(step) = flow.iter_mut().find(|s| s.action == StepAction::SetClass) {
            step.class_type_to = Some(from);
        }
        let index = Self::find_action(&flow, StepAction::ResolveSpellChoices)
            .or_else(|| Self::find_action(&flow, StepAction::SetClass));
        if let Some(index) = index {
            let mut step = FlowStep::new(
                StepAction::SwitchClass,
                format!("Switch class from {} to {}", from, to),
            );
            step.class_type_from = Some(from);
            step.class_type_to = Some(to);
            flow.insert(index + 1, step);
        }
        flow
    }

    /// One chaos flow per race, each with its first `set_race` forced.
    pub fn all_races_with_chaos(
        &self,
        randomizer: &mut Randomizer,
        races: &[String],
        min_switches: u32,
        max_switches: u32,
    ) -> CoreResult<Vec<(String, Flow)>> {
        let mut flows = Vec::with_capacity(races.len());
        for race in races {
            let flow = self.chaos(randomizer, min_switches, max_switches)?;
            flows.push((race.clone(), self.force_race(flow, race)));
        }
        Ok(flows)
    }

    /// Force the first `set_race` to `race_slug`.
    pub fn force_race(&self, mut flow: Flow, race_slug: &str) -> Flow {
        if let Some(step) = flow.iter_mut().find(|s| s.action == StepAction::SetRace) {
            step.force_race = Some(race_slug.to_string());
        }
        flow
    }

    /// Linear flow that walks through `modes` in order, resolving equipment after each change.
    ///
    /// `[Equipment, Gold, Equipment]` sets equipment, switches to gold, then back again.
    pub fn equipment_mode_toggle(&self, modes: &[EquipmentMode]) -> Flow {
        let mut flow = self.linear();
        let Some((first, rest)) = modes.split_first() else {
            return flow;
        };
        if let Some(step) = flow
            .iter_mut()
            .find(|s| s.action == StepAction::SetEquipmentMode)
        {
            step.force_equipment_mode = Some(*first);
        }
        for mode in rest {
            let Some(anchor) = Self::find_last_action(&flow, StepAction::ResolveEquipmentChoices)
            else {
                break;
            };
            let mut switch = FlowStep::new(
                StepAction::SetEquipmentMode,
                format!("Switch equipment mode to {}", mode),
            );
            switch.force_equipment_mode = Some(*mode);
            let resolve = FlowStep::conditional(
                StepAction::ResolveEquipmentChoices,
                format!("Resolve equipment choices after switching to {}", mode),
            );
            flow.insert(anchor + 1, switch);
            flow.insert(anchor + 2, resolve);
        }
        flow
    }

    /// Force the first `set_class` to `class_slug`.
    pub fn force_class(&self, mut flow: Flow, class_slug: &str) -> Flow {
        if let Some(step) = flow.iter_mut().find(|s| s.action == StepAction::SetClass) {
            step.force_class = Some(class_slug.to_string());
        }
        flow
    }

    /// Force the first `set_subclass` to `subclass_slug`.
    pub fn force_subclass(&self, mut flow: Flow, subclass_slug: &str) -> Flow {
        if let Some(step) = flow
            .iter_mut()
            .find(|s| s.action == StepAction::SetSubclass)
        {
            step.force_subclass = Some(subclass_slug.to_string());
        }
        flow
    }

    /// Where a switch may go: after its anchor step and before `validate`.
    pub fn insert_range(flow: &[FlowStep], switch: StepAction) -> Option<InsertRange> {
        let anchor = Self::find_action(flow, switch.anchor()?)?;
        let max = match Self::find_action(flow, StepAction::Validate) {
            Some(validate) => validate.checked_sub(1)?,
            None => flow.len().checked_sub(1)?,
        };
        let min = anchor + 1;
        (min <= max).then_some(InsertRange { min, max })
    }

    pub fn find_action(flow: &[FlowStep], action: StepAction) -> Option<usize> {
        flow.iter().position(|s| s.action == action)
    }

    fn find_last_action(flow: &[FlowStep], action: StepAction) -> Option<usize> {
        flow.iter().rposition(|s| s.action == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn actions(flow: &[FlowStep]) -> Vec<StepAction> {
        flow.iter().map(|s| s.action).collect()
    }

    /// Every switch sits strictly after its anchor and strictly before validate.
    fn assert_switches_valid(flow: &[FlowStep]) {
        let validate = FlowGenerator::find_action(flow, StepAction::Validate);
        for (index, step) in flow.iter().enumerate().filter(|(_, s)| s.is_switch()) {
            let anchor = FlowGenerator::find_action(flow, step.action.anchor().unwrap()).unwrap();
            assert!(index > anchor, "{} at {} not after anchor {}", step.action, index, anchor);
            if let Some(v) = validate {
                assert!(index < v, "{} at {} not before validate {}", step.action, index, v);
            }
        }
    }

    #[test]
    fn linear_flow_order() {
        let flow = FlowGenerator::new().linear();
        assert_eq!(
            actions(&flow),
            vec![
                StepAction::Create,
                StepAction::SetRace,
                StepAction::SetSubrace,
                StepAction::SetClass,
                StepAction::SetSubclass,
                StepAction::SetBackground,
                StepAction::SetAbilityScores,
                StepAction::ResolveProficiencyChoices,
                StepAction::ResolveLanguageChoices,
                StepAction::SetEquipmentMode,
                StepAction::ResolveEquipmentChoices,
                StepAction::ResolveSpellChoices,
                StepAction::SetDetails,
                StepAction::Validate,
            ]
        );
        assert!(flow.iter().all(|s| !s.is_switch()));
    }

    #[test]
    fn chaos_switches_are_always_in_range() {
        let generator = FlowGenerator::new();
        for seed in 0..200 {
            let mut r = Randomizer::new(seed);
            let flow = generator.chaos(&mut r, 1, 5).unwrap();
            let switches = flow.iter().filter(|s| s.is_switch()).count();
            assert!((1..=5).contains(&switches), "seed {} gave {} switches", seed, switches);
            assert_switches_valid(&flow);
            assert_eq!(flow.last().unwrap().action, StepAction::Validate);
        }
    }

    #[test]
    fn chaos_is_reproducible() {
        let generator = FlowGenerator::new();
        let a = generator.chaos(&mut Randomizer::new(77), 1, 3).unwrap();
        let b = generator.chaos(&mut Randomizer::new(77), 1, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn with_switches_uses_midpoint() {
        let flow = FlowGenerator::new().with_switches(&[StepAction::SwitchRace]);
        // set_race at 1, validate at 13 => range [2, 12], midpoint 7
        assert_eq!(flow[7].action, StepAction::SwitchRace);
        assert_switches_valid(&flow);
    }

    #[test]
    fn missing_anchor_skips_switch() {
        let flow: Vec<FlowStep> = FlowGenerator::new()
            .linear()
            .into_iter()
            .filter(|s| s.action != StepAction::SetBackground)
            .collect();
        assert_eq!(FlowGenerator::insert_range(&flow, StepAction::SwitchBackground), None);
        assert!(FlowGenerator::insert_range(&flow, StepAction::SwitchRace).is_some());
    }

    #[test]
    fn equipment_chaos_inserts_after_equipment_choices() {
        let flow = FlowGenerator::new()
            .equipment_mode_chaos(&mut Randomizer::new(5))
            .unwrap();
        let index = FlowGenerator::find_action(&flow, StepAction::ResolveEquipmentChoices).unwrap();
        let inserted = &flow[index + 1];
        assert!(inserted.is_switch());
        assert!(inserted.equipment_mode_test);
        assert!(inserted.description.ends_with("(after equipment)"));
    }

    #[test]
    fn class_type_switch_follows_spell_choices() {
        let flow = FlowGenerator::new().class_type_switch(ClassType::Spellcaster, ClassType::Martial);
        let index = FlowGenerator::find_action(&flow, StepAction::ResolveSpellChoices).unwrap();
        assert_eq!(flow[index + 1].action, StepAction::SwitchClass);
        assert_eq!(flow[index + 1].class_type_to, Some(ClassType::Martial));
        assert_eq!(flow[index + 1].description, "Switch class from spellcaster to martial");
        let set_class = FlowGenerator::find_action(&flow, StepAction::SetClass).unwrap();
        assert_eq!(flow[set_class].class_type_to, Some(ClassType::Spellcaster));
    }

    #[test]
    fn equipment_toggle_adds_mode_and_resolution_pairs() {
        let flow = FlowGenerator::new().equipment_mode_toggle(&[
            EquipmentMode::Equipment,
            EquipmentMode::Gold,
            EquipmentMode::Equipment,
        ]);
        let modes: Vec<Option<EquipmentMode>> = flow
            .iter()
            .filter(|s| s.action == StepAction::SetEquipmentMode)
            .map(|s| s.force_equipment_mode)
            .collect();
        assert_eq!(
            modes,
            vec![
                Some(EquipmentMode::Equipment),
                Some(EquipmentMode::Gold),
                Some(EquipmentMode::Equipment)
            ]
        );
        let tail: Vec<StepAction> = actions(&flow)[9..15].to_vec();
        assert_eq!(
            tail,
            vec![
                StepAction::SetEquipmentMode,
                StepAction::ResolveEquipmentChoices,
                StepAction::SetEquipmentMode,
                StepAction::ResolveEquipmentChoices,
                StepAction::SetEquipmentMode,
                StepAction::ResolveEquipmentChoices,
            ]
        );
    }

    #[test]
    fn all_races_forces_each_race_once() {
        let races = vec!["human".to_string(), "elf".to_string()];
        let flows = FlowGenerator::new()
            .all_races_with_chaos(&mut Randomizer::new(9), &races, 1, 2)
            .unwrap();
        assert_eq!(flows.len(), 2);
        for (race, flow) in flows {
            let set_race = flow.iter().find(|s| s.action == StepAction::SetRace).unwrap();
            assert_eq!(set_race.force_race.as_deref(), Some(race.as_str()));
        }
    }
}
