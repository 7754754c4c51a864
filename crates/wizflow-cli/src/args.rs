//! Command line options and flow-kind selection.

use clap::Parser;

use wizflow_core::{ClassType, EquipmentMode, FlowKind, StepAction};

use crate::CliError;

/// Wizard flow chaos testing: walk the character wizard, switching selections
/// mid-flow, and check every cascade the switch should trigger.
#[derive(Debug, Clone, Parser)]
#[command(name = "wizard-flow", author, version, about, long_about = None)]
pub struct Args {
    /// Number of iterations to run
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Insert random switches at random points
    #[arg(long)]
    pub chaos: bool,

    /// Specific switch sequence, comma separated (race,background,class)
    #[arg(long, value_delimiter = ',')]
    pub switches: Vec<String>,

    /// Random seed for reproducibility; random when absent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run one chaos flow per catalog race
    #[arg(long)]
    pub all_races: bool,

    /// Randomly switch equipment mode around equipment resolution
    #[arg(long)]
    pub equipment_modes: bool,

    /// Walk through equipment modes in order (e.g. equipment,gold,equipment)
    #[arg(long, value_delimiter = ',')]
    pub equipment_toggle: Vec<String>,

    /// Switch between class types: from,to (e.g. spellcaster,martial)
    #[arg(long)]
    pub class_types: Option<String>,

    /// Force the first class (e.g. cleric)
    #[arg(long)]
    pub force_class: Option<String>,

    /// Minimum switches in chaos mode
    #[arg(long, default_value_t = 1)]
    pub min_switches: u32,

    /// Maximum switches in chaos mode
    #[arg(long, default_value_t = 3)]
    pub max_switches: u32,

    /// Print every step of every flow
    #[arg(long)]
    pub verbose_steps: bool,

    /// List previous reports
    #[arg(long)]
    pub list_reports: bool,

    /// Show a saved report by run id
    #[arg(long, value_name = "RUN_ID")]
    pub show_report: Option<String>,

    /// Enable a defect on the reference subject (repeatable)
    #[arg(long = "fault", value_name = "FAULT")]
    pub faults: Vec<String>,

    /// Flows executed at the same time; overrides the configured value
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// What a run will execute, resolved from the options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowPlan {
    Linear,
    Chaos { min: u32, max: u32 },
    Parameterized(Vec<StepAction>),
    EquipmentChaos,
    EquipmentToggle(Vec<EquipmentMode>),
    ClassTypeSwitch { from: ClassType, to: ClassType },
    AllRaces { min: u32, max: u32 },
}

impl FlowPlan {
    pub fn kind(&self) -> FlowKind {
        match self {
            FlowPlan::Linear => FlowKind::Linear,
            FlowPlan::Chaos { .. } => FlowKind::Chaos,
            FlowPlan::Parameterized(_) => FlowKind::Parameterized,
            FlowPlan::EquipmentChaos => FlowKind::EquipmentChaos,
            FlowPlan::EquipmentToggle(_) => FlowKind::EquipmentToggle,
            FlowPlan::ClassTypeSwitch { .. } => FlowKind::ClassTypeSwitch,
            FlowPlan::AllRaces { .. } => FlowKind::AllRaces,
        }
    }
}

impl Args {
    /// Pick the flow kind. The first matching option wins, in this order:
    /// `--all-races`, `--equipment-modes`, `--equipment-toggle`,
    /// `--class-types`, `--switches`, `--chaos`; otherwise linear.
    pub fn plan(&self) -> Result<FlowPlan, CliError> {
        if self.min_switches > self.max_switches {
            return Err(CliError::InvalidOption(format!(
                "--min-switches ({}) is greater than --max-switches ({})",
                self.min_switches, self.max_switches
            )));
        }

        if self.all_races {
            return Ok(FlowPlan::AllRaces {
                min: self.min_switches,
                max: self.max_switches,
            });
        }
        if self.equipment_modes {
            return Ok(FlowPlan::EquipmentChaos);
        }
        if !self.equipment_toggle.is_empty() {
            let modes = self
                .equipment_toggle
                .iter()
                .map(|m| m.trim().parse::<EquipmentMode>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::InvalidOption(e.to_string()))?;
            return Ok(FlowPlan::EquipmentToggle(modes));
        }
        if let Some(types) = &self.class_types {
            let (from, to) = parse_class_types(types)?;
            return Ok(FlowPlan::ClassTypeSwitch { from, to });
        }
        if !self.switches.is_empty() {
            let actions = self
                .switches
                .iter()
                .map(|s| s.parse::<StepAction>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::InvalidOption(e.to_string()))?;
            if let Some(action) = actions.iter().find(|a| !a.is_switch()) {
                return Err(CliError::InvalidOption(format!(
                    "'{}' is not a switch (expected race, background or class)",
                    action
                )));
            }
            return Ok(FlowPlan::Parameterized(actions));
        }
        if self.chaos {
            return Ok(FlowPlan::Chaos {
                min: self.min_switches,
                max: self.max_switches,
            });
        }
        Ok(FlowPlan::Linear)
    }
}

/// `from,to`; a missing half defaults to spellcaster then martial
fn parse_class_types(raw: &str) -> Result<(ClassType, ClassType), CliError> {
    let mut parts = raw.split(',').map(str::trim).filter(|p| !p.is_empty());
    let parse = |part: Option<&str>, default: ClassType| match part {
        Some(p) => p
            .parse::<ClassType>()
            .map_err(|e| CliError::InvalidOption(e.to_string())),
        None => Ok(default),
    };
    let from = parse(parts.next(), ClassType::Spellcaster)?;
    let to = parse(parts.next(), ClassType::Martial)?;
    Ok((from, to))
}
