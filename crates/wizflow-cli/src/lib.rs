//! Wizard flow runner
//!
//! Drives batches of generated flows against the in-memory reference subject,
//! records metrics, and saves a report per run.

use rand::Rng;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use wizflow_core::{BatchRunner, CoreError, Flow, FlowExecutor, FlowGenerator, Randomizer};
use wizflow_monitoring::HarnessMetrics;
use wizflow_report::{
    Report, ReportGenerator, ReportStore, ReportStoreError, RunOptions, StoredReport,
};
use wizflow_test_utils::{FaultSet, InMemorySubject, TestUtilsError};

pub mod args;
pub mod config;

pub use args::{Args, FlowPlan};
pub use config::CliConfig;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Faults(#[from] TestUtilsError),

    #[error(transparent)]
    Reports(#[from] ReportStoreError),
}

pub type CliResult<T> = Result<T, CliError>;

/// A finished batch and where its report was saved
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub stored: StoredReport,
}

/// Run the batch described by `args` and save its report to `store`.
pub async fn run_batch(args: &Args, config: &CliConfig, store: &dyn ReportStore) -> CliResult<RunOutcome> {
    let plan = args.plan()?;
    let faults = FaultSet::parse(&args.faults)?;
    let seed = args.seed.unwrap_or_else(random_seed);
    let concurrency = args.concurrency.unwrap_or(config.concurrency).max(1);

    if !faults.is_empty() {
        warn!(faults = ?args.faults, "Reference subject runs with injected faults");
    }
    info!(
        seed,
        count = args.count,
        flow_kind = plan.kind().as_str(),
        concurrency,
        "Starting wizard flow run"
    );

    let subject = InMemorySubject::new().with_faults(faults.clone());
    let executor = Arc::new(FlowExecutor::connect(Arc::new(subject), config.harness()).await?);
    let runner = BatchRunner::new(Arc::clone(&executor)).with_concurrency(concurrency);
    let generator = FlowGenerator::new();
    let force_class = args.force_class.as_deref();

    let started = Instant::now();
    let results = match &plan {
        FlowPlan::AllRaces { min, max } => {
            let races = executor.catalog().race_slugs();
            if races.is_empty() {
                return Err(CliError::InvalidOption("--all-races needs at least one race".into()));
            }
            let total = args.count.saturating_mul(races.len() as u32);
            runner
                .run(seed, total, |randomizer, iteration| {
                    let race = &races[(iteration as usize - 1) % races.len()];
                    let flow = generator.force_race(generator.chaos(randomizer, *min, *max)?, race);
                    Ok(apply_force_class(&generator, flow, force_class))
                })
                .await?
        }
        _ => {
            runner
                .run(seed, args.count, |randomizer, _| {
                    build_flow(&generator, &plan, randomizer)
                        .map(|flow| apply_force_class(&generator, flow, force_class))
                })
                .await?
        }
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    results.iter().for_each(HarnessMetrics::record_flow);

    let report = ReportGenerator::new()
        .with_verbose_steps(args.verbose_steps)
        .generate(run_options(args, &plan, seed, &faults), results);
    let summary = &report.summary;
    HarnessMetrics::record_batch(summary.total, summary.passed, summary.failed, summary.errors, elapsed_ms);
    info!(
        run_id = %report.run_id,
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
        elapsed_ms,
        "Wizard flow run finished"
    );

    let stored = store.save(&report).await?;
    Ok(RunOutcome { report, stored })
}

/// Generate one flow for `plan`
pub fn build_flow(generator: &FlowGenerator, plan: &FlowPlan, randomizer: &mut Randomizer) -> Result<Flow, CoreError> {
    let flow = match plan {
        FlowPlan::Linear => generator.linear(),
        FlowPlan::Chaos { min, max } | FlowPlan::AllRaces { min, max } => {
            generator.chaos(randomizer, *min, *max)?
        }
        FlowPlan::Parameterized(switches) => generator.with_switches(switches),
        FlowPlan::EquipmentChaos => generator.equipment_mode_chaos(randomizer)?,
        FlowPlan::EquipmentToggle(modes) => generator.equipment_mode_toggle(modes),
        FlowPlan::ClassTypeSwitch { from, to } => generator.class_type_switch(*from, *to),
    };
    Ok(flow)
}

fn apply_force_class(generator: &FlowGenerator, flow: Flow, class: Option<&str>) -> Flow {
    match class {
        Some(class) => generator.force_class(flow, class),
        None => flow,
    }
}

fn run_options(args: &Args, plan: &FlowPlan, seed: u64, faults: &FaultSet) -> RunOptions {
    let mut options = RunOptions::new(plan.kind(), args.count, seed);
    match plan {
        FlowPlan::Chaos { min, max } | FlowPlan::AllRaces { min, max } => {
            options.min_switches = Some(*min);
            options.max_switches = Some(*max);
        }
        FlowPlan::Parameterized(switches) => options.switches = switches.clone(),
        FlowPlan::EquipmentToggle(modes) => options.equipment_modes = modes.clone(),
        FlowPlan::ClassTypeSwitch { from, to } => options.class_types = Some((*from, *to)),
        FlowPlan::Linear | FlowPlan::EquipmentChaos => {}
    }
    options.force_class = args.force_class.clone();
    options.faults = faults.iter().map(|f| f.as_str().to_string()).collect();
    options
}

fn random_seed() -> u64 {
    rand::thread_rng().gen_range(1..=999_999)
}

/// Saved reports as a table, newest first
pub async fn list_reports(store: &dyn ReportStore) -> CliResult<String> {
    let listings = store.list().await?;
    if listings.is_empty() {
        return Ok("No reports found.\n".to_string());
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<20} {:>6} {:>7} {:>7} {:>7} {:>10}",
        "Run ID", "Timestamp", "Total", "Passed", "Failed", "Errors", "Pass Rate"
    );
    for listing in listings {
        let short_id: String = listing.run_id.chars().take(8).collect();
        let _ = writeln!(
            out,
            "{:<12} {:<20} {:>6} {:>7} {:>7} {:>7} {:>9.1}%",
            format!("{}...", short_id),
            listing.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            listing.total,
            listing.passed,
            listing.failed,
            listing.errors,
            listing.pass_rate
        );
    }
    Ok(out)
}

/// Console summary of a saved report, including every step when `verbose_steps` is set
pub async fn show_report(store: &dyn ReportStore, run_id: &str, verbose_steps: bool) -> CliResult<String> {
    let report = store.load(run_id).await?;
    Ok(ReportGenerator::new()
        .with_verbose_steps(verbose_steps)
        .console_summary(&report))
}
