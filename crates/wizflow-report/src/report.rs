//! Batch summaries and their console rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

use wizflow_core::{ClassType, EquipmentMode, FlowKind, FlowResult, FlowStatus, StepAction, StepOutcome};

/// How the batch was requested, stored so a run can be reproduced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub flow_kind: FlowKind,
    pub count: u32,
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_switches: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_switches: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub switches: Vec<StepAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipment_modes: Vec<EquipmentMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_types: Option<(ClassType, ClassType)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_class: Option<String>,
    /// Defects enabled on the reference subject
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<String>,
}

impl RunOptions {
    pub fn new(flow_kind: FlowKind, count: u32, seed: u64) -> Self {
        Self {
            flow_kind,
            count,
            seed,
            min_switches: None,
            max_switches: None,
            switches: Vec::new(),
            equipment_modes: Vec::new(),
            class_types: None,
            force_class: None,
            faults: Vec::new(),
        }
    }
}

/// Character created by one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub iteration: u32,
    pub subject_id: u64,
    pub public_id: String,
    pub status: FlowStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    /// Percentage of passing flows, one decimal
    pub pass_rate: f64,
    pub warnings: usize,
    /// Pattern -> number of failures carrying it
    pub failure_patterns: BTreeMap<String, usize>,
    pub characters: Vec<SubjectRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub seed: u64,
    pub options: RunOptions,
    pub summary: ReportSummary,
    pub results: Vec<FlowResult>,
}

impl Report {
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || self.summary.errors > 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReportGenerator {
    verbose_steps: bool,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include every step of every flow in the console summary
    pub fn with_verbose_steps(mut self, verbose: bool) -> Self {
        self.verbose_steps = verbose;
        self
    }

    pub fn generate(&self, options: RunOptions, results: Vec<FlowResult>) -> Report {
        Report {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            seed: options.seed,
            summary: Self::summarize(&results),
            options,
            results,
        }
    }

    pub fn summarize(results: &[FlowResult]) -> ReportSummary {
        let count = |status| results.iter().filter(|r| r.status() == status).count();
        let total = results.len();
        let passed = count(FlowStatus::Pass);

        let mut failure_patterns = BTreeMap::new();
        for pattern in results.iter().flat_map(FlowResult::failure_patterns) {
            *failure_patterns.entry(pattern).or_insert(0) += 1;
        }

        let characters = results
            .iter()
            .filter_map(|r| {
                Some(SubjectRecord {
                    iteration: r.iteration(),
                    subject_id: r.subject_id()?,
                    public_id: r.public_id()?.to_string(),
                    status: r.status(),
                })
            })
            .collect();

        ReportSummary {
            total,
            passed,
            failed: count(FlowStatus::Fail),
            errors: count(FlowStatus::Error),
            pass_rate: pass_rate(passed, total),
            warnings: results.iter().map(FlowResult::warning_count).sum(),
            failure_patterns,
            characters,
        }
    }

    /// Human-readable summary printed at the end of a run.
    pub fn console_summary(&self, report: &Report) -> String {
        let summary = &report.summary;
        let mut out = String::new();

        let _ = writeln!(out, "Wizard Flow Test Results");
        let _ = writeln!(out, "========================");
        let _ = writeln!(out, "Run ID:    {}", report.run_id);
        let _ = writeln!(
            out,
            "Flow type: {} ({})",
            report.options.flow_kind.as_str(),
            report.options.flow_kind.description()
        );
        let _ = writeln!(out, "Seed:      {}", report.seed);
        let _ = writeln!(
            out,
            "Flows:     {} total, {} passed, {} failed, {} errors",
            summary.total, summary.passed, summary.failed, summary.errors
        );
        let _ = writeln!(out, "Pass rate: {:.1}%", summary.pass_rate);
        if summary.warnings > 0 {
            let _ = writeln!(out, "Warnings:  {}", summary.warnings);
        }

        if !summary.failure_patterns.is_empty() {
            let _ = writeln!(out, "\nFailure patterns:");
            let mut patterns: Vec<(&String, &usize)> = summary.failure_patterns.iter().collect();
            patterns.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (pattern, count) in patterns {
                let _ = writeln!(out, "  {:<40} {}", pattern, count);
            }
        }

        for result in &report.results {
            let status = result.status();
            if status == FlowStatus::Pass && !self.verbose_steps {
                continue;
            }
            let _ = writeln!(
                out,
                "\n#{} [{}] seed={} character={}",
                result.iteration(),
                status,
                result.seed(),
                result.public_id().unwrap_or("-")
            );
            if self.verbose_steps {
                for step in result.steps() {
                    let _ = writeln!(
                        out,
                        "  {:>2}. {:<28} {}",
                        step.index,
                        step.action.as_str(),
                        outcome_label(step.outcome)
                    );
                    for warning in &step.warnings {
                        let _ = writeln!(out, "      warning: {}", warning);
                    }
                }
            }
            for failure in result.failures() {
                let _ = writeln!(
                    out,
                    "  step {} {} ({}): {}",
                    failure.step_index,
                    failure.action,
                    failure.validation.pattern.as_deref().unwrap_or("unknown"),
                    failure.validation.errors.join("; ")
                );
            }
            if let Some(error) = result.error() {
                let status = error
                    .status
                    .map(|s| format!(" {}", s))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  aborted at step {} {} [{}{}]: {}",
                    error.step_index, error.action, error.kind, status, error.message
                );
            }
        }

        if report.has_failures() {
            let _ = writeln!(out, "\nReproduce with --seed {}", report.seed);
        }
        out
    }
}

fn outcome_label(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Ok => "ok",
        StepOutcome::Skipped => "skipped",
        StepOutcome::Fail => "FAIL",
        StepOutcome::HttpError => "HTTP ERROR",
    }
}

fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = passed as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}
