use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use wizflow_cli::{list_reports, run_batch, show_report, Args, CliConfig};
use wizflow_report::{FileReportStore, ReportGenerator};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = CliConfig::load().context("Failed to load configuration")?;
    wizflow_monitoring::init(&config.monitoring()).context("Failed to initialize monitoring")?;

    let store = FileReportStore::new(&config.report_dir);

    if args.list_reports {
        print!("{}", list_reports(&store).await.context("Failed to list reports")?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(run_id) = &args.show_report {
        let summary = show_report(&store, run_id, args.verbose_steps)
            .await
            .with_context(|| format!("Report not found: {}", run_id))?;
        print!("{}", summary);
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = run_batch(&args, &config, &store)
        .await
        .context("Wizard flow run failed")?;

    let report = &outcome.report;
    print!(
        "{}",
        ReportGenerator::new()
            .with_verbose_steps(args.verbose_steps)
            .console_summary(report)
    );
    println!();
    if report.has_failures() {
        println!(
            "Tests failed: {} failures, {} errors",
            report.summary.failed, report.summary.errors
        );
    } else {
        println!("All tests passed!");
    }
    println!("Report saved to: {}", outcome.stored.location);

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
