//! `fieldcheck run`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fieldcheck_e2e::{
    HarnessConfig, Registry, RunEvent, Scheduler, SuiteReport, TestContext, TestRunner,
};

use super::SelectionArgs;
use crate::output::{
    print_error, print_info, print_list, print_success, print_value, print_warning,
    progress_line, CategoryRow, OutputFormat,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Start tests even when a dependency failed
    #[arg(long)]
    pub best_effort: bool,

    /// Per-test timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for test-results.json
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Exit non-zero when any test failed
    #[arg(long)]
    pub strict: bool,
}

impl RunArgs {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply(&self, config: &mut HarnessConfig) {
        if self.best_effort {
            config.run.run_after_failed_dependencies = true;
        }
        if let Some(secs) = self.timeout {
            config.run.test_timeout_secs = Some(secs);
        }
        if let Some(dir) = &self.output {
            config.run.output_dir = dir.clone();
        }
    }
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let registry = Registry::standard();
    let selection = args.selection.to_selection(config.run.include_dependencies);
    let plan = Scheduler::plan(&registry, &selection)?;
    let mut ctx = TestContext::from_config(&config)?;

    if format.is_human() {
        print_info(&format!(
            "Running {} test(s) against {}",
            plan.len(),
            ctx.client().base_url()
        ));
    }

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(stream_progress(rx, format));

    let runner = TestRunner::with_config(config.run.clone())
        .with_events(tx)
        .with_cancellation(cancel);
    let report = runner.execute(&registry, &plan, &mut ctx).await;
    // Closes the event channel so the printer can finish
    drop(runner);
    printer.await.context("progress printer stopped unexpectedly")?;

    let path = report
        .write_json(&config.output_dir())
        .with_context(|| format!("failed to write report to {}", config.output_dir().display()))?;
    info!(path = %path.display(), "report written");

    if format.is_human() {
        print_summary(&report, format);
        print_info(&format!("Report written to {}", path.display()));
    } else {
        print_value(&report, format);
    }

    if args.strict && report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

async fn stream_progress(mut events: UnboundedReceiver<RunEvent>, format: OutputFormat) {
    while let Some(event) = events.recv().await {
        if !format.is_human() {
            continue;
        }
        match event {
            RunEvent::Finished { result, .. } => println!("{}", progress_line(&result)),
            RunEvent::Cancelled { not_run } => {
                print_warning(&format!("Run cancelled, {} test(s) not run", not_run.len()))
            }
            RunEvent::Planned { .. } | RunEvent::Started { .. } | RunEvent::Completed { .. } => {}
        }
    }
}

fn print_summary(report: &SuiteReport, format: OutputFormat) {
    println!();

    let critical = report.critical_failures();
    if !critical.is_empty() {
        println!("{}", "Critical failures".red().bold());
        for result in critical {
            println!(
                "  {} {} blocks {} test(s): {}",
                "✗".red(),
                result.id.bold(),
                result.dependents,
                result.message()
            );
        }
        println!();
    }

    let rows: Vec<CategoryRow> = report
        .categories
        .iter()
        .map(|(category, tally)| CategoryRow {
            category: category.clone(),
            tally: *tally,
        })
        .collect();
    print_list(&rows, format);

    let totals = report.totals;
    let line = format!(
        "{} passed, {} failed, {} skipped, {} inconclusive in {} ms",
        totals.passed, totals.failed, totals.skipped, totals.soft_skipped, report.duration_ms
    );
    if report.cancelled {
        print_warning(&format!("Cancelled: {}", line));
    } else if report.has_failures() {
        print_error(&line);
    } else {
        print_success(&line);
    }
}
