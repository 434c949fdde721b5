//! `fieldcheck plan`: show the execution order without running anything

use anyhow::Result;
use clap::Args;

use fieldcheck_e2e::{HarnessConfig, Registry, Scheduler};

use super::SelectionArgs;
use crate::output::{print_list, OutputFormat, PlanRow};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

pub fn execute(args: PlanArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let registry = Registry::standard();
    let selection = args.selection.to_selection(config.run.include_dependencies);
    let plan = Scheduler::plan(&registry, &selection)?;

    let rows: Vec<PlanRow> = plan
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| PlanRow::new(i + 1, step))
        .collect();
    print_list(&rows, format);
    Ok(())
}
