//! `fieldcheck curl`: replay commands from a saved report

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use fieldcheck_e2e::{SuiteReport, REPORT_FILE};

use crate::output::{print_value, OutputFormat};

#[derive(Args, Debug)]
pub struct CurlArgs {
    /// Report file, or the directory containing test-results.json
    #[arg(short, long, default_value = "test-results")]
    pub report: PathBuf,

    /// Only export requests of this test id
    #[arg(short, long)]
    pub test: Option<String>,
}

#[derive(Serialize)]
struct CurlExport {
    test: String,
    commands: Vec<String>,
}

pub fn execute(args: CurlArgs, format: OutputFormat) -> Result<()> {
    let path = if args.report.is_dir() {
        args.report.join(REPORT_FILE)
    } else {
        args.report.clone()
    };
    let report = SuiteReport::read_json(&path)?;

    let ids: Vec<String> = match &args.test {
        Some(id) => {
            if report.result(id).is_none() {
                bail!("test '{}' is not in {}", id, path.display());
            }
            vec![id.clone()]
        }
        None => report.results.iter().map(|r| r.id.clone()).collect(),
    };

    let mut exports = Vec::new();
    for id in ids {
        let commands = report.curl_commands(&id)?;
        if !commands.is_empty() {
            exports.push(CurlExport { test: id, commands });
        }
    }

    if format.is_human() {
        for export in &exports {
            println!("# {}", export.test);
            for command in &export.commands {
                println!("{}\n", command);
            }
        }
    } else {
        print_value(&exports, format);
    }
    Ok(())
}
