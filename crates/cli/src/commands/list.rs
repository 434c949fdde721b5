//! `fieldcheck list` and `fieldcheck categories`

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use fieldcheck_e2e::Registry;

use crate::output::{print_list, OutputFormat, TableDisplay, TestRow};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list tests of this category
    #[arg(short, long)]
    pub category: Option<String>,
}

pub fn execute(args: ListArgs, format: OutputFormat) -> Result<()> {
    let registry = Registry::standard();
    let rows: Vec<TestRow> = match &args.category {
        Some(category) => {
            let tests = registry.by_category(category);
            if tests.is_empty() {
                bail!("unknown category '{}'", category);
            }
            tests.into_iter().map(TestRow::from).collect()
        }
        None => registry.all().iter().map(TestRow::from).collect(),
    };
    print_list(&rows, format);
    Ok(())
}

#[derive(Serialize)]
struct CategorySummary {
    category: String,
    tests: usize,
}

impl TableDisplay for CategorySummary {
    fn headers() -> Vec<&'static str> {
        vec!["Category", "Tests"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.category.clone(), self.tests.to_string()]
    }
}

pub fn categories(format: OutputFormat) -> Result<()> {
    let registry = Registry::standard();
    let rows: Vec<CategorySummary> = registry
        .categories()
        .into_iter()
        .map(|category| CategorySummary {
            tests: registry.by_category(&category).len(),
            category,
        })
        .collect();
    print_list(&rows, format);
    Ok(())
}
