//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use fieldcheck_e2e::{CategoryTally, PlannedTest, TestDefinition, TestResult, TestStatus};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    /// Whether progress lines should be streamed while a run is in progress
    pub fn is_human(self) -> bool {
        matches!(self, OutputFormat::Table | OutputFormat::Plain)
    }
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && format.is_human() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json | OutputFormat::Yaml => print_value(items, format),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print any serializable value as JSON or YAML; other formats fall back to JSON
pub fn print_value<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => match serde_yaml::to_string(value) {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => print_error(&format!("failed to render YAML: {}", e)),
        },
        _ => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("failed to render JSON: {}", e)),
        },
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

/// One line per finished test, e.g. `✓ contacts/contact-create (120 ms)`
pub fn progress_line(result: &TestResult) -> String {
    let label = format!("{}/{}", result.category, result.id);
    match result.status {
        TestStatus::Passed => format!("{} {} ({} ms)", "✓".green(), label, result.duration_ms),
        TestStatus::Failed => format!(
            "{} {} ({} ms) {}",
            "✗".red(),
            label.bold(),
            result.duration_ms,
            result.message().red()
        ),
        TestStatus::Skipped if result.is_soft_skip() => {
            format!("{} {} {}", "⊘".yellow(), label, result.message().dimmed())
        }
        _ => format!("{} {} {}", "↷".dimmed(), label.dimmed(), result.message().dimmed()),
    }
}

/// Row of `fieldcheck list`
#[derive(Serialize)]
pub struct TestRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub depends_on: Vec<String>,
}

impl From<&TestDefinition> for TestRow {
    fn from(test: &TestDefinition) -> Self {
        Self {
            id: test.id.clone(),
            name: test.name.clone(),
            category: test.category.clone(),
            depends_on: test.depends_on.clone(),
        }
    }
}

impl TableDisplay for TestRow {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Category", "Depends On"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.category.clone(),
            self.depends_on.join(", "),
        ]
    }
}

/// Row of `fieldcheck plan`
#[derive(Serialize)]
pub struct PlanRow {
    pub step: usize,
    pub id: String,
    pub category: String,
    pub dependents: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outside_run: Vec<String>,
}

impl PlanRow {
    pub fn new(step: usize, planned: &PlannedTest) -> Self {
        Self {
            step,
            id: planned.id.clone(),
            category: planned.category.clone(),
            dependents: planned.dependents,
            outside_run: planned.outside_run.clone(),
        }
    }
}

impl TableDisplay for PlanRow {
    fn headers() -> Vec<&'static str> {
        vec!["#", "ID", "Category", "Dependents", "Missing Dependencies"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.step.to_string(),
            self.id.clone(),
            self.category.clone(),
            self.dependents.to_string(),
            self.outside_run.join(", "),
        ]
    }
}

/// Per-category summary row
#[derive(Serialize)]
pub struct CategoryRow {
    pub category: String,
    #[serde(flatten)]
    pub tally: CategoryTally,
}

impl TableDisplay for CategoryRow {
    fn headers() -> Vec<&'static str> {
        vec!["Category", "Passed", "Failed", "Skipped", "Inconclusive", "Total"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.category.clone(),
            self.tally.passed.to_string(),
            self.tally.failed.to_string(),
            self.tally.skipped.to_string(),
            self.tally.soft_skipped.to_string(),
            self.tally.total().to_string(),
        ]
    }
}
