//! CLI Commands

pub mod curl;
pub mod init;
pub mod list;
pub mod plan;
pub mod run;

use clap::Args;
use fieldcheck_e2e::Selection;

/// Category and test filters shared by `run` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Only run tests of this category (repeatable)
    #[arg(short, long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Only run this test id (repeatable)
    #[arg(short, long = "test", value_name = "ID")]
    pub tests: Vec<String>,

    /// Do not pull in dependencies of the selected tests
    #[arg(long)]
    pub no_deps: bool,
}

impl SelectionArgs {
    /// Selection honouring `--no-deps` over the configured default
    pub fn to_selection(&self, include_dependencies: bool) -> Selection {
        Selection {
            categories: self.categories.clone(),
            tests: self.tests.clone(),
            include_dependencies: include_dependencies && !self.no_deps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_deps_overrides_config() {
        let args = SelectionArgs {
            categories: vec!["sales".into()],
            no_deps: true,
            ..SelectionArgs::default()
        };
        let selection = args.to_selection(true);
        assert!(!selection.include_dependencies);
        assert_eq!(selection.categories, vec!["sales".to_string()]);
        assert!(SelectionArgs::default().to_selection(true).is_all());
    }
}
