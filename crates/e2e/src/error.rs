//! Error types for the test engine

use thiserror::Error;

/// Errors that abort a run or fail harness setup.
///
/// Failures inside individual test bodies are never reported through this
/// type; they become `failed` results.
///
/// Wrapped library errors are exposed as `source()` rather than repeated in
/// the message, so render with `{:#}` through anyhow to see the full chain.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Duplicate test id: {0}")]
    DuplicateTestId(String),

    #[error("Test '{test}' depends on unknown test id '{dependency}'")]
    UnknownDependency { test: String, dependency: String },

    #[error("Dependency cycle detected: {}", cycle_path(.members))]
    DependencyCycle { members: Vec<String> },

    #[error("Unknown test id in selection: {0}")]
    UnknownSelection(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("HTTP error")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Capture(#[from] fieldcheck_common::Error),
}

impl HarnessError {
    /// Configuration errors are detected before any test runs
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            HarnessError::DuplicateTestId(_)
                | HarnessError::UnknownDependency { .. }
                | HarnessError::DependencyCycle { .. }
                | HarnessError::UnknownSelection(_)
                | HarnessError::UnknownCategory(_)
                | HarnessError::InvalidConfig(_)
        )
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// `a -> b -> c -> a`
fn cycle_path(members: &[String]) -> String {
    let mut path = members.join(" -> ");
    if let Some(first) = members.first() {
        path.push_str(" -> ");
        path.push_str(first);
    }
    path
}
