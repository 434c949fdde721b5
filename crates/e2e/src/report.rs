//! Test results and the run report

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use fieldcheck_common::{RequestData, ResponseData};

use crate::client::Exchange;
use crate::definition::{TestDefinition, TestOutcome, TestResponse};
use crate::error::{HarnessError, HarnessResult};

/// File name of the JSON report inside the output directory
pub const REPORT_FILE: &str = "test-results.json";

/// Lifecycle of one test within a run.
///
/// `Pending -> Running -> (Passed | Failed | Skipped)`, plus
/// `Pending -> Skipped` for tests the engine declines to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Failed | TestStatus::Skipped)
    }

    pub fn can_transition_to(self, next: TestStatus) -> bool {
        matches!(
            (self, next),
            (TestStatus::Pending, TestStatus::Running)
                | (TestStatus::Pending, TestStatus::Skipped)
                | (TestStatus::Running, TestStatus::Passed)
                | (TestStatus::Running, TestStatus::Failed)
                | (TestStatus::Running, TestStatus::Skipped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

/// Why a test ended up skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// The body ran and found nothing to verify; inconclusive
    Soft,
    /// The engine never started the body
    Hard,
}

/// Outcome of one test within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<SkipKind>,
    /// Wall-clock time of the test body only
    pub duration_ms: u64,
    /// Completion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<RequestData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<ResponseData>,
    /// Every HTTP round-trip the body made, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exchanges: Vec<Exchange>,
    /// Tests in this run that transitively depend on this one
    #[serde(default)]
    pub dependents: usize,
}

impl TestResult {
    pub fn pending(test: &TestDefinition) -> Self {
        Self {
            id: test.id.clone(),
            name: test.name.clone(),
            category: test.category.clone(),
            status: TestStatus::Pending,
            skip: None,
            duration_ms: 0,
            timestamp: None,
            error: None,
            details: None,
            http_status: None,
            response_size: None,
            request_data: None,
            response_data: None,
            exchanges: Vec::new(),
            dependents: 0,
        }
    }

    fn transition(&mut self, next: TestStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "invalid transition {:?} -> {:?} for {}",
            self.status,
            next,
            self.id
        );
        self.status = next;
        if next.is_terminal() {
            self.timestamp = Some(Utc::now());
        }
    }

    pub(crate) fn start(&mut self) {
        self.transition(TestStatus::Running);
    }

    /// Record what the body returned
    pub(crate) fn complete(&mut self, response: TestResponse, elapsed: Duration) {
        self.duration_ms = elapsed.as_millis() as u64;
        let (status, skip) = match response.outcome {
            TestOutcome::Passed => (TestStatus::Passed, None),
            TestOutcome::Failed => (TestStatus::Failed, None),
            TestOutcome::Skipped => (TestStatus::Skipped, Some(SkipKind::Soft)),
        };
        self.skip = skip;
        self.error = response.error;
        self.details = response.details;
        self.http_status = response.http_status;
        self.response_size = response.response_size;
        self.request_data = response.request_data;
        self.response_data = response.response_data;
        if status == TestStatus::Failed && self.error.is_none() {
            self.error = Some("test reported failure".to_string());
        }
        self.transition(status);
    }

    /// The body errored, panicked or timed out
    pub(crate) fn fail(&mut self, error: impl Into<String>, elapsed: Duration) {
        self.duration_ms = elapsed.as_millis() as u64;
        self.error = Some(error.into());
        self.transition(TestStatus::Failed);
    }

    /// The engine declined to start the body
    pub(crate) fn hard_skip(&mut self, reason: impl Into<String>) {
        self.skip = Some(SkipKind::Hard);
        self.details = Some(reason.into());
        self.transition(TestStatus::Skipped);
    }

    pub fn is_soft_skip(&self) -> bool {
        self.skip == Some(SkipKind::Soft)
    }

    pub fn is_hard_skip(&self) -> bool {
        self.skip == Some(SkipKind::Hard)
    }

    /// Short message for a result row
    pub fn message(&self) -> &str {
        self.error
            .as_deref()
            .or(self.details.as_deref())
            .unwrap_or("")
    }

    /// Curl commands for every captured request, falling back to the
    /// request attached to the response
    pub fn curl_commands(&self) -> HarnessResult<Vec<String>> {
        let mut commands = Vec::new();
        if self.exchanges.is_empty() {
            if let Some(request) = &self.request_data {
                commands.push(request.to_curl()?);
            }
        } else {
            for exchange in &self.exchanges {
                commands.push(exchange.request.to_curl()?);
            }
        }
        Ok(commands)
    }
}

/// Running counts for one category (or the whole run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub passed: usize,
    pub failed: usize,
    /// Hard skips
    pub skipped: usize,
    /// Ran, but inconclusive
    pub soft_skipped: usize,
}

impl CategoryTally {
    pub fn record(&mut self, result: &TestResult) {
        match result.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped if result.is_soft_skip() => self.soft_skipped += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Pending | TestStatus::Running => {}
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.soft_skipped
    }
}

/// Report of one run, built up as results arrive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Tests planned for this run
    pub planned: usize,
    pub totals: CategoryTally,
    pub categories: BTreeMap<String, CategoryTally>,
    pub results: Vec<TestResult>,
    pub cancelled: bool,
    /// Planned ids that never produced a result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_run: Vec<String>,
}

impl SuiteReport {
    pub fn new(run_id: impl Into<String>, planned: usize) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            planned,
            totals: CategoryTally::default(),
            categories: BTreeMap::new(),
            results: Vec::with_capacity(planned),
            cancelled: false,
            not_run: Vec::new(),
        }
    }

    /// Add a terminal result, returning the updated tally of its category
    pub fn record(&mut self, result: TestResult) -> CategoryTally {
        self.totals.record(&result);
        let tally = self.categories.entry(result.category.clone()).or_default();
        tally.record(&result);
        let snapshot = *tally;
        self.results.push(result);
        snapshot
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.duration_ms = elapsed.as_millis() as u64;
    }

    pub fn result(&self, id: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0
    }

    /// Failed or hard-skipped tests that others depend on, most dependents first
    pub fn critical_failures(&self) -> Vec<&TestResult> {
        let mut critical: Vec<&TestResult> = self
            .results
            .iter()
            .filter(|r| r.dependents > 0)
            .filter(|r| r.status == TestStatus::Failed || r.is_hard_skip())
            .collect();
        critical.sort_by(|a, b| b.dependents.cmp(&a.dependents));
        critical
    }

    /// Write the report as pretty JSON into `dir`
    pub fn write_json(&self, dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    pub fn read_json(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Curl reproduction of the requests made by one test
    pub fn curl_commands(&self, id: &str) -> HarnessResult<Vec<String>> {
        self.result(id)
            .ok_or_else(|| HarnessError::UnknownSelection(id.to_string()))?
            .curl_commands()
    }
}
