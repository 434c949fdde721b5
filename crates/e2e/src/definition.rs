//! Test definitions and the contract between the engine and test bodies

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use fieldcheck_common::{RequestData, ResponseData};

use crate::client::ApiResponse;
use crate::context::TestContext;

/// Prefix used in the details of a soft skip
pub const SOFT_SKIP_MARKER: &str = "⊘";

/// Future returned by a test body
pub type TestFuture<'a> = BoxFuture<'a, anyhow::Result<TestResponse>>;

/// A test body: async, side-effecting, borrowing the run context for its duration
pub type TestFn = Arc<dyn for<'a> Fn(&'a mut TestContext) -> TestFuture<'a> + Send + Sync>;

/// What a test body concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    /// Ran, but found nothing to verify (soft skip)
    Skipped,
}

/// Value returned by a test body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub outcome: TestOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<RequestData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<ResponseData>,
}

impl TestResponse {
    fn with_outcome(outcome: TestOutcome) -> Self {
        Self {
            outcome,
            details: None,
            error: None,
            http_status: None,
            response_size: None,
            request_data: None,
            response_data: None,
        }
    }

    pub fn passed(details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::with_outcome(TestOutcome::Passed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_outcome(TestOutcome::Failed)
        }
    }

    /// Soft skip: the prerequisite produced nothing to test
    pub fn skipped(reason: impl AsRef<str>) -> Self {
        Self {
            details: Some(format!("{} Skipped: {}", SOFT_SKIP_MARKER, reason.as_ref())),
            ..Self::with_outcome(TestOutcome::Skipped)
        }
    }

    /// Pass when `ok`, otherwise fail with the same message
    pub fn check(ok: bool, message: impl Into<String>) -> Self {
        if ok {
            Self::passed(message)
        } else {
            Self::failed(message)
        }
    }

    /// Outcome derived from the HTTP status of an API call, with the exchange attached
    pub fn from_api(response: &ApiResponse, details: impl Into<String>) -> Self {
        let base = if response.is_success() {
            Self::passed(details)
        } else {
            Self::failed(
                response
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("HTTP {}", response.status)),
            )
        };
        base.with_exchange(response)
    }

    /// Pass only when the response carries exactly `expected` status
    pub fn expect_status(response: &ApiResponse, expected: u16, details: impl Into<String>) -> Self {
        let base = if response.status == expected {
            Self::passed(details)
        } else {
            Self::failed(format!(
                "expected HTTP {}, got {}{}",
                expected,
                response.status,
                response
                    .error
                    .as_deref()
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            ))
        };
        base.with_exchange(response)
    }

    /// Attach status, size and captured request/response of an API call
    pub fn with_exchange(mut self, response: &ApiResponse) -> Self {
        self.http_status = Some(response.status);
        self.response_size = Some(response.response_size.clone());
        self.request_data = Some(response.request_data.clone());
        self.response_data = Some(response.response_data.clone());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome != TestOutcome::Failed
    }
}

/// Static declaration of one test case
#[derive(Clone)]
pub struct TestDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    /// Ids that must reach a terminal state before this test starts
    pub depends_on: Vec<String>,
    /// Run even when a dependency failed or was hard-skipped
    pub run_if_dependency_failed: bool,
    /// Overrides the run-level per-test timeout
    pub timeout: Option<Duration>,
    test: TestFn,
}

impl TestDefinition {
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        test: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut TestContext) -> TestFuture<'a> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            depends_on: Vec::new(),
            run_if_dependency_failed: false,
            timeout: None,
            test: Arc::new(test),
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.depends_on.contains(&id) {
                self.depends_on.push(id);
            }
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn run_if_dependency_failed(mut self, run: bool) -> Self {
        self.run_if_dependency_failed = run;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn invoke<'a>(&self, ctx: &'a mut TestContext) -> TestFuture<'a> {
        (self.test)(ctx)
    }
}

impl fmt::Debug for TestDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("depends_on", &self.depends_on)
            .field("run_if_dependency_failed", &self.run_if_dependency_failed)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: &str) -> TestDefinition {
        TestDefinition::new(id, id, "misc", |_ctx| {
            Box::pin(async { Ok(TestResponse::passed("ok")) })
        })
    }

    #[test]
    fn test_depends_on_deduplicates() {
        let def = noop("b").depends_on(["a", "a", "c"]);
        assert_eq!(def.depends_on, vec!["a".to_string(), "c".to_string()]);
        assert!(!def.run_if_dependency_failed);
        assert!(def.timeout.is_none());
    }

    #[test]
    fn test_soft_skip_carries_marker() {
        let response = TestResponse::skipped("no contact was created");
        assert_eq!(response.outcome, TestOutcome::Skipped);
        assert!(response.is_success());
        assert_eq!(
            response.details.as_deref(),
            Some("⊘ Skipped: no contact was created")
        );
    }

    #[test]
    fn test_check() {
        assert_eq!(TestResponse::check(true, "m").outcome, TestOutcome::Passed);
        let failed = TestResponse::check(false, "m");
        assert_eq!(failed.outcome, TestOutcome::Failed);
        assert_eq!(failed.error.as_deref(), Some("m"));
    }
}
