//! Execution engine
//!
//! Runs an execution plan strictly one test at a time. Each result is pushed
//! into the report and emitted as a [`RunEvent`] as soon as it is known.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::TestContext;
use crate::definition::{TestDefinition, TestResponse};
use crate::error::HarnessResult;
use crate::registry::{Registry, Selection};
use crate::report::{CategoryTally, SuiteReport, TestResult, TestStatus};
use crate::scheduler::{ExecutionPlan, PlannedTest, Scheduler};

/// Engine configuration, the `[run]` table of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Per-test timeout; `None` waits indefinitely
    pub test_timeout_secs: Option<u64>,

    /// Start tests even when a dependency failed or was hard-skipped
    pub run_after_failed_dependencies: bool,

    /// Close category/test selections over their dependencies
    pub include_dependencies: bool,

    /// Output directory for the JSON report
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: None,
            run_after_failed_dependencies: false,
            include_dependencies: true,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Progress notifications, in execution order
#[derive(Debug, Clone)]
pub enum RunEvent {
    Planned { order: Vec<String> },
    Started { id: String, name: String, category: String },
    Finished { result: TestResult, tally: CategoryTally },
    Cancelled { not_run: Vec<String> },
    Completed { totals: CategoryTally, duration_ms: u64 },
}

enum Completion {
    Returned(anyhow::Result<TestResponse>),
    Panicked(String),
    TimedOut(Duration),
}

/// Sequential, dependency-aware test runner
pub struct TestRunner {
    config: RunnerConfig,
    events: Option<UnboundedSender<RunEvent>>,
    cancel: CancellationToken,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            config,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Emit progress on `events`
    pub fn with_events(mut self, events: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every test in the registry
    pub async fn run_all(&self, registry: &Registry, ctx: &mut TestContext) -> HarnessResult<SuiteReport> {
        let selection = Selection::all().with_dependencies(self.config.include_dependencies);
        self.run(registry, &selection, ctx).await
    }

    /// Run the tests of the given categories
    pub async fn run_categories(
        &self,
        registry: &Registry,
        categories: &[String],
        ctx: &mut TestContext,
    ) -> HarnessResult<SuiteReport> {
        let selection = Selection::categories(categories.iter().cloned())
            .with_dependencies(self.config.include_dependencies);
        self.run(registry, &selection, ctx).await
    }

    /// Plan and execute a selection. Configuration errors are returned
    /// before any test starts.
    pub async fn run(
        &self,
        registry: &Registry,
        selection: &Selection,
        ctx: &mut TestContext,
    ) -> HarnessResult<SuiteReport> {
        let plan = Scheduler::plan(registry, selection)?;
        Ok(self.execute(registry, &plan, ctx).await)
    }

    /// Execute a plan produced by [`Scheduler::plan`] for the same registry
    pub async fn execute(
        &self,
        registry: &Registry,
        plan: &ExecutionPlan,
        ctx: &mut TestContext,
    ) -> SuiteReport {
        let start = Instant::now();
        let tests = registry.all();
        let mut report = SuiteReport::new(ctx.run_id(), plan.len());
        // Terminal status per registry position
        let mut finished: Vec<Option<TestResult>> = vec![None; tests.len()];

        info!(run = %ctx.run_id(), "Running {} test(s)...", plan.len());
        self.emit(RunEvent::Planned {
            order: plan.ids().into_iter().map(str::to_string).collect(),
        });

        for (step_index, step) in plan.steps().iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.stop(&mut report, plan, step_index);
                break;
            }

            let test = &tests[step.position];
            let mut result = TestResult::pending(test);
            result.dependents = step.dependents;

            if let Some(reason) = self.gate(test, step, tests, &finished) {
                warn!(test = %test.id, "⊘ {}", reason);
                result.hard_skip(reason);
            } else {
                self.emit(RunEvent::Started {
                    id: test.id.clone(),
                    name: test.name.clone(),
                    category: test.category.clone(),
                });
                result.start();

                let (completion, elapsed) = self.invoke(test, ctx).await;
                let exchanges = ctx.take_exchanges();

                if self.cancel.is_cancelled() {
                    info!(test = %test.id, "run cancelled; discarding in-flight result");
                    self.stop(&mut report, plan, step_index);
                    break;
                }

                result.exchanges = exchanges;
                match completion {
                    Completion::Returned(Ok(response)) => result.complete(response, elapsed),
                    Completion::Returned(Err(e)) => result.fail(format!("{:#}", e), elapsed),
                    Completion::Panicked(message) => {
                        result.fail(format!("panicked: {}", message), elapsed)
                    }
                    Completion::TimedOut(limit) => {
                        result.fail(format!("timed out after {:?}", limit), elapsed)
                    }
                }
                log_result(&result);
            }

            finished[step.position] = Some(result.clone());
            let tally = report.record(result.clone());
            self.emit(RunEvent::Finished { result, tally });
        }

        report.finish(start.elapsed());

        info!(
            "Test Results: {} passed, {} failed, {} skipped, {} inconclusive ({} ms)",
            report.totals.passed,
            report.totals.failed,
            report.totals.skipped,
            report.totals.soft_skipped,
            report.duration_ms
        );
        self.emit(RunEvent::Completed {
            totals: report.totals,
            duration_ms: report.duration_ms,
        });

        report
    }

    /// Reason to hard-skip a test, if any
    fn gate(
        &self,
        test: &TestDefinition,
        step: &PlannedTest,
        tests: &[TestDefinition],
        finished: &[Option<TestResult>],
    ) -> Option<String> {
        if let Some(missing) = step.outside_run.first() {
            return Some(format!("dependency '{}' is not part of this run", missing));
        }

        if test.run_if_dependency_failed || self.config.run_after_failed_dependencies {
            return None;
        }

        for &dep in &step.dependencies {
            match &finished[dep] {
                Some(result) if result.status == TestStatus::Failed => {
                    return Some(format!("dependency '{}' failed", tests[dep].id));
                }
                Some(result) if result.is_hard_skip() => {
                    return Some(format!("dependency '{}' was skipped", tests[dep].id));
                }
                Some(_) => {}
                None => {
                    return Some(format!("dependency '{}' did not finish", tests[dep].id));
                }
            }
        }
        None
    }

    async fn invoke(&self, test: &TestDefinition, ctx: &mut TestContext) -> (Completion, Duration) {
        debug!(test = %test.id, "running test");
        let limit = test
            .timeout
            .or_else(|| self.config.test_timeout_secs.map(Duration::from_secs));

        let started = Instant::now();
        let body = AssertUnwindSafe(test.invoke(ctx)).catch_unwind();

        let completion = match limit {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(outcome) => settle(outcome),
                Err(_) => Completion::TimedOut(limit),
            },
            None => settle(body.await),
        };

        (completion, started.elapsed())
    }

    fn stop(&self, report: &mut SuiteReport, plan: &ExecutionPlan, from: usize) {
        report.cancelled = true;
        report.not_run = plan.steps()[from..].iter().map(|s| s.id.clone()).collect();
        warn!("Run cancelled; {} test(s) not run", report.not_run.len());
        self.emit(RunEvent::Cancelled {
            not_run: report.not_run.clone(),
        });
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }
}

fn settle(outcome: Result<anyhow::Result<TestResponse>, Box<dyn Any + Send>>) -> Completion {
    match outcome {
        Ok(returned) => Completion::Returned(returned),
        Err(panic) => Completion::Panicked(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_result(result: &TestResult) {
    match result.status {
        TestStatus::Passed => info!("✓ {} ({} ms)", result.id, result.duration_ms),
        TestStatus::Skipped => info!("⊘ {} - {}", result.id, result.message()),
        _ => error!("✗ {} - {}", result.id, result.message()),
    }
}
