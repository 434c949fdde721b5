//! Behaviour of the scheduler and runner against in-process test bodies

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fieldcheck_common::SessionCredentials;
use fieldcheck_e2e::{
    ApiClient, ApiConfig, Registry, RunEvent, RunnerConfig, Selection, SkipKind, TestContext,
    TestDefinition, TestResponse, TestRunner, TestStatus,
};
use parking_lot::Mutex;

fn ctx() -> TestContext {
    let client = ApiClient::new(&ApiConfig::default()).expect("client");
    TestContext::new(client, SessionCredentials::new("qa@crm.test", "secret"))
}

fn passing(id: &str) -> TestDefinition {
    TestDefinition::new(id, id, "misc", |_ctx| Box::pin(async { Ok(TestResponse::passed("ok")) }))
}

fn failing(id: &str) -> TestDefinition {
    TestDefinition::new(id, id, "misc", |_ctx| {
        Box::pin(async { Ok(TestResponse::failed("HTTP 500")) })
    })
}

/// Passing test that counts how often its body ran
fn counted(id: &str, runs: &Arc<AtomicUsize>) -> TestDefinition {
    let runs = Arc::clone(runs);
    TestDefinition::new(id, id, "misc", move |_ctx| {
        let runs = Arc::clone(&runs);
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(TestResponse::passed("ok"))
        })
    })
}

fn explode() -> anyhow::Result<TestResponse> {
    panic!("boom")
}

#[tokio::test]
async fn test_outcomes_map_to_statuses() {
    let registry = Registry::from_groups([vec![
        passing("pass"),
        failing("fail"),
        TestDefinition::new("soft", "soft", "misc", |_ctx| {
            Box::pin(async { Ok(TestResponse::skipped("nothing to verify")) })
        }),
        TestDefinition::new("error", "error", "misc", |_ctx| {
            Box::pin(async { Err(anyhow::anyhow!("connection refused")) })
        }),
    ]]);

    let mut ctx = ctx();
    let report = TestRunner::new().run_all(&registry, &mut ctx).await.unwrap();

    assert_eq!(report.result("pass").unwrap().status, TestStatus::Passed);
    assert_eq!(report.result("fail").unwrap().status, TestStatus::Failed);
    assert_eq!(report.result("fail").unwrap().error.as_deref(), Some("HTTP 500"));

    let soft = report.result("soft").unwrap();
    assert_eq!(soft.status, TestStatus::Skipped);
    assert_eq!(soft.skip, Some(SkipKind::Soft));
    assert_eq!(soft.details.as_deref(), Some("⊘ Skipped: nothing to verify"));

    let error = report.result("error").unwrap();
    assert_eq!(error.status, TestStatus::Failed);
    assert!(error.error.as_deref().unwrap().contains("connection refused"));

    assert_eq!(report.totals.passed, 1);
    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.totals.soft_skipped, 1);
    assert_eq!(report.results.len(), 4);
    assert!(report.results.iter().all(|r| r.status.is_terminal()));
}

#[tokio::test]
async fn test_panic_becomes_failure_and_run_continues() {
    let registry = Registry::from_groups([vec![
        TestDefinition::new("panics", "panics", "misc", |_ctx| Box::pin(async { explode() })),
        passing("after"),
    ]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    let panicked = report.result("panics").unwrap();
    assert_eq!(panicked.status, TestStatus::Failed);
    assert_eq!(panicked.error.as_deref(), Some("panicked: boom"));
    assert_eq!(report.result("after").unwrap().status, TestStatus::Passed);
}

#[tokio::test]
async fn test_bodies_never_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let slow = |id: &'static str| {
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        let order = Arc::clone(&order);
        TestDefinition::new(id, id, "misc", move |_ctx| {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            let order = Arc::clone(&order);
            Box::pin(async move {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                order.lock().push(format!("start {id}"));
                tokio::time::sleep(Duration::from_millis(20)).await;
                order.lock().push(format!("end {id}"));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(TestResponse::passed("ok"))
            })
        })
    };

    let registry = Registry::from_groups([vec![slow("a"), slow("b"), slow("c")]]);
    TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(
        *order.lock(),
        vec!["start a", "end a", "start b", "end b", "start c", "end c"]
    );
}

#[tokio::test]
async fn test_opted_in_dependent_runs_after_failure() {
    let c_runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![
        passing("a"),
        failing("b").depends_on(["a"]),
        counted("c", &c_runs).depends_on(["b"]).run_if_dependency_failed(true),
    ]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    let order: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(report.result("b").unwrap().status, TestStatus::Failed);
    assert_eq!(report.result("c").unwrap().status, TestStatus::Passed);
    assert_eq!(c_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_dependency_hard_skips_by_default() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![
        failing("b"),
        counted("c", &runs).depends_on(["b"]),
        counted("d", &runs).depends_on(["c"]),
    ]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let c = report.result("c").unwrap();
    assert_eq!(c.status, TestStatus::Skipped);
    assert_eq!(c.skip, Some(SkipKind::Hard));
    assert!(c.message().contains("'b'"));
    // Hard skips propagate
    assert!(report.result("d").unwrap().is_hard_skip());
    assert_eq!(report.totals.skipped, 2);
    assert_eq!(report.result("b").unwrap().dependents, 2);
}

#[tokio::test]
async fn test_best_effort_config_runs_all_dependents() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![failing("b"), counted("c", &runs).depends_on(["b"])]]);

    let runner = TestRunner::with_config(RunnerConfig {
        run_after_failed_dependencies: true,
        ..RunnerConfig::default()
    });
    let report = runner.run_all(&registry, &mut ctx()).await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.result("c").unwrap().status, TestStatus::Passed);
}

#[tokio::test]
async fn test_soft_skipped_dependency_does_not_gate() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![
        TestDefinition::new("list", "list", "misc", |_ctx| {
            Box::pin(async { Ok(TestResponse::skipped("empty list")) })
        }),
        counted("next", &runs).depends_on(["list"]),
    ]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    assert!(report.result("list").unwrap().is_soft_skip());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_dependency_runs_nothing() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![
        counted("w", &runs),
        counted("x", &runs).depends_on(["y"]),
    ]]);

    let err = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("'x'"));
    assert!(err.to_string().contains("'y'"));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dependency_outside_selection_hard_skips() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = Registry::from_groups([vec![
        counted("login", &runs),
        counted("contact", &runs).depends_on(["login"]),
    ]]);

    let selection = Selection::tests(["contact"]).with_dependencies(false);
    let report = TestRunner::new().run(&registry, &selection, &mut ctx()).await.unwrap();

    assert_eq!(report.results.len(), 1);
    let contact = report.result("contact").unwrap();
    assert!(contact.is_hard_skip());
    assert!(contact.message().contains("not part of this run"));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cleanup_removes_fixture_keys() {
    let registry = Registry::from_groups([vec![
        TestDefinition::new("create", "create", "misc", |ctx| {
            Box::pin(async move {
                ctx.fixtures.set("k1", 101i64);
                ctx.fixtures.set("k2", "abc");
                Ok(TestResponse::passed("created"))
            })
        }),
        TestDefinition::new("use", "use", "misc", |ctx| {
            Box::pin(async move {
                let k1 = ctx.fixtures.require("k1")?.clone();
                Ok(TestResponse::check(k1.as_i64() == Some(101), "k1 visible"))
            })
        })
        .depends_on(["create"]),
        TestDefinition::new("cleanup", "cleanup", "misc", |ctx| {
            Box::pin(async move {
                ctx.fixtures.delete("k1");
                ctx.fixtures.delete("k2");
                Ok(TestResponse::passed("deleted"))
            })
        })
        .depends_on(["use"]),
    ]]);

    let mut ctx = ctx();
    let report = TestRunner::new().run_all(&registry, &mut ctx).await.unwrap();

    assert_eq!(report.totals.passed, 3);
    assert!(!ctx.fixtures.has("k1"));
    assert!(!ctx.fixtures.has("k2"));
}

#[tokio::test]
async fn test_reset_isolates_runs() {
    let registry = Registry::from_groups([vec![TestDefinition::new("once", "once", "misc", |ctx| {
        Box::pin(async move {
            if ctx.fixtures.has("leftover") {
                return Ok(TestResponse::failed("state leaked from a previous run"));
            }
            ctx.fixtures.set("leftover", 0i64);
            Ok(TestResponse::passed("clean"))
        })
    })]]);

    let runner = TestRunner::new();
    let mut ctx = ctx();

    let first = runner.run_all(&registry, &mut ctx).await.unwrap();
    ctx.reset();
    let second = runner.run_all(&registry, &mut ctx).await.unwrap();

    assert_eq!(first.totals.passed, 1);
    assert_eq!(second.totals.passed, 1);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_timeout_fails_only_the_slow_test() {
    let registry = Registry::from_groups([vec![
        TestDefinition::new("slow", "slow", "misc", |_ctx| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(TestResponse::passed("too late"))
            })
        })
        .timeout(Duration::from_millis(50)),
        passing("next"),
    ]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx()).await.unwrap();

    let slow = report.result("slow").unwrap();
    assert_eq!(slow.status, TestStatus::Failed);
    assert_eq!(slow.error.as_deref(), Some("timed out after 50ms"));
    assert_eq!(report.result("next").unwrap().status, TestStatus::Passed);
}

#[tokio::test]
async fn test_cancellation_discards_in_flight_result() {
    let runner = TestRunner::new();
    let token = runner.cancellation_token();
    let runs = Arc::new(AtomicUsize::new(0));

    let registry = Registry::from_groups([vec![
        passing("first"),
        TestDefinition::new("interrupted", "interrupted", "misc", move |_ctx| {
            let token = token.clone();
            Box::pin(async move {
                token.cancel();
                Ok(TestResponse::passed("finished after cancel"))
            })
        }),
        counted("never", &runs),
    ]]);

    let report = runner.run_all(&registry, &mut ctx()).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].id, "first");
    assert_eq!(report.not_run, vec!["interrupted".to_string(), "never".to_string()]);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_results_are_emitted_progressively() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let registry = Registry::from_groups([vec![passing("a"), failing("b").depends_on(["a"])]]);

    TestRunner::new()
        .with_events(tx)
        .run_all(&registry, &mut ctx())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(match event {
            RunEvent::Planned { order } => format!("planned {}", order.join(",")),
            RunEvent::Started { id, .. } => format!("started {id}"),
            RunEvent::Finished { result, tally } => {
                format!("finished {} {} {}", result.id, result.status.as_str(), tally.total())
            }
            RunEvent::Cancelled { .. } => "cancelled".to_string(),
            RunEvent::Completed { totals, .. } => format!("completed {}", totals.total()),
        });
    }

    assert_eq!(
        events,
        vec![
            "planned a,b",
            "started a",
            "finished a passed 1",
            "started b",
            "finished b failed 2",
            "completed 2",
        ]
    );
}
