//! Generic create/list/get/update/cleanup chain for one REST resource

use std::sync::Arc;

use serde_json::Value;

use crate::context::TestContext;
use crate::definition::{TestDefinition, TestFuture, TestResponse};

/// Builds a request payload from the run context; `None` means a required
/// fixture is missing and the test soft-skips
pub type Payload = fn(&TestContext) -> Option<Value>;

/// Description of one CRUD resource under test
#[derive(Clone)]
pub struct CrudSuite {
    pub category: &'static str,
    /// Id prefix, e.g. `contact` for `contact-create`
    pub prefix: &'static str,
    /// Human name, e.g. `Contact`
    pub label: &'static str,
    pub path: &'static str,
    pub fixture_key: &'static str,
    /// Dependencies of the create test
    pub create_after: &'static [&'static str],
    /// Tests that still reference the entity and must finish before cleanup
    pub cleanup_after: &'static [&'static str],
    pub create_body: Payload,
    pub update_body: Payload,
}

type Operation = for<'a> fn(Arc<CrudSuite>, &'a mut TestContext) -> TestFuture<'a>;

impl CrudSuite {
    pub fn id(&self, operation: &str) -> String {
        format!("{}-{}", self.prefix, operation)
    }

    /// `create`, `list`, `get`, `update`, `cleanup`, chained by dependencies
    pub fn definitions(self) -> Vec<TestDefinition> {
        let suite = Arc::new(self);
        let create = suite.id("create");

        vec![
            define(&suite, "create", "Create", CrudSuite::create)
                .depends_on(suite.create_after.iter().copied()),
            define(&suite, "list", "List", CrudSuite::list).depends_on([create.clone()]),
            define(&suite, "get", "Get", CrudSuite::get).depends_on([create.clone()]),
            define(&suite, "update", "Update", CrudSuite::update).depends_on([suite.id("get")]),
            define(&suite, "cleanup", "Delete", CrudSuite::cleanup)
                .depends_on([suite.id("update"), suite.id("list")])
                .depends_on(suite.cleanup_after.iter().copied())
                .run_if_dependency_failed(true)
                .description(format!("Removes the {} created by this run", suite.label)),
        ]
    }

    fn create<'a>(self: Arc<Self>, ctx: &'a mut TestContext) -> TestFuture<'a> {
        Box::pin(async move {
            let Some(body) = (self.create_body)(ctx) else {
                return Ok(TestResponse::skipped(format!(
                    "prerequisites for {} are missing",
                    self.label
                )));
            };
            create_entity(ctx, self.path, body, self.fixture_key, self.label).await
        })
    }

    fn list<'a>(self: Arc<Self>, ctx: &'a mut TestContext) -> TestFuture<'a> {
        Box::pin(async move {
            let response = ctx.get(self.path).await?;
            if !response.is_success() {
                return Ok(TestResponse::from_api(&response, ""));
            }
            let outcome = match response.items() {
                Some(items) => TestResponse::passed(format!("Listed {} {}(s)", items.len(), self.label)),
                None => TestResponse::failed(format!("{} list response is not a list", self.label)),
            };
            Ok(outcome.with_exchange(&response))
        })
    }

    fn get<'a>(self: Arc<Self>, ctx: &'a mut TestContext) -> TestFuture<'a> {
        Box::pin(async move { fetch_entity(ctx, self.path, self.fixture_key, self.label).await })
    }

    fn update<'a>(self: Arc<Self>, ctx: &'a mut TestContext) -> TestFuture<'a> {
        Box::pin(async move {
            let Some(id) = ctx.fixtures.get(self.fixture_key).cloned() else {
                return Ok(TestResponse::skipped(format!("no {} was created", self.label)));
            };
            let Some(body) = (self.update_body)(ctx) else {
                return Ok(TestResponse::skipped(format!(
                    "prerequisites for updating {} are missing",
                    self.label
                )));
            };
            let response = ctx.put(format!("{}/{}", self.path, id), body).await?;
            Ok(TestResponse::from_api(&response, format!("Updated {} {}", self.label, id)))
        })
    }

    fn cleanup<'a>(self: Arc<Self>, ctx: &'a mut TestContext) -> TestFuture<'a> {
        Box::pin(async move { delete_entity(ctx, self.path, self.fixture_key, self.label).await })
    }
}

fn define(suite: &Arc<CrudSuite>, operation: &str, verb: &str, body: Operation) -> TestDefinition {
    let owned = Arc::clone(suite);
    TestDefinition::new(
        suite.id(operation),
        format!("{} {}", verb, suite.label),
        suite.category,
        move |ctx| body(Arc::clone(&owned), ctx),
    )
}

/// POST `body` to `path` and store the returned id under `key`
pub(crate) async fn create_entity(
    ctx: &mut TestContext,
    path: &str,
    body: Value,
    key: &str,
    label: &str,
) -> anyhow::Result<TestResponse> {
    let response = ctx.post(path, body).await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    match response.id() {
        Some(id) => {
            ctx.fixtures.set(key, id.clone());
            Ok(TestResponse::from_api(&response, format!("Created {} {}", label, id)))
        }
        None => Ok(TestResponse::failed(format!("create {} returned no id", label))
            .with_exchange(&response)),
    }
}

/// GET `path/{id}` for the id stored under `key` and check the id round-trips
pub(crate) async fn fetch_entity(
    ctx: &mut TestContext,
    path: &str,
    key: &str,
    label: &str,
) -> anyhow::Result<TestResponse> {
    let Some(id) = ctx.fixtures.get(key).cloned() else {
        return Ok(TestResponse::skipped(format!("no {} was created", label)));
    };

    let response = ctx.get(format!("{}/{}", path, id)).await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    let returned = response.id().map(|v| v.to_string());
    let outcome = if returned.as_deref() == Some(id.to_string().as_str()) {
        TestResponse::passed(format!("Fetched {} {}", label, id))
    } else {
        TestResponse::failed(format!(
            "expected {} {}, got {}",
            label,
            id,
            returned.unwrap_or_else(|| "no id".to_string())
        ))
    };
    Ok(outcome.with_exchange(&response))
}

/// DELETE `path/{id}` and drop the fixture key. A 404 counts as already gone.
pub(crate) async fn delete_entity(
    ctx: &mut TestContext,
    path: &str,
    key: &str,
    label: &str,
) -> anyhow::Result<TestResponse> {
    let Some(id) = ctx.fixtures.get(key).cloned() else {
        return Ok(TestResponse::skipped(format!("no {} to clean up", label)));
    };

    let response = ctx.delete(format!("{}/{}", path, id)).await?;
    if response.is_success() || response.status == 404 {
        ctx.fixtures.delete(key);
        let details = if response.status == 404 {
            format!("{} {} was already gone", label, id)
        } else {
            format!("Deleted {} {}", label, id)
        };
        return Ok(TestResponse::passed(details).with_exchange(&response));
    }

    Ok(TestResponse::from_api(&response, ""))
}
