//! Read-only dashboard endpoints

use crate::context::TestContext;
use crate::definition::{TestDefinition, TestResponse};

use super::DASHBOARD;

pub fn tests() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new("dashboard-stats", "Dashboard Statistics", DASHBOARD, |ctx| {
            Box::pin(stats(ctx))
        })
        .depends_on(["setup-login"]),
        TestDefinition::new("dashboard-activity", "Recent Activity", DASHBOARD, |ctx| {
            Box::pin(activity(ctx))
        })
        .depends_on(["setup-login"]),
    ]
}

async fn stats(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.get("/api/dashboard/stats").await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    let fields = response
        .data
        .as_ref()
        .and_then(|d| d.as_object())
        .map(|o| o.len())
        .unwrap_or(0);
    if fields == 0 {
        return Ok(TestResponse::skipped("dashboard returned no statistics").with_exchange(&response));
    }
    Ok(TestResponse::passed(format!("{} statistic(s)", fields)).with_exchange(&response))
}

async fn activity(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.get("/api/dashboard/recent-activity").await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    Ok(match response.items() {
        Some(items) if items.is_empty() => TestResponse::skipped("no recent activity"),
        Some(items) => TestResponse::passed(format!("{} recent event(s)", items.len())),
        None => TestResponse::failed("recent activity is not a list"),
    }
    .with_exchange(&response))
}
