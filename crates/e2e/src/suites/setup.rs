//! Connectivity and authentication

use crate::client::ApiRequest;
use crate::context::TestContext;
use crate::definition::{TestDefinition, TestResponse};

use super::SETUP;

pub fn tests() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new("setup-health", "API Health", SETUP, |ctx| Box::pin(health(ctx)))
            .description("The API answers its health endpoint without credentials"),
        TestDefinition::new("setup-login", "Login", SETUP, |ctx| Box::pin(login(ctx)))
            .depends_on(["setup-health"]),
        TestDefinition::new("setup-current-user", "Current User", SETUP, |ctx| {
            Box::pin(current_user(ctx))
        })
        .depends_on(["setup-login"]),
        TestDefinition::new("setup-rejects-anonymous", "Reject Anonymous Access", SETUP, |ctx| {
            Box::pin(rejects_anonymous(ctx))
        })
        .depends_on(["setup-health"]),
    ]
}

async fn health(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.send(ApiRequest::get("/api/health").anonymous()).await?;
    Ok(TestResponse::from_api(&response, format!("API reachable at {}", ctx.client().base_url())))
}

async fn login(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.login().await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }
    if !ctx.session.is_authenticated() {
        return Ok(TestResponse::failed("login response carried no token").with_exchange(&response));
    }

    let details = match &ctx.session.user_id {
        Some(id) => format!("Authenticated as {} (user {})", ctx.session.email, id),
        None => format!("Authenticated as {}", ctx.session.email),
    };
    Ok(TestResponse::from_api(&response, details))
}

async fn current_user(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.get("/api/auth/me").await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    let Some(id) = response.id() else {
        return Ok(TestResponse::failed("current user has no id").with_exchange(&response));
    };
    if ctx.session.user_id.is_none() {
        ctx.session.user_id = Some(id.clone());
    }

    let email = response
        .field("email")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let outcome = if email.is_empty() || email.eq_ignore_ascii_case(&ctx.session.email) {
        TestResponse::passed(format!("Current user {}", id))
    } else {
        TestResponse::failed(format!(
            "current user is {}, expected {}",
            email, ctx.session.email
        ))
    };
    Ok(outcome.with_exchange(&response))
}

async fn rejects_anonymous(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let response = ctx.send(ApiRequest::get("/api/contacts").anonymous()).await?;
    Ok(TestResponse::expect_status(&response, 401, "Anonymous request rejected"))
}
