//! Per-run context handed to every test body

use serde_json::Value;

use fieldcheck_common::{FixtureStore, SessionCredentials};

use crate::client::{ApiClient, ApiRequest, ApiResponse, Exchange};
use crate::config::HarnessConfig;
use crate::error::HarnessResult;

/// Mutable state shared by the tests of one run.
///
/// Exactly one test body holds `&mut TestContext` at a time; the engine never
/// runs two bodies concurrently, so the fixture store needs no lock.
#[derive(Debug)]
pub struct TestContext {
    /// Backend ids created by earlier tests
    pub fixtures: FixtureStore,

    /// The authenticated identity for this run
    pub session: SessionCredentials,

    client: ApiClient,
    initial_session: SessionCredentials,
    run_id: String,
    exchanges: Vec<Exchange>,
}

impl TestContext {
    pub fn new(client: ApiClient, session: SessionCredentials) -> Self {
        Self {
            fixtures: FixtureStore::new(),
            initial_session: session.clone(),
            session,
            client,
            run_id: new_run_id(),
            exchanges: Vec::new(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        let client = ApiClient::new(&config.api)?;
        Ok(Self::new(client, config.credentials.to_session()))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Short identifier of the current run, used to make test data unique
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// `base` suffixed with the run id, e.g. `Test Contact 3f9c1a2b`
    pub fn unique(&self, base: &str) -> String {
        format!("{} {}", base, self.run_id)
    }

    /// Clear fixtures and captured exchanges, restore the configured
    /// credentials and start a new run id
    pub fn reset(&mut self) {
        self.fixtures.clear();
        self.session = self.initial_session.clone();
        self.exchanges.clear();
        self.run_id = new_run_id();
    }

    pub async fn send(&mut self, request: ApiRequest) -> HarnessResult<ApiResponse> {
        self.client
            .call_recorded(&mut self.session, request, &mut self.exchanges)
            .await
    }

    pub async fn get(&mut self, path: impl Into<String>) -> HarnessResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&mut self, path: impl Into<String>, body: Value) -> HarnessResult<ApiResponse> {
        self.send(ApiRequest::post(path, body)).await
    }

    pub async fn put(&mut self, path: impl Into<String>, body: Value) -> HarnessResult<ApiResponse> {
        self.send(ApiRequest::put(path, body)).await
    }

    pub async fn delete(&mut self, path: impl Into<String>) -> HarnessResult<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Log in with the session credentials
    pub async fn login(&mut self) -> HarnessResult<ApiResponse> {
        self.client
            .login_recorded(&mut self.session, &mut self.exchanges)
            .await
    }

    /// Exchanges captured since the current test started
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Exchanges captured since the last call, in order
    pub(crate) fn take_exchanges(&mut self) -> Vec<Exchange> {
        std::mem::take(&mut self.exchanges)
    }
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[test]
    fn test_reset_clears_fixtures_and_restores_credentials() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        let mut ctx = TestContext::new(client, SessionCredentials::new("qa@crm.test", "pw"));
        let first_run = ctx.run_id().to_string();

        ctx.fixtures.set("test-person-1", 12i64);
        ctx.session.token = Some("stale".into());
        ctx.reset();

        assert!(ctx.fixtures.is_empty());
        assert!(ctx.session.token.is_none());
        assert_eq!(ctx.session.email, "qa@crm.test");
        assert_ne!(ctx.run_id(), first_run);
        assert!(ctx.unique("Test Contact").ends_with(ctx.run_id()));
    }
}
