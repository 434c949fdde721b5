//! ApiClient and built-in suites against a mocked backend.
//!
//! Uses wiremock for HTTP mocking.

use fieldcheck_common::{Body, SessionCredentials, MASKED_HOST, REDACTED_SECRET};
use fieldcheck_e2e::{
    ApiClient, ApiConfig, ApiRequest, Registry, Selection, SuiteReport, TestContext,
    TestDefinition, TestResponse, TestRunner, TestStatus,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        tenant: Some("acme".to_string()),
        ..ApiConfig::default()
    }
}

fn session_with_token(token: &str) -> SessionCredentials {
    let mut session = SessionCredentials::new("qa@crm.test", "secret");
    session.token = Some(token.to_string());
    session
}

#[tokio::test]
async fn test_sends_bearer_and_tenant() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .and(header("authorization", "Bearer abc123"))
        .and(header("x-tenant-id", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let mut session = session_with_token("abc123");
    let response = client
        .call(&mut session, ApiRequest::get("/api/contacts"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.items().map(Vec::len), Some(2));

    let captured = &response.request_data;
    assert_eq!(captured.method, "GET");
    assert_eq!(captured.headers.get("Authorization"), Some(REDACTED_SECRET));
    assert_eq!(captured.headers.get("X-Tenant-Id"), Some("acme"));

    let curl = captured.to_curl().unwrap();
    assert!(!curl.contains("abc123"));
    assert!(curl.contains(MASKED_HOST));
    assert!(!curl.contains(&server.uri()));
}

#[tokio::test]
async fn test_refreshes_expired_token_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "qa@crm.test", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh", "userId": 7})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let mut ctx = TestContext::new(client, session_with_token("stale"));
    let response = ctx.get("/api/articles").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(ctx.session.token.as_deref(), Some("fresh"));
    assert_eq!(ctx.session.user_id.as_ref().and_then(|id| id.as_i64()), Some(7));

    // Rejected call, login, retry
    let exchanges = ctx.exchanges();
    let statuses: Vec<u16> = exchanges
        .iter()
        .map(|e| e.response.as_ref().map_or(0, |r| r.status))
        .collect();
    assert_eq!(statuses, vec![401, 200, 200]);
    assert_eq!(exchanges[1].request.method, "POST");
    assert!(exchanges[1].request.url.ends_with("/api/auth/login"));
    match &exchanges[1].request.body {
        Some(Body::Json(body)) => {
            assert_eq!(body["email"], "qa@crm.test");
            assert_eq!(body["password"], "[REDACTED]");
        }
        other => panic!("unexpected login body: {:?}", other),
    }
    assert_eq!(
        exchanges[0].request.headers.get("Authorization"),
        Some(REDACTED_SECRET)
    );
}

#[tokio::test]
async fn test_unreachable_backend_still_records_the_request() {
    let client = ApiClient::new(&ApiConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..ApiConfig::default()
    })
    .unwrap();
    let mut ctx = TestContext::new(client, session_with_token("abc123"));
    let registry = Registry::from_groups([vec![TestDefinition::new(
        "contact-create",
        "Create contact",
        "contacts",
        |ctx| {
            Box::pin(async move {
                let response = ctx.post("/api/contacts", json!({"name": "Ada"})).await?;
                Ok(TestResponse::from_api(&response, "created"))
            })
        },
    )]]);

    let report = TestRunner::new().run_all(&registry, &mut ctx).await.unwrap();
    let result = report.result("contact-create").unwrap();

    assert_eq!(result.status, TestStatus::Failed);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.starts_with("HTTP error: "), "{}", error);
    assert_eq!(error.matches("error sending request").count(), 1, "{}", error);

    assert_eq!(result.exchanges.len(), 1);
    let exchange = &result.exchanges[0];
    assert!(exchange.response.is_none());
    assert!(exchange.error.is_some());
    assert_eq!(exchange.request.method, "POST");

    let curls = result.curl_commands().unwrap();
    assert_eq!(curls.len(), 1);
    assert!(curls[0].starts_with(&format!("curl -X POST '{}/api/contacts'", MASKED_HOST)));
    assert!(curls[0].contains(r#"-d '{"name":"Ada"}'"#));
    assert!(!curls[0].contains("abc123"));
}

#[tokio::test]
async fn test_persistent_unauthorized_is_returned_after_one_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token revoked"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let mut session = session_with_token("stale");
    let response = client
        .call(&mut session, ApiRequest::get("/api/tasks"))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(
        response.error.as_deref(),
        Some("HTTP 401 Unauthorized: Token revoked")
    );
}

#[tokio::test]
async fn test_error_status_is_not_a_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/contacts/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Contact not found"})))
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let response = client
        .call(&mut session_with_token("abc123"), ApiRequest::delete("/api/contacts/99"))
        .await
        .unwrap();

    assert!(!response.is_success());
    assert_eq!(
        response.error.as_deref(),
        Some("HTTP 404 Not Found: Contact not found")
    );
}

#[tokio::test]
async fn test_response_size_and_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/reports/export"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1024)))
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let response = client
        .call(&mut session_with_token("t"), ApiRequest::get("/api/reports/export"))
        .await
        .unwrap();

    assert_eq!(response.response_size, "1.00 KB");
    assert!(response.data.is_none());
    assert!(matches!(response.response_data.body, Some(Body::Text(ref t)) if t.len() == 1024));
}

#[tokio::test]
async fn test_rejected_login_signs_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})))
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let mut session = session_with_token("old");
    let response = client.login(&mut session).await.unwrap();

    assert_eq!(response.status, 401);
    assert!(!session.is_authenticated());

    let sent = serde_json::to_string(&response.request_data).unwrap();
    assert!(!sent.contains("secret"));
}

#[tokio::test]
async fn test_setup_suite_against_mock_backend() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"token": "session-token", "user": {"id": 7}}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "email": "QA@crm.test"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = ApiClient::new(&config(&server)).unwrap();
    let mut ctx = TestContext::new(client, SessionCredentials::new("qa@crm.test", "secret"));
    let report = TestRunner::new()
        .run(&Registry::standard(), &Selection::categories(["setup"]), &mut ctx)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 4);
    for result in &report.results {
        assert_eq!(result.status, TestStatus::Passed, "{}: {}", result.id, result.message());
    }
    assert_eq!(ctx.session.token.as_deref(), Some("session-token"));

    let dir = tempfile::tempdir().unwrap();
    let written = report.write_json(dir.path()).unwrap();
    let loaded = SuiteReport::read_json(&written).unwrap();
    let curls = loaded.curl_commands("setup-current-user").unwrap();
    assert_eq!(curls.len(), 1);
    assert!(curls[0].contains("/api/auth/me"));
    assert!(!curls[0].contains("session-token"));
}
