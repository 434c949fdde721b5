//! HTTP client for the API under test
//!
//! Every call is captured as a masked [`RequestData`]/[`ResponseData`] pair.
//! Non-2xx replies are returned as `Ok` with `error` set; only transport
//! failures are errors. A transport failure still leaves an [`Exchange`]
//! holding the request.

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use fieldcheck_common::{
    format_response_size, mask_host, Body, FixtureValue, Headers, RequestData, ResponseData,
    SessionCredentials,
};

use crate::config::ApiConfig;
use crate::error::{HarnessError, HarnessResult};

const USER_AGENT_VALUE: &str = concat!("fieldcheck/", env!("CARGO_PKG_VERSION"));

/// Header carrying the tenant of a multi-tenant deployment
pub const TENANT_HEADER: &str = "X-Tenant-Id";

const REDACTED_PASSWORD: &str = "[REDACTED]";

/// A request to send through [`ApiClient::call`]
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Attach the session bearer token and allow a refresh on 401
    pub authenticated: bool,
    /// Body written to the capture instead of `body`
    redacted_body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
            redacted_body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Send without the bearer token
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// One HTTP round-trip as it appears in reports. `response` is absent when
/// the request never got an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub request: RequestData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseData>,
    /// Transport failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one API call (after any refresh and retry)
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Parsed JSON body, if the body was JSON
    pub data: Option<Value>,
    pub status: u16,
    pub error: Option<String>,
    /// Raw body length formatted as kilobytes
    pub response_size: String,
    pub request_data: RequestData,
    pub response_data: ResponseData,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Look up a top-level field, falling back to a `data` envelope
    pub fn field(&self, name: &str) -> Option<&Value> {
        let data = self.data.as_ref()?;
        data.get(name)
            .or_else(|| data.get("data").and_then(|inner| inner.get(name)))
            .filter(|v| !v.is_null())
    }

    /// Backend id of a created or fetched entity
    pub fn id(&self) -> Option<FixtureValue> {
        self.field("id").and_then(FixtureValue::from_json)
    }

    /// Items of a list response: a bare array or one wrapped in `items`/`data`
    pub fn items(&self) -> Option<&Vec<Value>> {
        let data = self.data.as_ref()?;
        data.as_array()
            .or_else(|| data.get("items").and_then(Value::as_array))
            .or_else(|| data.get("data").and_then(Value::as_array))
    }
}

/// Client for the API under test
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tenant: Option<String>,
    login_path: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> HarnessResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant: config.tenant.clone().filter(|t| !t.is_empty()),
            login_path: config.login_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request. On 401 with stored credentials, logs in once and
    /// retries the original request once.
    pub async fn call(
        &self,
        session: &mut SessionCredentials,
        request: ApiRequest,
    ) -> HarnessResult<ApiResponse> {
        self.call_recorded(session, request, &mut Vec::new()).await
    }

    /// Like [`ApiClient::call`], appending every round-trip made (original
    /// request, login, retry) to `exchanges`
    pub async fn call_recorded(
        &self,
        session: &mut SessionCredentials,
        request: ApiRequest,
        exchanges: &mut Vec<Exchange>,
    ) -> HarnessResult<ApiResponse> {
        let response = self.send_once(session, &request, exchanges).await?;

        if response.status != StatusCode::UNAUTHORIZED.as_u16()
            || !request.authenticated
            || !session.can_login()
        {
            return Ok(response);
        }

        warn!(path = %request.path, "received 401, refreshing session token");
        match self.login_recorded(session, exchanges).await {
            Ok(login) if login.is_success() && session.is_authenticated() => {
                self.send_once(session, &request, exchanges).await
            }
            Ok(login) => {
                warn!(status = login.status, "token refresh rejected");
                Ok(response)
            }
            Err(e) => {
                warn!(error = ?e, "token refresh failed");
                Ok(response)
            }
        }
    }

    /// Authenticate with the session's email and password, storing the token
    /// and user id on success
    pub async fn login(&self, session: &mut SessionCredentials) -> HarnessResult<ApiResponse> {
        self.login_recorded(session, &mut Vec::new()).await
    }

    pub async fn login_recorded(
        &self,
        session: &mut SessionCredentials,
        exchanges: &mut Vec<Exchange>,
    ) -> HarnessResult<ApiResponse> {
        if !session.can_login() {
            return Err(HarnessError::Authentication(
                "no credentials configured".to_string(),
            ));
        }

        let body = serde_json::json!({
            "email": session.email,
            "password": session.password,
        });
        let mut request = ApiRequest::post(self.login_path.clone(), body).anonymous();
        // The password never leaves the process through a report or curl export
        request.redacted_body = Some(serde_json::json!({
            "email": session.email,
            "password": REDACTED_PASSWORD,
        }));
        let response = self.send_once(session, &request, exchanges).await?;

        if response.is_success() {
            let token = ["token", "accessToken", "access_token"]
                .iter()
                .find_map(|k| response.field(k).and_then(Value::as_str))
                .map(str::to_string);
            if token.is_none() {
                warn!("login succeeded but no token was returned");
            }
            session.token = token;
            session.user_id = response
                .field("userId")
                .or_else(|| response.field("user").and_then(|u| u.get("id")))
                .and_then(FixtureValue::from_json);
        } else {
            session.sign_out();
        }

        Ok(response)
    }

    async fn send_once(
        &self,
        session: &SessionCredentials,
        request: &ApiRequest,
        exchanges: &mut Vec<Exchange>,
    ) -> HarnessResult<ApiResponse> {
        let url = self.build_url(request)?;

        let mut headers = Headers::new();
        headers.insert("Accept", "application/json");
        if request.body.is_some() {
            headers.insert("Content-Type", "application/json");
        }
        if let Some(tenant) = &self.tenant {
            headers.insert(TENANT_HEADER, tenant.clone());
        }
        if request.authenticated {
            if let Some(token) = &session.token {
                headers.insert("Authorization", format!("Bearer {}", token));
            }
        }

        let payload = match &request.body {
            Some(body) => Some(serde_json::to_vec(body)?),
            None => None,
        };

        let mut builder = self.http.request(request.method.clone(), url.as_str());
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(bytes) = &payload {
            builder = builder.body(bytes.clone());
        }

        let request_data = RequestData {
            method: request.method.as_str().to_string(),
            url: url.to_string(),
            headers: headers.masked(),
            body: request
                .redacted_body
                .as_ref()
                .or(request.body.as_ref())
                .cloned()
                .map(Body::Json),
        };

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %request.method, path = %request.path, error = %e, "request failed");
                exchanges.push(Exchange {
                    request: request_data,
                    response: None,
                    error: Some(e.to_string()),
                });
                return Err(e.into());
            }
        };
        let status = response.status();
        let response_headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let raw = match response.bytes().await {
            Ok(raw) => raw,
            Err(e) => {
                exchanges.push(Exchange {
                    request: request_data,
                    response: None,
                    error: Some(e.to_string()),
                });
                return Err(e.into());
            }
        };

        let body = if raw.is_empty() {
            None
        } else {
            Some(Body::from_bytes(&raw))
        };
        let data = body.as_ref().and_then(Body::as_json).cloned();
        let error = if status.is_success() {
            None
        } else {
            Some(error_message(status, body.as_ref()))
        };

        debug!(
            method = %request.method,
            url = %mask_host(url.as_str()).unwrap_or_default(),
            status = status.as_u16(),
            bytes = raw.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api call"
        );

        let response_data = ResponseData {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response_headers.masked(),
            body,
        };
        exchanges.push(Exchange {
            request: request_data.clone(),
            response: Some(response_data.clone()),
            error: None,
        });

        Ok(ApiResponse {
            data,
            status: status.as_u16(),
            error,
            response_size: format_response_size(raw.len()),
            request_data,
            response_data,
        })
    }

    fn build_url(&self, request: &ApiRequest) -> HarnessResult<reqwest::Url> {
        let raw = self.url(&request.path);
        let mut url = reqwest::Url::parse(&raw).map_err(|e| {
            HarnessError::InvalidConfig(format!("invalid request URL '{}': {}", raw, e))
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

/// Human-readable error for a non-2xx reply
fn error_message(status: StatusCode, body: Option<&Body>) -> String {
    let detail = match body {
        Some(Body::Json(value)) => ["message", "error", "title", "detail"]
            .iter()
            .find_map(|k| value.get(k).and_then(Value::as_str))
            .map(str::to_string),
        Some(Body::Text(text)) if !text.trim().is_empty() => {
            Some(text.chars().take(200).collect())
        }
        _ => None,
    };

    let reason = status.canonical_reason().unwrap_or("Unknown");
    match detail {
        Some(detail) => format!("HTTP {} {}: {}", status.as_u16(), reason, detail),
        None => format!("HTTP {} {}", status.as_u16(), reason),
    }
}
