//! Wire-level capture of HTTP exchanges
//!
//! Every request a test body makes is recorded as a [`RequestData`] and its
//! reply as a [`ResponseData`]. Secret headers are redacted at capture time,
//! so a capture can be logged, written to a report, or rendered as a curl
//! command without leaking credentials.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Replacement for the value of any secret header
pub const REDACTED_SECRET: &str = "Bearer [REDACTED]";

/// Host substituted for the real API host in curl exports
pub const MASKED_HOST: &str = "https://api.example.invalid";

const SECRET_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Whether a header carries a credential that must never be written out
pub fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}

/// Ordered header list. Insertion order is preserved for curl export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing an existing one with the same name (case-insensitive)
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with every secret header value replaced by [`REDACTED_SECRET`]
    pub fn masked(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(n, v)| {
                    if is_secret_header(n) {
                        (n.clone(), REDACTED_SECRET.to_string())
                    } else {
                        (n.clone(), v.clone())
                    }
                })
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> std::result::Result<Headers, M::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// A captured body, parsed when possible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "content", rename_all = "snake_case")]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
    /// Non UTF-8 payload, base64 encoded
    Base64(String),
}

impl Body {
    /// Classify raw bytes: JSON if it parses, text if UTF-8, base64 otherwise
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::from_text(text),
            Err(_) => Body::Base64(BASE64.encode(bytes)),
        }
    }

    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(text.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes exactly as they went over the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Body::Json(v) => Ok(serde_json::to_vec(v)?),
            Body::Text(s) => Ok(s.as_bytes().to_vec()),
            Body::Base64(b) => Ok(BASE64.decode(b)?),
        }
    }
}

/// An outgoing request as sent by the API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl RequestData {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Copy safe to persist: secret header values are redacted
    pub fn masked(&self) -> Self {
        Self {
            headers: self.headers.masked(),
            ..self.clone()
        }
    }

    pub fn to_curl(&self) -> Result<String> {
        to_curl(self)
    }
}

/// A response as received by the API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub status: u16,
    pub status_text: String,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl ResponseData {
    pub fn masked(&self) -> Self {
        Self {
            headers: self.headers.masked(),
            ..self.clone()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Format a raw body length as kilobytes with two decimals, e.g. `1.00 KB`
pub fn format_response_size(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Replace scheme, host and port with [`MASKED_HOST`], keeping path and query.
///
/// Relative URLs are treated as paths.
pub fn mask_host(raw: &str) -> Result<String> {
    let parsed = match url::Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = raw.trim_start_matches('/');
            return Ok(format!("{}/{}", MASKED_HOST, path));
        }
        Err(e) => {
            return Err(Error::InvalidUrl {
                url: raw.to_string(),
                reason: e.to_string(),
            })
        }
    };

    let mut masked = format!("{}{}", MASKED_HOST, parsed.path());
    if let Some(query) = parsed.query() {
        masked.push('?');
        masked.push_str(query);
    }
    Ok(masked)
}

/// Quote for a POSIX shell using single quotes
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render a captured request as a copy-pasteable curl command.
///
/// Host and secret headers are masked. Headers keep their captured order.
/// JSON bodies are emitted compact, exactly as the client serializes them;
/// binary bodies are piped through `base64 -d`.
pub fn to_curl(request: &RequestData) -> Result<String> {
    let url = mask_host(&request.url)?;
    let mut parts = vec![format!("curl -X {} {}", request.method, shell_quote(&url))];

    for (name, value) in request.headers.iter() {
        let value = if is_secret_header(name) { REDACTED_SECRET } else { value };
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", name, value))));
    }

    let mut prefix = String::new();
    match &request.body {
        Some(Body::Json(value)) => {
            let encoded = serde_json::to_string(value)?;
            parts.push(format!("-d {}", shell_quote(&encoded)));
        }
        Some(Body::Text(text)) => {
            parts.push(format!("-d {}", shell_quote(text)));
        }
        Some(Body::Base64(encoded)) => {
            prefix = format!("printf '%s' {} | base64 -d | ", shell_quote(encoded));
            parts.push("--data-binary @-".to_string());
        }
        None => {}
    }

    Ok(format!("{}{}", prefix, parts.join(" \\\n  ")))
}
