//! Shared fixture state
//!
//! Backend-assigned identifiers created by earlier tests and consumed by
//! later ones, plus the single authenticated identity used for a run.
//!
//! The store has no internal locking. It lives inside a run context that is
//! handed to one test body at a time, so access is serialized by the engine.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A backend identifier: either numeric or textual.
///
/// `Number(0)` is a legal id and is never treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureValue {
    Number(i64),
    Text(String),
}

impl FixtureValue {
    /// Extract an id from a JSON value, accepting integers and strings
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(FixtureValue::Number),
            serde_json::Value::String(s) if !s.is_empty() => Some(FixtureValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FixtureValue::Number(n) => Some(*n),
            FixtureValue::Text(s) => s.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FixtureValue::Number(_) => None,
            FixtureValue::Text(s) => Some(s),
        }
    }

    /// Render the value as JSON, preserving its type
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FixtureValue::Number(n) => serde_json::Value::from(*n),
            FixtureValue::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for FixtureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureValue::Number(n) => write!(f, "{}", n),
            FixtureValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FixtureValue {
    fn from(n: i64) -> Self {
        FixtureValue::Number(n)
    }
}

impl From<i32> for FixtureValue {
    fn from(n: i32) -> Self {
        FixtureValue::Number(n.into())
    }
}

impl From<&str> for FixtureValue {
    fn from(s: &str) -> Self {
        FixtureValue::Text(s.to_string())
    }
}

impl From<String> for FixtureValue {
    fn from(s: String) -> Self {
        FixtureValue::Text(s)
    }
}

/// Flat, un-namespaced map from logical key to backend id.
///
/// Last writer wins on key collisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureStore {
    ids: HashMap<String, FixtureValue>,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an id, returning the previous value under the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FixtureValue>) -> Option<FixtureValue> {
        let key = key.into();
        let value = value.into();
        tracing::debug!(key = %key, value = %value, "fixture set");
        self.ids.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&FixtureValue> {
        self.ids.get(key)
    }

    /// Like [`get`](Self::get) but an absent key is an error
    pub fn require(&self, key: &str) -> Result<&FixtureValue> {
        self.ids
            .get(key)
            .ok_or_else(|| Error::FixtureMissing(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<FixtureValue> {
        let removed = self.ids.remove(key);
        if removed.is_some() {
            tracing::debug!(key = %key, "fixture deleted");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.ids.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// The one authenticated identity used for an entire run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    pub user_id: Option<FixtureValue>,
}

impl SessionCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            token: None,
            user_id: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Whether a fresh login can be attempted
    pub fn can_login(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }

    /// Drop the token and user id, keeping the login identity
    pub fn sign_out(&mut self) {
        self.token = None;
        self.user_id = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
