//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fieldcheck_common::SessionCredentials;

use crate::error::{HarnessError, HarnessResult};
use crate::runner::RunnerConfig;

pub const ENV_API_URL: &str = "FIELDCHECK_API_URL";
pub const ENV_TENANT: &str = "FIELDCHECK_TENANT";
pub const ENV_EMAIL: &str = "FIELDCHECK_EMAIL";
pub const ENV_PASSWORD: &str = "FIELDCHECK_PASSWORD";

/// Top-level configuration, usually read from `fieldcheck.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// API under test
    pub api: ApiConfig,

    /// Identity used for the whole run
    pub credentials: CredentialsConfig,

    /// Engine behaviour
    pub run: RunnerConfig,
}

/// Connection settings for the API under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Tenant sent as `X-Tenant-Id` when set
    pub tenant: Option<String>,

    /// Per HTTP call timeout
    pub timeout_secs: u64,

    /// Login endpoint, also used to refresh an expired token
    pub login_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            tenant: None,
            timeout_secs: 30,
            login_path: "/api/auth/login".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub email: String,
    pub password: String,
}

impl CredentialsConfig {
    pub fn to_session(&self) -> SessionCredentials {
        SessionCredentials::new(self.email.clone(), self.password.clone())
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            debug!(path = %path.display(), "loading configuration");
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `FIELDCHECK_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(tenant) = lookup(ENV_TENANT) {
            self.api.tenant = Some(tenant).filter(|t| !t.is_empty());
        }
        if let Some(email) = lookup(ENV_EMAIL) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
    }

    pub fn validate(&self) -> HarnessResult<()> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(HarnessError::InvalidConfig(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.run.test_timeout_secs == Some(0) {
            return Err(HarnessError::InvalidConfig(
                "run.test_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.run.output_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_URL, "https://crm.test"),
            (ENV_TENANT, ""),
            (ENV_EMAIL, "qa@crm.test"),
        ]
        .into_iter()
        .collect();

        let mut config = HarnessConfig::default();
        config.api.tenant = Some("acme".into());
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://crm.test");
        assert_eq!(config.api.tenant, None);
        assert_eq!(config.credentials.email, "qa@crm.test");
        assert_eq!(config.credentials.password, "");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        config.api.base_url = "crm.test".into();
        assert!(matches!(config.validate(), Err(HarnessError::InvalidConfig(_))));
    }
}
