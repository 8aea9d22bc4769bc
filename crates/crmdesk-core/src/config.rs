//! Runtime configuration.
//!
//! Read from `crmdesk.toml` (every section optional), then overridden by
//! environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CrmError, CrmResult};
use crate::record::EntityKind;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "crmdesk.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub api: ApiConfig,
    pub redis: RedisConfig,
    pub drafts: DraftConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3030".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub namespace: String,
    pub debounce_ms: u64,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            namespace: "crmdesk".to_string(),
            debounce_ms: 2000,
        }
    }
}

impl DraftConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Namespaced draft slot for an entity, e.g. `crmdesk:lead-draft`.
    pub fn key_for(&self, kind: EntityKind) -> String {
        format!("{}:{}", self.namespace, kind.draft_key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { threshold: 0.4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

impl CrmConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CrmResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> CrmResult<Self> {
        let config: CrmConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, apply environment overrides and validate.
    pub fn resolve(path: &Path) -> CrmResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CRMDESK_API_URL`, `REDIS_URL`, `CRMDESK_DRAFT_DEBOUNCE_MS` and
    /// `CRMDESK_SEARCH_THRESHOLD`. Unparseable numbers are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CRMDESK_API_URL") {
            self.api.base_url = url;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.redis.url = url;
        }
        if let Some(ms) = lookup("CRMDESK_DRAFT_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.drafts.debounce_ms = ms;
        }
        if let Some(t) = lookup("CRMDESK_SEARCH_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.search.threshold = t;
        }
    }

    pub fn validate(&self) -> CrmResult<()> {
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(CrmError::config(format!(
                "search.threshold must be within 0.0..=1.0, got {}",
                self.search.threshold
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(CrmError::config("api.base_url must not be empty"));
        }
        if self.drafts.namespace.trim().is_empty() {
            return Err(CrmError::config("drafts.namespace must not be empty"));
        }
        Ok(())
    }
}
