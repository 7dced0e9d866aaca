//! Remote configuration: where the evaluation order and window come from.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{EngineConfig, SECS_PER_DAY};
use crate::error::ConfigError;

use super::model::{AnnouncementConfig, RuleIdentifier};

/// Supplies the order and dismissal window for one evaluation cycle.
#[async_trait]
pub trait AnnouncementConfigSource: Send + Sync {
    async fn fetch_announcement_config(&self) -> Result<AnnouncementConfig, ConfigError>;
}

/// Raw remote-config client: returns the JSON document stored under a key.
///
/// Caching, transport, and retry belong to the implementation.
#[async_trait]
pub trait RemoteConfig: Send + Sync {
    async fn get_raw_json(&self, key: &str) -> Result<String, ConfigError>;
}

/// Wire shape of the announcements document. `interval` is in days.
#[derive(Debug, Deserialize)]
struct RawAnnouncementConfig {
    order: Vec<String>,
    interval: u64,
}

/// Reads `{"order": [...], "interval": <days>}` from a [`RemoteConfig`] key.
pub struct RemoteConfigAdapter {
    remote: Arc<dyn RemoteConfig>,
    key: String,
}

impl RemoteConfigAdapter {
    pub fn new(remote: Arc<dyn RemoteConfig>, key: impl Into<String>) -> Self {
        Self {
            remote,
            key: key.into(),
        }
    }

    /// Adapter reading the key named by `remote_config_key`.
    pub fn from_config(remote: Arc<dyn RemoteConfig>, config: &EngineConfig) -> Self {
        Self::new(remote, config.remote_config_key.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl AnnouncementConfigSource for RemoteConfigAdapter {
    async fn fetch_announcement_config(&self) -> Result<AnnouncementConfig, ConfigError> {
        let json = self.remote.get_raw_json(&self.key).await?;
        parse_announcement_config(&json)
    }
}

/// Parse the announcements document.
///
/// Blank identifiers are dropped and repeats keep their first position.
pub fn parse_announcement_config(json: &str) -> Result<AnnouncementConfig, ConfigError> {
    let raw: RawAnnouncementConfig =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let interval_secs = raw
        .interval
        .checked_mul(SECS_PER_DAY)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "interval".to_string(),
            message: format!("{} days overflows", raw.interval),
        })?;

    let mut seen = HashSet::new();
    let order = raw
        .order
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .map(RuleIdentifier::from)
        .collect();

    Ok(AnnouncementConfig {
        order,
        interval: Duration::from_secs(interval_secs),
    })
}

/// Serves a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigSource {
    config: AnnouncementConfig,
}

impl StaticConfigSource {
    pub fn new(config: AnnouncementConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AnnouncementConfigSource for StaticConfigSource {
    async fn fetch_announcement_config(&self) -> Result<AnnouncementConfig, ConfigError> {
        Ok(self.config.clone())
    }
}
