//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Seconds in one day; remote intervals are expressed in days.
pub const SECS_PER_DAY: u64 = 86_400;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Location of the dismissal database.
    pub db_path: PathBuf,
    /// Dismissal window in force until the first successful remote fetch.
    pub default_window: Duration,
    /// Upper bound on a single rule's eligibility check (`None` = unbounded).
    pub rule_timeout: Option<Duration>,
    /// Remote-config key holding the announcement order document.
    pub remote_config_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/announcements.db"),
            default_window: Duration::from_secs(7 * SECS_PER_DAY), // 1 week
            rule_timeout: Some(Duration::from_secs(10)),
            remote_config_key: "announcements".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from `ANNOUNCE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("ANNOUNCE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let default_window = match std::env::var("ANNOUNCE_DEFAULT_WINDOW_DAYS") {
            Ok(raw) => Duration::from_secs(parse_u64("ANNOUNCE_DEFAULT_WINDOW_DAYS", &raw)? * SECS_PER_DAY),
            Err(_) => defaults.default_window,
        };

        let rule_timeout = match std::env::var("ANNOUNCE_RULE_TIMEOUT_SECS") {
            Ok(raw) => match parse_u64("ANNOUNCE_RULE_TIMEOUT_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            Err(_) => defaults.rule_timeout,
        };

        let remote_config_key = std::env::var("ANNOUNCE_REMOTE_CONFIG_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.remote_config_key);

        Ok(Self {
            db_path,
            default_window,
            rule_timeout,
            remote_config_key,
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}
