//! Error types for the announcement engine.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors, local and remote.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to fetch remote configuration: {0}")]
    Fetch(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures raised by a single rule's eligibility check.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Eligibility check for {rule} failed: {reason}")]
    EligibilityFailed { rule: String, reason: String },

    #[error("Eligibility check for {rule} timed out after {timeout:?}")]
    Timeout { rule: String, timeout: Duration },

    #[error("Eligibility check for {rule} panicked")]
    Panicked { rule: String },
}

impl RuleError {
    /// Shorthand for an eligibility failure with a displayable cause.
    pub fn failed(rule: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::EligibilityFailed {
            rule: rule.into(),
            reason: reason.to_string(),
        }
    }
}

/// Engine orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Delivery dispatcher has shut down")]
    DispatcherClosed,

    #[error("Failed to start delivery dispatcher: {0}")]
    DispatcherStart(String),

    #[error("Dispatched job panicked")]
    JobPanicked,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_error_display_names_the_rule() {
        let err = RuleError::failed("kyc_incomplete", "profile endpoint returned 500");
        assert_eq!(
            err.to_string(),
            "Eligibility check for kyc_incomplete failed: profile endpoint returned 500"
        );
    }

    #[test]
    fn nested_errors_convert_into_top_level() {
        let err: Error = DatabaseError::Query("boom".into()).into();
        assert!(matches!(err, Error::Database(DatabaseError::Query(_))));
        assert_eq!(err.to_string(), "Database error: Query failed: boom");
    }
}
