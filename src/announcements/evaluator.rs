//! Sequential short-circuit search for the first eligible rule.
//!
//! Rules are tried strictly one at a time in the configured order. A rule is
//! skipped without running its check when it is unknown to the registry or
//! currently dismissed. The first check to answer `true` ends the walk. A
//! failing, panicking, or timed-out check counts as "not eligible".

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RuleError;

use super::dismissal::DismissRecorder;
use super::model::RuleIdentifier;
use super::rule::{AnnouncementRule, RuleRegistry};

/// Result of one walk.
pub enum Evaluation {
    Winner(Arc<dyn AnnouncementRule>),
    NoWinner,
    Cancelled,
}

impl Evaluation {
    pub fn winner_id(&self) -> Option<&RuleIdentifier> {
        match self {
            Self::Winner(rule) => Some(rule.identifier()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Winner(rule) => f.debug_tuple("Winner").field(rule.identifier()).finish(),
            Self::NoWinner => f.write_str("NoWinner"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Walks an evaluation order against the registry and dismissal records.
pub struct Evaluator {
    registry: Arc<RuleRegistry>,
    dismissals: Arc<DismissRecorder>,
    rule_timeout: Option<Duration>,
}

impl Evaluator {
    pub fn new(
        registry: Arc<RuleRegistry>,
        dismissals: Arc<DismissRecorder>,
        rule_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            dismissals,
            rule_timeout,
        }
    }

    /// Find the first rule in `order` that is registered, not dismissed, and
    /// eligible.
    ///
    /// Cancellation is checked before every step and raced against every
    /// await; a check that answers `true` after cancellation is discarded.
    pub async fn first_eligible(
        &self,
        order: &[RuleIdentifier],
        cancel: &CancellationToken,
    ) -> Evaluation {
        for id in order {
            if cancel.is_cancelled() {
                return Evaluation::Cancelled;
            }

            let Some(rule) = self.registry.get(id) else {
                debug!(rule = %id, "Skipping unknown announcement rule");
                continue;
            };

            let dismissed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Evaluation::Cancelled,
                dismissed = self.dismissals.is_dismissed(id) => dismissed,
            };
            if dismissed {
                debug!(rule = %id, "Skipping dismissed announcement");
                continue;
            }

            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Evaluation::Cancelled,
                answer = self.check(rule.as_ref()) => answer,
            };

            match answer {
                Ok(true) if cancel.is_cancelled() => return Evaluation::Cancelled,
                Ok(true) => {
                    debug!(rule = %id, "Announcement eligible");
                    return Evaluation::Winner(rule);
                }
                Ok(false) => debug!(rule = %id, "Announcement not eligible"),
                Err(e) => warn!(rule = %id, error = %e, "Eligibility check failed, skipping"),
            }
        }

        Evaluation::NoWinner
    }

    async fn check(&self, rule: &dyn AnnouncementRule) -> Result<bool, RuleError> {
        let guarded = AssertUnwindSafe(rule.should_show())
            .catch_unwind()
            .map(|outcome| {
                outcome.unwrap_or_else(|_| {
                    Err(RuleError::Panicked {
                        rule: rule.identifier().to_string(),
                    })
                })
            });

        match self.rule_timeout {
            Some(timeout) => tokio::time::timeout(timeout, guarded)
                .await
                .unwrap_or_else(|_| {
                    Err(RuleError::Timeout {
                        rule: rule.identifier().to_string(),
                        timeout,
                    })
                }),
            None => guarded.await,
        }
    }
}
