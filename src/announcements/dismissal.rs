//! Dismissal records: per-rule, persisted, evaluated against a shared window.
//!
//! Every entry is compared against the *current* window, so a new window from
//! remote config widens or narrows all existing dismissals at once. Stored
//! timestamps are never rewritten when the window changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::DatabaseError;
use crate::store::KeyValueStore;

use super::model::RuleIdentifier;

/// Dismissal state of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissalEntry {
    pub rule_id: RuleIdentifier,
    pub dismissed_at: Option<DateTime<Utc>>,
    /// Set by one-time dismissals; ignores the window.
    pub dismissed_forever: bool,
}

impl DismissalEntry {
    /// A never-dismissed entry.
    pub fn fresh(rule_id: RuleIdentifier) -> Self {
        Self {
            rule_id,
            dismissed_at: None,
            dismissed_forever: false,
        }
    }

    /// Whether the entry suppresses its rule at `now` under `window`.
    ///
    /// A periodic dismissal at `T` holds for `[T, T + window)`.
    pub fn is_dismissed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.dismissed_forever {
            return true;
        }
        let Some(at) = self.dismissed_at else {
            return false;
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(at) < window
    }
}

/// Persisted form of an entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDismissal {
    dismissed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    forever: bool,
}

impl StoredDismissal {
    fn into_entry(self, rule_id: RuleIdentifier) -> DismissalEntry {
        DismissalEntry {
            rule_id,
            dismissed_at: self.dismissed_at,
            dismissed_forever: self.forever,
        }
    }
}

/// Records and answers rule dismissals.
///
/// Entries are loaded lazily and cached. The cache is only updated after the
/// backing write succeeds.
pub struct DismissRecorder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    window_millis: AtomicU64,
    entries: RwLock<HashMap<RuleIdentifier, DismissalEntry>>,
}

impl DismissRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window_millis: AtomicU64::new(duration_to_millis(window)),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the process-wide dismissal window. Last call wins.
    pub fn set_window(&self, window: Duration) {
        let millis = duration_to_millis(window);
        let previous = self.window_millis.swap(millis, Ordering::SeqCst);
        if previous != millis {
            debug!(
                previous_ms = previous,
                window_ms = millis,
                "Dismissal window reconfigured"
            );
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_millis.load(Ordering::SeqCst))
    }

    /// Current time according to the recorder's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Load the entry for `rule_id`, or a fresh one. Never fails: read errors
    /// are logged and yield an uncached fresh entry.
    pub async fn get(&self, rule_id: &RuleIdentifier) -> DismissalEntry {
        if let Some(entry) = self.entries.read().await.get(rule_id) {
            return entry.clone();
        }

        let loaded = match self.store.get_value(rule_id.as_str()).await {
            Ok(Some(value)) => match serde_json::from_value::<StoredDismissal>(value) {
                Ok(stored) => stored.into_entry(rule_id.clone()),
                Err(e) => {
                    warn!(rule = %rule_id, error = %e, "Unreadable dismissal record, treating as fresh");
                    DismissalEntry::fresh(rule_id.clone())
                }
            },
            Ok(None) => DismissalEntry::fresh(rule_id.clone()),
            Err(e) => {
                warn!(rule = %rule_id, error = %e, "Failed to load dismissal record");
                return DismissalEntry::fresh(rule_id.clone());
            }
        };

        // A concurrent dismiss may have landed first; keep the newer entry.
        self.entries
            .write()
            .await
            .entry(rule_id.clone())
            .or_insert(loaded)
            .clone()
    }

    /// Whether `rule_id` is currently suppressed.
    pub async fn is_dismissed(&self, rule_id: &RuleIdentifier) -> bool {
        let entry = self.get(rule_id).await;
        entry.is_dismissed(self.clock.now(), self.window())
    }

    /// Record a periodic dismissal at the current time.
    pub async fn dismiss(&self, rule_id: &RuleIdentifier) -> Result<(), DatabaseError> {
        let current = self.get(rule_id).await;
        let entry = DismissalEntry {
            dismissed_at: Some(self.clock.now()),
            ..current
        };
        self.persist(entry).await?;
        info!(rule = %rule_id, "Announcement dismissed");
        Ok(())
    }

    /// Record a permanent dismissal.
    pub async fn dismiss_forever(&self, rule_id: &RuleIdentifier) -> Result<(), DatabaseError> {
        let entry = DismissalEntry {
            rule_id: rule_id.clone(),
            dismissed_at: Some(self.clock.now()),
            dismissed_forever: true,
        };
        self.persist(entry).await?;
        info!(rule = %rule_id, "Announcement dismissed permanently");
        Ok(())
    }

    /// Forget any dismissal of `rule_id`.
    pub async fn undismiss(&self, rule_id: &RuleIdentifier) -> Result<(), DatabaseError> {
        self.store.delete_value(rule_id.as_str()).await?;
        self.entries
            .write()
            .await
            .insert(rule_id.clone(), DismissalEntry::fresh(rule_id.clone()));
        debug!(rule = %rule_id, "Dismissal cleared");
        Ok(())
    }

    async fn persist(&self, entry: DismissalEntry) -> Result<(), DatabaseError> {
        let stored = StoredDismissal {
            dismissed_at: entry.dismissed_at,
            forever: entry.dismissed_forever,
        };
        let value = serde_json::to_value(&stored)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.store.set_value(entry.rule_id.as_str(), &value).await?;
        self.entries
            .write()
            .await
            .insert(entry.rule_id.clone(), entry);
        Ok(())
    }
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;

    const DAY: Duration = Duration::from_secs(86_400);

    fn recorder(window: Duration) -> (DismissRecorder, MockClock, Arc<MemoryStore>) {
        let clock = MockClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new());
        let recorder = DismissRecorder::new(store.clone(), Arc::new(clock.clone()), window);
        (recorder, clock, store)
    }

    fn id(s: &str) -> RuleIdentifier {
        RuleIdentifier::new(s)
    }

    #[test]
    fn window_boundary_is_half_open() {
        let t = Utc::now();
        let entry = DismissalEntry {
            rule_id: id("a"),
            dismissed_at: Some(t),
            dismissed_forever: false,
        };
        let window = Duration::from_secs(60);

        assert!(entry.is_dismissed(t, window));
        assert!(entry.is_dismissed(t + chrono::Duration::seconds(59), window));
        assert!(!entry.is_dismissed(t + chrono::Duration::seconds(60), window));
        assert!(!entry.is_dismissed(t + chrono::Duration::days(3), window));
    }

    #[test]
    fn fresh_entry_is_never_dismissed() {
        let entry = DismissalEntry::fresh(id("a"));
        assert!(!entry.is_dismissed(Utc::now(), Duration::MAX));
    }

    #[tokio::test]
    async fn seven_day_window() {
        let (recorder, clock, _) = recorder(7 * DAY);
        let a = id("a");

        recorder.dismiss(&a).await.unwrap();
        clock.advance(chrono::Duration::days(6));
        assert!(recorder.is_dismissed(&a).await);

        clock.advance(chrono::Duration::days(2));
        assert!(!recorder.is_dismissed(&a).await);
    }

    #[tokio::test]
    async fn dismiss_is_idempotent() {
        let (recorder, clock, _) = recorder(DAY);
        let a = id("a");

        recorder.dismiss(&a).await.unwrap();
        let once = recorder.is_dismissed(&a).await;
        recorder.dismiss(&a).await.unwrap();
        assert_eq!(recorder.is_dismissed(&a).await, once);

        clock.advance(chrono::Duration::hours(25));
        assert!(!recorder.is_dismissed(&a).await);
    }

    #[tokio::test]
    async fn window_change_applies_retroactively() {
        let (recorder, clock, _) = recorder(7 * DAY);
        let a = id("a");

        recorder.dismiss(&a).await.unwrap();
        clock.advance(chrono::Duration::days(3));
        assert!(recorder.is_dismissed(&a).await);

        recorder.set_window(2 * DAY);
        assert!(!recorder.is_dismissed(&a).await);

        recorder.set_window(30 * DAY);
        assert!(recorder.is_dismissed(&a).await);
        assert_eq!(recorder.window(), 30 * DAY);
    }

    #[tokio::test]
    async fn dismissal_survives_new_recorder_on_same_store() {
        let (recorder, clock, store) = recorder(7 * DAY);
        let a = id("a");
        recorder.dismiss(&a).await.unwrap();

        let reopened = DismissRecorder::new(store, Arc::new(clock.clone()), 7 * DAY);
        let entry = reopened.get(&a).await;
        assert_eq!(entry.dismissed_at, Some(clock.now()));
        assert!(reopened.is_dismissed(&a).await);
    }

    #[tokio::test]
    async fn forever_ignores_window() {
        let (recorder, clock, _) = recorder(DAY);
        let a = id("a");

        recorder.dismiss_forever(&a).await.unwrap();
        clock.advance(chrono::Duration::days(365));
        assert!(recorder.is_dismissed(&a).await);

        recorder.undismiss(&a).await.unwrap();
        assert!(!recorder.is_dismissed(&a).await);
    }

    #[tokio::test]
    async fn failed_write_is_reported_and_not_cached() {
        let (recorder, _, store) = recorder(DAY);
        let a = id("a");
        store.set_fail_writes(true);

        assert!(recorder.dismiss(&a).await.is_err());
        assert!(!recorder.is_dismissed(&a).await);
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_fresh() {
        let (recorder, _, store) = recorder(DAY);
        store
            .set_value("a", &serde_json::json!("not an object"))
            .await
            .unwrap();

        let entry = recorder.get(&id("a")).await;
        assert_eq!(entry, DismissalEntry::fresh(id("a")));
    }
}
