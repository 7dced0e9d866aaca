//! Announcement rules and the registry that holds them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::RuleError;

use super::host::AnnouncementHost;
use super::model::{AnnouncementCard, RuleIdentifier};

/// A candidate announcement.
///
/// `should_show` must not have user-visible side effects; it may be skipped
/// entirely when the rule is dismissed or a higher-priority rule wins.
/// `present` runs on the delivery dispatcher, at most once per cycle.
#[async_trait]
pub trait AnnouncementRule: Send + Sync {
    /// Stable identifier; ordering token and dismissal key.
    fn identifier(&self) -> &RuleIdentifier;

    /// Whether the card should be shown right now.
    async fn should_show(&self) -> Result<bool, RuleError>;

    /// Show the card (and optionally trigger host actions).
    fn present(&self, host: &dyn AnnouncementHost);
}

type Predicate = Arc<dyn Fn() -> BoxFuture<'static, Result<bool, RuleError>> + Send + Sync>;

/// Rule built from a card and an async predicate; presenting shows the card.
pub struct PredicateRule {
    card: AnnouncementCard,
    predicate: Predicate,
}

impl PredicateRule {
    pub fn new<F, Fut>(card: AnnouncementCard, predicate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RuleError>> + Send + 'static,
    {
        Self {
            card,
            predicate: Arc::new(move || predicate().boxed()),
        }
    }

    pub fn card(&self) -> &AnnouncementCard {
        &self.card
    }
}

impl std::fmt::Debug for PredicateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRule")
            .field("rule_id", &self.card.rule_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AnnouncementRule for PredicateRule {
    fn identifier(&self) -> &RuleIdentifier {
        &self.card.rule_id
    }

    async fn should_show(&self) -> Result<bool, RuleError> {
        (self.predicate)().await
    }

    fn present(&self, host: &dyn AnnouncementHost) {
        host.show_announcement_card(self.card.clone());
    }
}

/// Every rule the app knows about, keyed by identifier.
///
/// Populated at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<RuleIdentifier, Arc<dyn AnnouncementRule>>,
    /// Registration order, for stable `identifiers()` output.
    registration_order: Vec<RuleIdentifier>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. A duplicate identifier is rejected; the first wins.
    pub fn register(&mut self, rule: Arc<dyn AnnouncementRule>) -> bool {
        let id = rule.identifier().clone();
        if self.rules.contains_key(&id) {
            tracing::warn!(rule = %id, "Rejected duplicate announcement rule");
            return false;
        }
        self.registration_order.push(id.clone());
        self.rules.insert(id.clone(), rule);
        tracing::debug!(rule = %id, "Registered announcement rule");
        true
    }

    /// Builder-style `register`.
    pub fn with(mut self, rule: Arc<dyn AnnouncementRule>) -> Self {
        self.register(rule);
        self
    }

    pub fn get(&self, id: &RuleIdentifier) -> Option<Arc<dyn AnnouncementRule>> {
        self.rules.get(id).cloned()
    }

    pub fn contains(&self, id: &RuleIdentifier) -> bool {
        self.rules.contains_key(id)
    }

    /// All identifiers, in registration order.
    pub fn identifiers(&self) -> Vec<RuleIdentifier> {
        self.registration_order.clone()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcements::testing::RecordingHost;

    fn rule(id: &str, eligible: bool) -> Arc<dyn AnnouncementRule> {
        Arc::new(PredicateRule::new(
            AnnouncementCard::new(id, id, "test card"),
            move || async move { Ok(eligible) },
        ))
    }

    #[test]
    fn register_and_get() {
        let mut registry = RuleRegistry::new();
        assert!(registry.register(rule("a", true)));

        assert!(registry.contains(&"a".into()));
        assert!(registry.get(&"missing".into()).is_none());
        assert_eq!(registry.get(&"a".into()).unwrap().identifier().as_str(), "a");
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut registry = RuleRegistry::new();
        assert!(registry.register(rule("a", true)));
        assert!(!registry.register(rule("a", false)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn identifiers_keep_registration_order() {
        let registry = RuleRegistry::new()
            .with(rule("c", true))
            .with(rule("a", true))
            .with(rule("b", true));

        let ids: Vec<String> = registry
            .identifiers()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn predicate_rule_runs_predicate_each_time() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let rule = PredicateRule::new(AnnouncementCard::new("a", "A", "a"), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(RuleError::failed("a", "offline"))
            }
        });

        assert!(rule.should_show().await.is_err());
        assert!(rule.should_show().await.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn predicate_rule_presents_its_card() {
        let host = RecordingHost::default();
        let rule = PredicateRule::new(AnnouncementCard::new("a", "Title", "Body"), || async {
            Ok(true)
        });

        rule.present(&host);
        let shown = host.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Title");
    }
}
