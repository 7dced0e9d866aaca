//! Announcement engine: picks and presents at most one card per check.
//!
//! Each `check_latest` runs one session:
//! `Idle → FetchingConfig → Evaluating → (Presenting | Idle)`, with
//! `Cancelled` reachable from every in-flight state. Starting a new session
//! cancels the previous one, so at most one session can reach `Presenting`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;

use super::dismissal::DismissRecorder;
use super::dispatcher::{self, Dispatcher};
use super::evaluator::{Evaluation, Evaluator};
use super::host::AnnouncementHost;
use super::model::{DismissRule, RuleIdentifier};
use super::remote::AnnouncementConfigSource;
use super::rule::RuleRegistry;

/// Lifecycle state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No check in flight.
    Idle,
    /// Waiting on remote config.
    FetchingConfig,
    /// Walking the rule order.
    Evaluating,
    /// Handing the winner to the delivery dispatcher.
    Presenting,
    /// Cancelled; the session is winding down.
    Cancelled,
}

impl EngineState {
    pub fn can_transition_to(&self, target: EngineState) -> bool {
        use EngineState::*;

        matches!(
            (self, target),
            (Idle, FetchingConfig) |
            (FetchingConfig, Evaluating) | (FetchingConfig, Idle) | (FetchingConfig, Cancelled) |
            (Evaluating, Presenting) | (Evaluating, Idle) | (Evaluating, Cancelled) |
            (Presenting, Idle) | (Presenting, Cancelled) |
            (Cancelled, Idle)
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::FetchingConfig | Self::Evaluating | Self::Presenting)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FetchingConfig => "fetching_config",
            Self::Evaluating => "evaluating",
            Self::Presenting => "presenting",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// What a `check_latest` call ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The rule's present-effect ran.
    Shown(RuleIdentifier),
    /// No card this cycle (nothing eligible, or config/delivery failed).
    NotShown,
    /// Cancelled before anything was presented.
    Cancelled,
}

/// Collaborators the engine is built from.
pub struct EngineDeps {
    pub config_source: Arc<dyn AnnouncementConfigSource>,
    pub registry: Arc<RuleRegistry>,
    pub dismissals: Arc<DismissRecorder>,
    pub dispatcher: Dispatcher,
}

struct SessionSlot {
    id: Option<Uuid>,
    token: Option<CancellationToken>,
    state: EngineState,
}

/// Orchestrates config fetch, evaluation, and delivery.
pub struct AnnouncementEngine {
    config_source: Arc<dyn AnnouncementConfigSource>,
    registry: Arc<RuleRegistry>,
    dismissals: Arc<DismissRecorder>,
    evaluator: Evaluator,
    dispatcher: Dispatcher,
    /// Held across the final cancellation check and `present`, and by anyone
    /// cancelling a session. Always taken before `session`.
    present_gate: Arc<Mutex<()>>,
    session: Mutex<SessionSlot>,
}

impl AnnouncementEngine {
    pub fn new(config: &EngineConfig, deps: EngineDeps) -> Self {
        let evaluator = Evaluator::new(
            Arc::clone(&deps.registry),
            Arc::clone(&deps.dismissals),
            config.rule_timeout,
        );
        Self {
            config_source: deps.config_source,
            registry: deps.registry,
            dismissals: deps.dismissals,
            evaluator,
            dispatcher: deps.dispatcher,
            present_gate: Arc::new(Mutex::new(())),
            session: Mutex::new(SessionSlot {
                id: None,
                token: None,
                state: EngineState::Idle,
            }),
        }
    }

    /// Clear the host's card, then pick and present the next announcement.
    ///
    /// Both `dismiss_announcement_card` and `present` run on the dispatcher;
    /// the card is cleared before the config fetch starts. Never fails: every
    /// error is logged and reported as `NotShown`.
    pub async fn check_latest(&self, host: Arc<dyn AnnouncementHost>) -> CheckOutcome {
        let (session, cancel) = self.begin_session();

        let span = info_span!("announcement_check", session = %session);
        let outcome = self.run_session(session, &cancel, host).instrument(span).await;
        self.end_session(session);
        outcome
    }

    /// Fire-and-forget `check_latest`, for app-foreground hooks.
    pub fn spawn_check_latest(
        self: &Arc<Self>,
        host: Arc<dyn AnnouncementHost>,
    ) -> JoinHandle<CheckOutcome> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.check_latest(host).await })
    }

    /// Cancel the in-flight check, if any. No present-effect starts after
    /// this returns; one already running on the dispatcher finishes first.
    pub fn cancel(&self) {
        let _gate = self.lock_present_gate();
        let mut slot = self.lock_session();
        if let Some(token) = slot.token.take() {
            token.cancel();
            if slot.state.can_transition_to(EngineState::Cancelled) {
                slot.state = EngineState::Cancelled;
            }
            info!("Announcement check cancelled");
        }
    }

    pub fn state(&self) -> EngineState {
        self.lock_session().state
    }

    /// Identifiers of every registered rule, for bulk-dismiss and debug tools.
    pub fn dismiss_keys(&self) -> Vec<RuleIdentifier> {
        self.registry.identifiers()
    }

    pub fn dismissals(&self) -> &Arc<DismissRecorder> {
        &self.dismissals
    }

    /// Record a user dismissal of a card. Returns whether it was persisted.
    ///
    /// Persistence failures are logged; the caller keeps going.
    pub async fn dismiss(&self, rule_id: &RuleIdentifier, rule: DismissRule) -> bool {
        let result = match rule {
            DismissRule::CardPeriodic => self.dismissals.dismiss(rule_id).await,
            DismissRule::CardOneTime => self.dismissals.dismiss_forever(rule_id).await,
            DismissRule::CardPersistent => {
                debug!(rule = %rule_id, "Ignoring dismissal of persistent card");
                return false;
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(rule = %rule_id, error = %e, "Failed to persist dismissal");
                false
            }
        }
    }

    /// Clear every registered rule's dismissal. Returns how many were cleared.
    pub async fn reset_dismissals(&self) -> usize {
        let mut cleared = 0;
        for id in self.dismiss_keys() {
            match self.dismissals.undismiss(&id).await {
                Ok(()) => cleared += 1,
                Err(e) => warn!(rule = %id, error = %e, "Failed to clear dismissal"),
            }
        }
        info!(cleared, "Announcement dismissals reset");
        cleared
    }

    async fn run_session(
        &self,
        session: Uuid,
        cancel: &CancellationToken,
        host: Arc<dyn AnnouncementHost>,
    ) -> CheckOutcome {
        let clear = Arc::clone(&host);
        if let Err(e) = self.dispatcher.run(move || clear.dismiss_announcement_card()).await {
            error!(error = %e, "Failed to clear announcement card");
        }

        self.transition(session, EngineState::FetchingConfig);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CheckOutcome::Cancelled,
            fetched = self.config_source.fetch_announcement_config() => fetched,
        };
        let config = match fetched {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Announcement config unavailable, skipping this cycle");
                return CheckOutcome::NotShown;
            }
        };

        self.dismissals.set_window(config.interval);
        self.transition(session, EngineState::Evaluating);
        debug!(candidates = config.order.len(), "Evaluating announcements");

        let rule = match self.evaluator.first_eligible(&config.order, cancel).await {
            Evaluation::Winner(rule) => rule,
            Evaluation::NoWinner => {
                debug!("No eligible announcement");
                return CheckOutcome::NotShown;
            }
            Evaluation::Cancelled => return CheckOutcome::Cancelled,
        };

        self.transition(session, EngineState::Presenting);
        let rule_id = rule.identifier().clone();
        let token = cancel.clone();
        let gate = Arc::clone(&self.present_gate);
        let delivered = self
            .dispatcher
            .run(move || {
                // Re-checked on the delivery thread so a cancel that lands
                // while the job is queued still wins.
                let _gate = gate.lock().unwrap_or_else(PoisonError::into_inner);
                if token.is_cancelled() {
                    return false;
                }
                rule.present(host.as_ref());
                true
            })
            .await;

        match delivered {
            Ok(true) => {
                info!(rule = %rule_id, "Announcement presented");
                CheckOutcome::Shown(rule_id)
            }
            Ok(false) => CheckOutcome::Cancelled,
            Err(e) => {
                error!(rule = %rule_id, error = %e, "Failed to deliver announcement");
                CheckOutcome::NotShown
            }
        }
    }

    fn begin_session(&self) -> (Uuid, CancellationToken) {
        let _gate = self.lock_present_gate();
        let mut slot = self.lock_session();
        if let Some(previous) = slot.token.take() {
            debug!("Superseding in-flight announcement check");
            previous.cancel();
        }
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        slot.id = Some(id);
        slot.token = Some(token.clone());
        slot.state = EngineState::Idle;
        (id, token)
    }

    fn transition(&self, session: Uuid, to: EngineState) {
        let mut slot = self.lock_session();
        if slot.id != Some(session) {
            return;
        }
        if slot.state.can_transition_to(to) {
            slot.state = to;
        } else {
            debug!(from = %slot.state, to = %to, "Ignoring state transition");
        }
    }

    fn end_session(&self, session: Uuid) {
        let mut slot = self.lock_session();
        if slot.id == Some(session) {
            slot.id = None;
            slot.token = None;
            slot.state = EngineState::Idle;
        }
    }

    /// `None` on the delivery thread itself: a cancel issued from inside
    /// `present` cannot race the check that let it start.
    fn lock_present_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if dispatcher::in_delivery_context() {
            return None;
        }
        Some(self.present_gate.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().expect("announcement session mutex poisoned")
    }
}
