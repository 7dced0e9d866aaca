//! Test doubles shared by the announcement unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::RuleError;

use super::host::AnnouncementHost;
use super::model::{AnnouncementCard, CampaignType, CryptoCurrency, RuleIdentifier};
use super::rule::AnnouncementRule;

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Shown(AnnouncementCard),
    Dismissed,
    Action(&'static str),
}

type ShowHook = Box<dyn Fn() + Send + Sync>;

/// Host that records every call and the thread it arrived on.
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    show_threads: Mutex<Vec<ThreadId>>,
    dismiss_threads: Mutex<Vec<ThreadId>>,
    on_show: Mutex<Option<ShowHook>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<AnnouncementCard> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Shown(card) => Some(card),
                _ => None,
            })
            .collect()
    }

    pub fn dismiss_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HostEvent::Dismissed))
            .count()
    }

    pub fn show_threads(&self) -> Vec<ThreadId> {
        self.show_threads.lock().unwrap().clone()
    }

    pub fn dismiss_threads(&self) -> Vec<ThreadId> {
        self.dismiss_threads.lock().unwrap().clone()
    }

    /// Run `hook` inside every `show_announcement_card`, after recording it.
    pub fn set_on_show(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_show.lock().unwrap() = Some(Box::new(hook));
    }

    fn action(&self, name: &'static str) {
        self.events.lock().unwrap().push(HostEvent::Action(name));
    }
}

impl AnnouncementHost for RecordingHost {
    fn show_announcement_card(&self, card: AnnouncementCard) {
        self.show_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.events.lock().unwrap().push(HostEvent::Shown(card));
        if let Some(hook) = self.on_show.lock().unwrap().as_ref() {
            hook();
        }
    }

    fn dismiss_announcement_card(&self) {
        self.dismiss_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.events.lock().unwrap().push(HostEvent::Dismissed);
    }

    fn start_kyc(&self, _campaign: CampaignType) {
        self.action("kyc");
    }
    fn start_swap(&self, _target: CryptoCurrency) {
        self.action("swap");
    }
    fn start_buy_sell(&self) {
        self.action("buy_sell");
    }
    fn start_pit_linking(&self) {
        self.action("pit_linking");
    }
    fn start_funds_backup(&self) {
        self.action("funds_backup");
    }
    fn start_setup_2fa(&self) {
        self.action("setup_2fa");
    }
    fn start_verify_email(&self) {
        self.action("verify_email");
    }
    fn start_enable_fingerprint_login(&self) {
        self.action("fingerprint_login");
    }
    fn start_intro_tour_guide(&self) {
        self.action("intro_tour");
    }
    fn start_transfer_crypto(&self) {
        self.action("transfer_crypto");
    }
    fn start_blockstack_intro(&self) {
        self.action("blockstack_intro");
    }
}

/// How a scripted rule's eligibility check behaves.
pub enum Script {
    Eligible(bool),
    Fail,
    Panic,
    /// Wait for `release` to be notified, then answer.
    Gated(bool),
}

/// Rule with a scripted eligibility answer and a call counter.
pub struct ScriptedRule {
    id: RuleIdentifier,
    script: Script,
    pub release: Notify,
    calls: AtomicUsize,
}

impl ScriptedRule {
    pub fn new(id: &str, script: Script) -> Self {
        Self {
            id: RuleIdentifier::new(id),
            script,
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnouncementRule for ScriptedRule {
    fn identifier(&self) -> &RuleIdentifier {
        &self.id
    }

    async fn should_show(&self) -> Result<bool, RuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Eligible(answer) => Ok(answer),
            Script::Fail => Err(RuleError::failed(self.id.as_str(), "scripted failure")),
            Script::Panic => panic!("scripted panic in {}", self.id),
            Script::Gated(answer) => {
                self.release.notified().await;
                Ok(answer)
            }
        }
    }

    fn present(&self, host: &dyn AnnouncementHost) {
        host.show_announcement_card(AnnouncementCard::new(self.id.clone(), self.id.as_str(), ""));
    }
}
