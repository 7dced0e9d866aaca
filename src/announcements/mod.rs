//! Announcement engine: rules, dismissals, evaluation, and delivery.

pub mod dismissal;
pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod host;
pub mod model;
pub mod remote;
pub mod rule;

#[cfg(test)]
mod testing;

pub use dismissal::{DismissRecorder, DismissalEntry};
pub use dispatcher::{DispatchQueue, Dispatcher};
pub use engine::{AnnouncementEngine, CheckOutcome, EngineDeps, EngineState};
pub use evaluator::{Evaluation, Evaluator};
pub use host::AnnouncementHost;
pub use model::{
    AnnouncementCard, AnnouncementConfig, CampaignType, CryptoCurrency, DismissRule, HostAction,
    RuleIdentifier,
};
pub use remote::{
    AnnouncementConfigSource, RemoteConfig, RemoteConfigAdapter, StaticConfigSource,
    parse_announcement_config,
};
pub use rule::{AnnouncementRule, PredicateRule, RuleRegistry};
