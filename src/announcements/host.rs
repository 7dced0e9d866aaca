//! The host UI surface that displays cards and runs card actions.

use super::model::{AnnouncementCard, CampaignType, CryptoCurrency};

/// Capabilities the host screen exposes to the announcement engine and rules.
///
/// The engine only calls `show_announcement_card` (via a rule) and
/// `dismiss_announcement_card`, and both always run on the delivery
/// dispatcher. The `start_*` triggers are for rules and card call-to-actions.
pub trait AnnouncementHost: Send + Sync {
    fn show_announcement_card(&self, card: AnnouncementCard);
    fn dismiss_announcement_card(&self);

    fn start_kyc(&self, campaign: CampaignType);
    fn start_swap(&self, target: CryptoCurrency);
    fn start_buy_sell(&self);
    fn start_pit_linking(&self);
    fn start_funds_backup(&self);
    fn start_setup_2fa(&self);
    fn start_verify_email(&self);
    fn start_enable_fingerprint_login(&self);
    fn start_intro_tour_guide(&self);
    fn start_transfer_crypto(&self);
    fn start_blockstack_intro(&self);
}
