//! Announcement data model: rule identifiers, cards, host actions, remote config.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::host::AnnouncementHost;

/// Stable name of a rule. Doubles as remote-config ordering token and
/// dismissal-store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleIdentifier(String);

impl RuleIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleIdentifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RuleIdentifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a card may be dismissed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissRule {
    /// Dismissal lasts for the remote-configured window.
    #[default]
    CardPeriodic,
    /// Dismissal is permanent.
    CardOneTime,
    /// Card cannot be dismissed.
    CardPersistent,
}

/// KYC campaign a card can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Swap,
    Sunriver,
    Blockstack,
    Resubmission,
}

/// Asset a swap flow opens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoCurrency {
    Btc,
    #[default]
    Eth,
    Bch,
    Xlm,
    Pax,
    Stx,
}

/// Named host action a card's call-to-action triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    StartKyc { campaign: CampaignType },
    StartSwap { target: CryptoCurrency },
    StartBuySell,
    StartPitLinking,
    StartFundsBackup,
    StartSetup2Fa,
    StartVerifyEmail,
    StartEnableFingerprintLogin,
    StartIntroTourGuide,
    StartTransferCrypto,
    StartBlockstackIntro,
}

impl HostAction {
    /// Fire the matching trigger on the host.
    pub fn invoke(&self, host: &dyn AnnouncementHost) {
        match *self {
            Self::StartKyc { campaign } => host.start_kyc(campaign),
            Self::StartSwap { target } => host.start_swap(target),
            Self::StartBuySell => host.start_buy_sell(),
            Self::StartPitLinking => host.start_pit_linking(),
            Self::StartFundsBackup => host.start_funds_backup(),
            Self::StartSetup2Fa => host.start_setup_2fa(),
            Self::StartVerifyEmail => host.start_verify_email(),
            Self::StartEnableFingerprintLogin => host.start_enable_fingerprint_login(),
            Self::StartIntroTourGuide => host.start_intro_tour_guide(),
            Self::StartTransferCrypto => host.start_transfer_crypto(),
            Self::StartBlockstackIntro => host.start_blockstack_intro(),
        }
    }
}

/// A card handed to the host for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementCard {
    /// Rule that produced the card; also the dismissal key.
    pub rule_id: RuleIdentifier,
    pub title: String,
    pub description: String,
    /// Host-side icon resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<HostAction>,
    #[serde(default)]
    pub dismiss_rule: DismissRule,
}

impl AnnouncementCard {
    pub fn new(
        rule_id: impl Into<RuleIdentifier>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            title: title.into(),
            description: description.into(),
            icon: None,
            cta_label: None,
            cta: None,
            dismiss_rule: DismissRule::default(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_cta(mut self, label: impl Into<String>, action: HostAction) -> Self {
        self.cta_label = Some(label.into());
        self.cta = Some(action);
        self
    }

    pub fn with_dismiss_rule(mut self, rule: DismissRule) -> Self {
        self.dismiss_rule = rule;
        self
    }

    /// Run the call-to-action, if any. Returns whether an action fired.
    pub fn trigger_cta(&self, host: &dyn AnnouncementHost) -> bool {
        match self.cta {
            Some(action) => {
                action.invoke(host);
                true
            }
            None => false,
        }
    }
}

/// Ordering and dismissal window for one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementConfig {
    /// Priority order; first eligible wins.
    pub order: Vec<RuleIdentifier>,
    /// Dismissal window applied to every entry.
    pub interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_identifier_serializes_as_plain_string() {
        let id = RuleIdentifier::new("kyc_incomplete");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"kyc_incomplete\"");
        assert_eq!(id.to_string(), "kyc_incomplete");
    }

    #[test]
    fn card_json_shape() {
        let card = AnnouncementCard::new("swap_intro", "Swap", "Trade crypto in seconds")
            .with_cta("Swap now", HostAction::StartSwap { target: CryptoCurrency::Eth })
            .with_dismiss_rule(DismissRule::CardOneTime);

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["rule_id"], "swap_intro");
        assert_eq!(value["cta"]["action"], "start_swap");
        assert_eq!(value["cta"]["target"], "eth");
        assert_eq!(value["dismiss_rule"], "card_one_time");
        assert!(value.get("icon").is_none());
    }

    #[test]
    fn card_defaults_to_periodic_dismissal() {
        let card: AnnouncementCard = serde_json::from_str(
            r#"{"rule_id": "backup_funds", "title": "Back up", "description": "Secure your wallet"}"#,
        )
        .unwrap();
        assert_eq!(card.dismiss_rule, DismissRule::CardPeriodic);
        assert!(card.cta.is_none());
    }
}
