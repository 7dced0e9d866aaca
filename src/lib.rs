//! Wallet announcements: picks at most one announcement card to show.
//!
//! Rules are evaluated in a remotely configured order; the first eligible,
//! non-dismissed rule is presented through the host on a single delivery
//! context. Dismissals persist in a key-value store and expire after a
//! configurable window.

pub mod announcements;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;
