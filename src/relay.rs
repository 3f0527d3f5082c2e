//! Message relay between session partners.

use aho_corasick::AhoCorasick;
use std::sync::Arc;
use tracing::warn;

use crate::messenger::Messenger;
use crate::state::Matchmaker;

/// Keywords that mark a message as carrying a link.
const LINK_PATTERNS: &[&str] = &["http", "www.", "t.me/"];

/// Outcome of a relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Forwarded to the partner (delivery itself may still have been
    /// degraded; that is surfaced to the sender as a soft warning).
    Delivered,
    /// The sender has no active session.
    NoSession,
    /// The link filter rejected the message.
    Blocked,
}

/// Fixed keyword filter for link-bearing messages.
#[derive(Debug)]
pub struct LinkFilter {
    matcher: AhoCorasick,
}

impl LinkFilter {
    pub fn new() -> Self {
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(LINK_PATTERNS)
            .expect("static link patterns");
        Self { matcher }
    }

    pub fn is_link(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards user text to the session partner.
pub struct Relay {
    matchmaker: Arc<Matchmaker>,
    messenger: Arc<dyn Messenger>,
    filter: LinkFilter,
}

impl Relay {
    pub fn new(matchmaker: Arc<Matchmaker>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            matchmaker,
            messenger,
            filter: LinkFilter::new(),
        }
    }

    /// Forward `text` from `sender` to their partner, verbatim.
    ///
    /// Transport failures leave the session intact: the partner may be
    /// transiently offline. The sender gets a soft warning instead.
    pub async fn relay(&self, sender: &str, text: &str) -> RelayOutcome {
        let Some(partner) = self.matchmaker.partner_of(sender) else {
            return RelayOutcome::NoSession;
        };
        if self.filter.is_link(text) {
            return RelayOutcome::Blocked;
        }

        if let Err(e) = self.messenger.send(&partner, text).await {
            warn!(from = %sender, to = %partner, error = %e, "Relay delivery failed");
            let _ = self
                .messenger
                .send(sender, "* could not reach your partner right now")
                .await;
        }
        RelayOutcome::Delivered
    }
}
