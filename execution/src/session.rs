use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use meridian_instrument::{
    exchange::Symbol,
    ids::{BrokerId, SubscriptionId},
    tick::StreamMode,
};
use serde::{Deserialize, Serialize};

/// Per-broker internal session state (`spec.md` §3's `BrokerSession`). Owned exclusively by the
/// adapter it belongs to; the Auth Manager mutates `auth_state`/token fields, everything else is
/// mutated only by the owning adapter's own tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSession {
    pub broker_id: BrokerId,
    pub auth_state: AuthState,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub account_key: Option<String>,
    pub paper_mode: bool,
    pub subscriptions: FnvHashMap<SubscriptionId, SubscriptionEntry>,
}

impl BrokerSession {
    pub fn new(broker_id: BrokerId, paper_mode: bool) -> Self {
        Self {
            broker_id,
            auth_state: AuthState::None,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            account_key: None,
            paper_mode,
            subscriptions: FnvHashMap::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth_state, AuthState::Authenticated)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    None,
    Authenticating,
    Authenticated,
    Refreshing,
    Failed,
}

/// One entry of a [`BrokerSession`]'s subscription table: venue-specific id -> (symbol, mode).
/// Created on `subscribe`, removed on `unsubscribe`/disconnect, re-created on reconnect
/// (`spec.md` §3's "Subscription entries" lifecycle rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub symbol: Symbol,
    pub mode: StreamMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_unauthenticated() {
        let session = BrokerSession::new(BrokerId::new("vantage_primary"), false);
        assert_eq!(session.auth_state, AuthState::None);
        assert!(!session.is_authenticated());
        assert!(session.subscriptions.is_empty());
    }
}
