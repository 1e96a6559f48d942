use derive_more::{Display, From};
use rand::prelude::IndexedRandom;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifies one configured broker account (eg/ `"vantage_primary"`, `"paper"`).
///
/// A single venue implementation (vantage/solace/harborview) may be registered more than once
/// under different [`BrokerId`]s if a client holds multiple accounts at the same broker.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct BrokerId(pub SmolStr);

impl BrokerId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }

    /// Literal [`BrokerId`] used by the paper-trading interception adapter.
    pub fn paper() -> Self {
        Self::new("paper")
    }
}

impl From<&str> for BrokerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client-generated idempotency key for a [`NewOrder`](crate::order::NewOrder).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct ClientOrderId(pub SmolStr);

impl ClientOrderId {
    pub fn new<S: Into<SmolStr>>(id: S) -> Self {
        Self(id.into())
    }

    /// Construct a stack-allocated [`ClientOrderId`] backed by a 23 byte [`SmolStr`].
    pub fn random() -> Self {
        const URL_SAFE_SYMBOLS: [char; 64] = [
            '_', '-', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e',
            'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v',
            'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
            'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
        ];
        const LEN_NON_ALLOCATING_CID: usize = 23;

        let mut thread_rng = rand::rng();

        let random_utf8: [u8; LEN_NON_ALLOCATING_CID] = std::array::from_fn(|_| {
            let symbol = URL_SAFE_SYMBOLS
                .choose(&mut thread_rng)
                .expect("URL_SAFE_SYMBOLS slice is not empty");

            *symbol as u8
        });

        let random_utf8_str =
            std::str::from_utf8(&random_utf8).expect("URL_SAFE_SYMBOLS are valid utf8");

        Self(SmolStr::new_inline(random_utf8_str))
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::random()
    }
}

/// Broker-assigned order identifier, only known once the order has been acknowledged venue-side.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Broker-assigned trade (fill) identifier.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct TradeId(pub SmolStr);

impl TradeId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Venue-specific streaming subscription identifier allocated by an adapter on `Subscribe`.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct SubscriptionId(pub SmolStr);

impl SubscriptionId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Identifies a registered [`Plugin`](crate) within the Plugin Pipeline.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct PluginId(pub SmolStr);

impl PluginId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_random_is_stack_allocated_and_unique_enough() {
        let a = ClientOrderId::random();
        let b = ClientOrderId::random();
        assert_ne!(a, b);
        assert_eq!(a.0.len(), 23);
    }

    #[test]
    fn broker_id_paper_literal() {
        assert_eq!(BrokerId::paper(), BrokerId::new("paper"));
    }
}
