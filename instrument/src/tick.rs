use crate::{exchange::Symbol, ids::BrokerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single real-time price update delivered over the streaming channel.
///
/// See `spec.md` §3 and glossary "Tick". Every tick carries `broker_id` so a consumer fanning
/// ticks in from more than one adapter (the Streaming Aggregator, `spec.md` §4.G) can tell which
/// venue it came from and de-prefer stale sources; there is no ordering guarantee across brokers,
/// only per-`(broker_id, symbol)` (`spec.md` §8 property, §5).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    pub broker_id: BrokerId,
    pub symbol: Symbol,
    pub last_price: Decimal,
    pub last_qty: Option<u64>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Option<u64>,
    pub timestamp_ms: i64,
}

impl Tick {
    /// Ordering key for the per-`(broker, symbol)` strict-monotonic-by-timestamp guarantee
    /// (`spec.md` §4.G): out-of-order ticks for the same source are dropped, not reordered.
    pub fn is_after(&self, previous: &Tick) -> bool {
        debug_assert_eq!(self.broker_id, previous.broker_id);
        debug_assert_eq!(self.symbol, previous.symbol);
        self.timestamp_ms > previous.timestamp_ms
    }
}

/// Subscription depth requested on `Subscribe` (`spec.md` §4.B).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamMode {
    /// Top-of-book quote ticks only.
    Quote,
    /// Full depth / order-book ticks.
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use rust_decimal_macros::dec;

    fn tick(ts: i64) -> Tick {
        Tick {
            broker_id: BrokerId::new("vantage"),
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            last_price: dec!(2500),
            last_qty: Some(1),
            bid: None,
            ask: None,
            volume: None,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn later_timestamp_is_after_earlier_one() {
        let earlier = tick(1_000);
        let later = tick(1_001);
        assert!(later.is_after(&earlier));
        assert!(!earlier.is_after(&later));
    }

    #[test]
    fn equal_timestamp_is_not_after() {
        let a = tick(1_000);
        let b = tick(1_000);
        assert!(!a.is_after(&b));
    }
}
