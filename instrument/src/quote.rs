use crate::exchange::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last traded price plus top-of-book snapshot for a [`Symbol`].
///
/// See `spec.md` §3 "Quote".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub last_price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub bid: Decimal,
    pub bid_qty: u64,
    pub ask: Decimal,
    pub ask_qty: u64,
    pub volume: u64,
    pub timestamp_ms: i64,
}
