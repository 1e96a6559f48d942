use crate::{
    exchange::Symbol,
    ids::{BrokerId, OrderId, TradeId},
    mapping::Side,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single fill (partial or full) against an [`Order`](crate::order::Order), returned by
/// `GetTrades` (`spec.md` §4.B capability table).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub id: TradeId,
    pub order_id: OrderId,
    pub broker_id: BrokerId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}
