use crate::exchange::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settled portfolio entry for a [`Symbol`].
///
/// See `spec.md` §3 "Holding".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Holding {
    pub symbol: Symbol,
    pub quantity: u64,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub isin: Option<String>,
    pub pledged_qty: Option<u64>,
    pub collateral_qty: Option<u64>,
    pub t1_qty: Option<u64>,
}
