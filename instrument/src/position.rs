use crate::{exchange::Symbol, mapping::Product};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Intraday/open exposure for a [`Symbol`] under a given [`Product`].
///
/// See `spec.md` §3 "Position". `quantity` is signed: positive is long, negative is short.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub symbol: Symbol,
    pub product: Product,
    pub quantity: i64,
    pub buy_qty: u64,
    pub sell_qty: u64,
    pub buy_value: Decimal,
    pub sell_value: Decimal,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub day_pnl: Decimal,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }
}
