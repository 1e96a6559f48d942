use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account cash/margin summary.
///
/// See `spec.md` §3 "Funds".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Funds {
    pub available_cash: Decimal,
    pub used_margin: Decimal,
    pub available_margin: Decimal,
    pub total_balance: Decimal,
    pub currency: String,
    pub collateral: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}
