use crate::exchange::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single order-book level.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: u64,
    pub orders: Option<u32>,
}

/// Ordered order-book snapshot for a [`Symbol`].
///
/// Invariants (`spec.md` §3, §8 property 3): `bids` strictly non-increasing by price, `asks`
/// strictly non-decreasing by price, `best_bid < best_ask` whenever both exist. Adapters
/// typically supply 5 levels per side, up to 20.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketDepth {
    pub symbol: Symbol,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl MarketDepth {
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    /// Check the depth-ordering invariant from `spec.md` §8 property 3.
    pub fn validate(&self) -> Result<(), DepthValidationError> {
        if !self.bids.windows(2).all(|w| w[0].price >= w[1].price) {
            return Err(DepthValidationError::BidsNotDescending);
        }

        if !self.asks.windows(2).all(|w| w[0].price <= w[1].price) {
            return Err(DepthValidationError::AsksNotAscending);
        }

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid.price >= ask.price {
                return Err(DepthValidationError::CrossedBook);
            }
        }

        Ok(())
    }
}

/// Error returned by [`MarketDepth::validate`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DepthValidationError {
    #[error("bids are not strictly non-increasing by price")]
    BidsNotDescending,
    #[error("asks are not strictly non-decreasing by price")]
    AsksNotAscending,
    #[error("best bid is not strictly below best ask")]
    CrossedBook,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, qty: u64) -> DepthLevel {
        DepthLevel {
            price,
            quantity: qty,
            orders: None,
        }
    }

    #[test]
    fn valid_depth_passes() {
        let depth = MarketDepth {
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            bids: vec![level(dec!(100), 1), level(dec!(99), 2)],
            asks: vec![level(dec!(101), 1), level(dec!(102), 2)],
        };
        assert!(depth.validate().is_ok());
    }

    #[test]
    fn crossed_book_is_rejected() {
        let depth = MarketDepth {
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            bids: vec![level(dec!(101), 1)],
            asks: vec![level(dec!(100), 1)],
        };
        assert_eq!(depth.validate(), Err(DepthValidationError::CrossedBook));
    }

    #[test]
    fn non_monotonic_bids_are_rejected() {
        let depth = MarketDepth {
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            bids: vec![level(dec!(99), 1), level(dec!(100), 1)],
            asks: vec![],
        };
        assert_eq!(
            depth.validate(),
            Err(DepthValidationError::BidsNotDescending)
        );
    }
}
