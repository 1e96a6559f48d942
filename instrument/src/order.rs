use crate::{
    exchange::Symbol,
    ids::{BrokerId, ClientOrderId, OrderId},
    mapping::{OrderType, Product, Side, Status, Validity},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical order as submitted by a caller, before any broker has seen it.
///
/// See `spec.md` §3 "Canonical Order (input)".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewOrder {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    #[serde(rename = "type")]
    pub kind: OrderType,
    pub quantity: u64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub product: Product,
    pub validity: Validity,
    pub tag: Option<String>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl NewOrder {
    /// Validate the invariants from `spec.md` §3:
    /// `type` implies `price`/`trigger_price` presence, `quantity > 0`, `tag.len() <= 64`.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.quantity == 0 {
            return Err(OrderValidationError::NonPositiveQuantity);
        }

        if self.kind.requires_price() && self.price.is_none() {
            return Err(OrderValidationError::MissingPrice(self.kind));
        }

        if self.kind.requires_trigger_price() && self.trigger_price.is_none() {
            return Err(OrderValidationError::MissingTriggerPrice(self.kind));
        }

        if let Some(tag) = &self.tag {
            if tag.len() > 64 {
                return Err(OrderValidationError::TagTooLong(tag.len()));
            }
        }

        Ok(())
    }
}

/// Error returned by [`NewOrder::validate`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OrderValidationError {
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    #[error("order type {0} requires a price")]
    MissingPrice(OrderType),
    #[error("order type {0} requires a trigger_price")]
    MissingTriggerPrice(OrderType),
    #[error("tag length {0} exceeds the 64 character limit")]
    TagTooLong(usize),
}

/// Canonical order as observed back from a broker via `GetOrders` or a streaming update.
///
/// See `spec.md` §3 "Canonical Order (observed)" and §8 property 2 (order math invariants).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: ClientOrderId,
    pub broker_id: BrokerId,
    pub symbol: Symbol,
    pub side: Side,
    #[serde(rename = "type")]
    pub kind: OrderType,
    pub quantity: u64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub product: Product,
    pub validity: Validity,
    pub status: Status,
    pub filled_qty: u64,
    pub avg_fill_price: Option<Decimal>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exchange_order_id: Option<String>,
    pub status_message: Option<String>,
}

impl Order {
    /// `quantity - filled_qty`, per `spec.md` §3.
    pub fn pending_qty(&self) -> u64 {
        self.quantity.saturating_sub(self.filled_qty)
    }

    /// `spec.md` §8 property 2: `pending_qty + filled_qty == quantity`.
    pub fn satisfies_order_math(&self) -> bool {
        self.pending_qty() + self.filled_qty == self.quantity
    }

    /// Ordering key used to deduplicate status transitions when polling and streaming both
    /// yield updates for the same `id` (`spec.md` §4.B): monotonic by `updated_at`, tiebreak
    /// by `(filled_qty, status)`.
    pub fn transition_key(&self) -> (DateTime<Utc>, u64, Status) {
        (self.updated_at, self.filled_qty, self.status)
    }

    /// `true` if `other` is a more recent observation of the same order than `self`, per the
    /// deduplication ordering above.
    pub fn is_superseded_by(&self, other: &Order) -> bool {
        debug_assert_eq!(self.id, other.id);
        other.transition_key() > self.transition_key()
    }
}

/// Editable fields for `ModifyOrder`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OrderPatch {
    pub quantity: Option<u64>,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub validity: Option<Validity>,
}

/// A parent order plus dependent stop-loss / take-profit legs (`spec.md` glossary: "bracket
/// order" / "smart order"). Cancellation of the parent cancels the legs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BracketOrder {
    pub parent: NewOrder,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    /// Trailing offset, if this leg should trail the market instead of sitting at a fixed price.
    pub trailing_offset: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use rust_decimal_macros::dec;

    fn base_order() -> NewOrder {
        NewOrder {
            client_order_id: ClientOrderId::new("cid-1"),
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            side: Side::Buy,
            kind: OrderType::Market,
            quantity: 10,
            price: None,
            trigger_price: None,
            product: Product::Cnc,
            validity: Validity::Day,
            tag: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    #[test]
    fn market_order_does_not_require_price() {
        assert!(base_order().validate().is_ok());
    }

    #[test]
    fn limit_order_requires_price() {
        let mut order = base_order();
        order.kind = OrderType::Limit;
        assert_eq!(
            order.validate(),
            Err(OrderValidationError::MissingPrice(OrderType::Limit))
        );
        order.price = Some(dec!(2500.10));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn stop_limit_requires_price_and_trigger() {
        let mut order = base_order();
        order.kind = OrderType::StopLimit;
        assert!(order.validate().is_err());
        order.price = Some(dec!(100));
        assert!(order.validate().is_err());
        order.trigger_price = Some(dec!(99));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut order = base_order();
        order.quantity = 0;
        assert_eq!(
            order.validate(),
            Err(OrderValidationError::NonPositiveQuantity)
        );
    }

    #[test]
    fn tag_over_64_chars_is_rejected() {
        let mut order = base_order();
        order.tag = Some("x".repeat(65));
        assert_eq!(order.validate(), Err(OrderValidationError::TagTooLong(65)));
    }

    fn observed(filled_qty: u64, quantity: u64, status: Status, updated_at: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new("o-1"),
            client_order_id: ClientOrderId::new("cid-1"),
            broker_id: BrokerId::new("vantage"),
            symbol: Symbol::new("RELIANCE", Exchange::Nse),
            side: Side::Buy,
            kind: OrderType::Limit,
            quantity,
            price: Some(dec!(2500)),
            trigger_price: None,
            product: Product::Cnc,
            validity: Validity::Day,
            status,
            filled_qty,
            avg_fill_price: None,
            placed_at: updated_at,
            updated_at,
            exchange_order_id: None,
            status_message: None,
        }
    }

    #[test]
    fn order_math_invariant_holds() {
        let order = observed(4, 10, Status::PartiallyFilled, Utc::now());
        assert_eq!(order.pending_qty(), 6);
        assert!(order.satisfies_order_math());
    }

    #[test]
    fn later_update_supersedes_earlier_one() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::milliseconds(1);
        let earlier = observed(0, 10, Status::Open, t0);
        let later = observed(10, 10, Status::Filled, t1);
        assert!(earlier.is_superseded_by(&later));
        assert!(!later.is_superseded_by(&earlier));
    }
}
