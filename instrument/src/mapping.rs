use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// [`Side`] of an order or position - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[serde(alias = "buy", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "s")]
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Canonical order type.
///
/// `STOP_LOSS` and `STOP_LIMIT` name the same concept in upstream broker documentation and were
/// spelled inconsistently in the system this gateway replaces. This enum keeps a single
/// canonical variant, [`OrderType::StopLimit`], and accepts `STOP_LOSS` only as a documented wire
/// alias - see `DESIGN.md` for the rationale.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    #[serde(alias = "STOP_LOSS")]
    StopLimit,
    StopLossMarket,
    TrailingStop,
    TrailingStopLimit,
}

impl OrderType {
    /// `true` if a limit [`price`](crate::order::NewOrder::price) must be supplied.
    pub fn requires_price(self) -> bool {
        matches!(
            self,
            OrderType::Limit | OrderType::StopLimit | OrderType::TrailingStopLimit
        )
    }

    /// `true` if a [`trigger_price`](crate::order::NewOrder::trigger_price) must be supplied.
    pub fn requires_trigger_price(self) -> bool {
        matches!(
            self,
            OrderType::Stop
                | OrderType::StopLimit
                | OrderType::StopLossMarket
                | OrderType::TrailingStop
                | OrderType::TrailingStopLimit
        )
    }
}

impl Display for OrderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP_LIMIT",
            OrderType::StopLossMarket => "STOP_LOSS_MARKET",
            OrderType::TrailingStop => "TRAILING_STOP",
            OrderType::TrailingStopLimit => "TRAILING_STOP_LIMIT",
        };
        write!(f, "{s}")
    }
}

/// Margining / settlement product type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Product {
    /// Cash-and-carry / delivery.
    Cnc,
    /// Margin intraday squareoff.
    Mis,
    /// Normal (carry-forward) margin.
    Nrml,
    Margin,
    Intraday,
    Cash,
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Product::Cnc => "CNC",
            Product::Mis => "MIS",
            Product::Nrml => "NRML",
            Product::Margin => "MARGIN",
            Product::Intraday => "INTRADAY",
            Product::Cash => "CASH",
        };
        write!(f, "{s}")
    }
}

/// Order time-in-force / validity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Validity {
    Day,
    Ioc,
    Gtc,
    Gtd,
    Fok,
    /// Market-on-open.
    Opg,
    /// Market-on-close.
    Cls,
}

impl Display for Validity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Validity::Day => "DAY",
            Validity::Ioc => "IOC",
            Validity::Gtc => "GTC",
            Validity::Gtd => "GTD",
            Validity::Fok => "FOK",
            Validity::Opg => "OPG",
            Validity::Cls => "CLS",
        };
        write!(f, "{s}")
    }
}

/// Observed order status, per the state machine in `spec.md` §4.B.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl Status {
    /// `true` for the terminal states `FILLED | CANCELLED | REJECTED | EXPIRED`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Filled | Status::Cancelled | Status::Rejected | Status::Expired
        )
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "PENDING",
            Status::Open => "OPEN",
            Status::PartiallyFilled => "PARTIALLY_FILLED",
            Status::Filled => "FILLED",
            Status::Cancelled => "CANCELLED",
            Status::Rejected => "REJECTED",
            Status::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// Per-broker, per-enum bidirectional mapping between a canonical value and the broker's wire
/// string for it.
///
/// Mapping is deliberately total (`spec.md` §4.A, §8 property 1): every canonical value has a
/// defined `to_broker` string, and every broker string `from_broker` recognises maps back to a
/// canonical value; anything unrecognised falls back to [`BrokerMapping::default_canonical`]
/// rather than panicking or erroring, since a wire message with an unexpected enum spelling
/// should still be processable.
pub trait BrokerMapping<Canonical> {
    /// Map a canonical value to this broker's wire string.
    fn to_broker(&self, value: Canonical) -> &'static str;

    /// Map a broker wire string back to a canonical value, falling back to
    /// [`Self::default_canonical`] for anything unrecognised.
    fn from_broker(&self, value: &str) -> Canonical;

    /// Documented fallback used by [`Self::from_broker`] for unrecognised wire strings.
    fn default_canonical() -> Canonical;
}

/// Verify that `to_broker(from_broker(s)) == s` for every string in `recognised`, and that
/// `from_broker(to_broker(v)) == v` for every variant in `all_canonical`.
///
/// Adapters call this from their own `#[cfg(test)]` modules against their static mapping tables -
/// the primary unit of adapter testing per `spec.md` §9.
pub fn assert_mapping_total<Canonical, Mapping>(
    mapping: &Mapping,
    all_canonical: &[Canonical],
    recognised: &[&str],
) where
    Canonical: Copy + Eq + std::fmt::Debug,
    Mapping: BrokerMapping<Canonical>,
{
    for &value in all_canonical {
        let wire = mapping.to_broker(value);
        assert_eq!(
            mapping.from_broker(wire),
            value,
            "round trip from_broker(to_broker({value:?})) failed for wire string {wire:?}"
        );
    }

    for &wire in recognised {
        let canonical = mapping.from_broker(wire);
        assert_eq!(
            mapping.to_broker(canonical),
            wire,
            "round trip to_broker(from_broker({wire:?})) failed"
        );
    }
}
