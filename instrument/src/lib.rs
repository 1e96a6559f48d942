#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Meridian-Instrument
//! Core canonical value types shared by every broker adapter: enums (`Side`, `OrderType`,
//! `Product`, `Validity`, `Status`), identifiers, symbols, and the order/quote/position/holding/
//! funds/tick data model. None of these types know how to talk to a venue; `meridian-execution`
//! maps them to and from broker-specific wire dialects.

/// Process-wide identifier newtypes (`BrokerId`, `OrderId`, `ClientOrderId`, ...).
pub mod ids;

/// Supported cash-equity venues (`Exchange`) and the `Symbol` (`TICKER:EXCHANGE`) type.
pub mod exchange;

/// `Side`, `OrderType`, `Product`, `Validity`, `Status` canonical enums and the
/// [`BrokerMapping`](mapping::BrokerMapping) trait every adapter implements for them.
pub mod mapping;

/// Canonical order types: `NewOrder` (input), `Order` (observed), `OrderPatch`, `BracketOrder`.
pub mod order;

/// `Quote` - last traded price plus top-of-book snapshot.
pub mod quote;

/// `MarketDepth` - ordered order-book levels.
pub mod depth;

/// `Position` - intraday/open exposure.
pub mod position;

/// `Holding` - settled portfolio entry.
pub mod holding;

/// `Funds` - account cash/margin summary.
pub mod funds;

/// `Trade` - single fill (partial or full) against an order.
pub mod trade;

/// `Tick` and `StreamMode` - single real-time price update delivered over the streaming channel.
pub mod tick;

/// `Candle` and `Timeframe` for historical OHLCV queries.
pub mod candle;
