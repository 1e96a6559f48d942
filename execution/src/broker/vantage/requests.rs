use super::mapping::VantageMapping;
use chrono::{DateTime, Utc};
use meridian_instrument::mapping::BrokerMapping;
use meridian_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Venue-assigned numeric instrument id resolved via the master-contract port (`spec.md` §4.I)
/// before any request referencing a symbol is built.
pub type VantageInstrumentId = String;

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub instrument_id: VantageInstrumentId,
    pub client_order_id: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub quantity: u64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub product: &'static str,
    pub validity: &'static str,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub body: PlaceOrderBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub status: String,
    pub message: Option<String>,
}

impl RestRequest for PlaceOrderRequest {
    type Response = PlaceOrderResponse;
    type QueryParams = ();
    type Body = PlaceOrderBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/orders")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ModifyOrderBody {
    pub quantity: Option<u64>,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub validity: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ModifyOrderRequest {
    pub order_id: String,
    pub body: ModifyOrderBody,
}

impl RestRequest for ModifyOrderRequest {
    type Response = PlaceOrderResponse;
    type QueryParams = ();
    type Body = ModifyOrderBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/orders/{}", self.order_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::PUT
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct CancelOrderRequest {
    pub order_id: String,
}

impl RestRequest for CancelOrderRequest {
    type Response = PlaceOrderResponse;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/orders/{}", self.order_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::DELETE
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageOrder {
    pub order_id: String,
    pub client_order_id: String,
    pub instrument_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: String,
    pub order_type: String,
    pub quantity: u64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub product: String,
    pub validity: String,
    pub status: String,
    pub filled_quantity: u64,
    pub avg_fill_price: Option<Decimal>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exchange_order_id: Option<String>,
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetOrdersRequest;

impl RestRequest for GetOrdersRequest {
    type Response = Vec<VantageOrder>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/orders")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageTrade {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: String,
    pub quantity: u64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GetTradesRequest;

impl RestRequest for GetTradesRequest {
    type Response = Vec<VantageTrade>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/trades")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantagePosition {
    pub symbol: String,
    pub exchange: String,
    pub product: String,
    pub quantity: i64,
    pub buy_quantity: u64,
    pub sell_quantity: u64,
    pub buy_value: Decimal,
    pub sell_value: Decimal,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub day_pnl: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct GetPositionsRequest;

impl RestRequest for GetPositionsRequest {
    type Response = Vec<VantagePosition>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/positions")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageHolding {
    pub symbol: String,
    pub exchange: String,
    pub quantity: u64,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub isin: Option<String>,
    pub pledged_quantity: Option<u64>,
    pub collateral_quantity: Option<u64>,
    pub t1_quantity: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GetHoldingsRequest;

impl RestRequest for GetHoldingsRequest {
    type Response = Vec<VantageHolding>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/holdings")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageFunds {
    pub available_cash: Decimal,
    pub used_margin: Decimal,
    pub available_margin: Decimal,
    pub total_balance: Decimal,
    pub currency: String,
    pub collateral: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct GetFundsRequest;

impl RestRequest for GetFundsRequest {
    type Response = VantageFunds;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/funds")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageQuote {
    pub last_price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub bid: Decimal,
    pub bid_quantity: u64,
    pub ask: Decimal,
    pub ask_quantity: u64,
    pub volume: u64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetQuoteRequest {
    pub instrument_id: VantageInstrumentId,
}

impl RestRequest for GetQuoteRequest {
    type Response = VantageQuote;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/quotes/{}", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageDepthLevel {
    pub price: Decimal,
    pub quantity: u64,
    pub orders: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageDepth {
    pub bids: Vec<VantageDepthLevel>,
    pub asks: Vec<VantageDepthLevel>,
}

#[derive(Debug, Clone)]
pub struct GetMarketDepthRequest {
    pub instrument_id: VantageInstrumentId,
}

impl RestRequest for GetMarketDepthRequest {
    type Response = VantageDepth;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/depth/{}", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetOhlcvParams {
    pub timeframe: &'static str,
    pub from_ms: i64,
    pub to_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetOhlcvRequest {
    pub instrument_id: VantageInstrumentId,
    pub params: GetOhlcvParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageCandle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub timestamp_ms: i64,
}

impl RestRequest for GetOhlcvRequest {
    type Response = Vec<VantageCandle>;
    type QueryParams = GetOhlcvParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/candles/{}", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalculateMarginBody {
    pub orders: Vec<PlaceOrderBody>,
}

#[derive(Debug, Clone)]
pub struct CalculateMarginRequest {
    pub body: CalculateMarginBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VantageMarginEstimate {
    pub total_margin: Decimal,
    pub initial_margin: Decimal,
}

impl RestRequest for CalculateMarginRequest {
    type Response = VantageMarginEstimate;
    type QueryParams = ();
    type Body = CalculateMarginBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/margins")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

/// Helper used by [`super::client::VantageClient`] to translate a canonical order into the
/// wire body via this venue's [`VantageMapping`] tables (`spec.md` §4.B algorithm step 2-3:
/// "build venue request... inject price/trigger only when the type mandates it").
pub fn place_order_body(
    mapping: &VantageMapping,
    instrument_id: VantageInstrumentId,
    order: &meridian_instrument::order::NewOrder,
) -> PlaceOrderBody {
    PlaceOrderBody {
        instrument_id,
        client_order_id: order.client_order_id.to_string(),
        side: mapping.to_broker(order.side),
        order_type: mapping.to_broker(order.kind),
        quantity: order.quantity,
        price: order.price,
        trigger_price: order.trigger_price,
        product: mapping.to_broker(order.product),
        validity: mapping.to_broker(order.validity),
        tag: order.tag.clone(),
    }
}
