use super::mapping::HarborviewMapping;
use chrono::{DateTime, Utc};
use meridian_instrument::mapping::BrokerMapping;
use meridian_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub type HarborviewInstrumentId = String;

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub ticker_id: HarborviewInstrumentId,
    pub client_order_id: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub account_type: &'static str,
    pub time_in_force: &'static str,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub body: PlaceOrderBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub status: String,
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
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: Option<&'static str>,
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
pub struct HarborviewOrder {
    pub order_id: String,
    pub client_order_id: String,
    pub ticker_id: String,
    pub ticker: String,
    pub exchange: String,
    pub side: String,
    pub order_type: String,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub account_type: String,
    pub time_in_force: String,
    pub status: String,
    pub filled_quantity: u64,
    pub avg_fill_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exchange_order_id: Option<String>,
    pub reject_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetOrdersRequest;

impl RestRequest for GetOrdersRequest {
    type Response = Vec<HarborviewOrder>;
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
pub struct HarborviewExecution {
    pub execution_id: String,
    pub order_id: String,
    pub ticker: String,
    pub exchange: String,
    pub side: String,
    pub quantity: u64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GetTradesRequest;

impl RestRequest for GetTradesRequest {
    type Response = Vec<HarborviewExecution>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/executions")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewPosition {
    pub ticker: String,
    pub exchange: String,
    pub account_type: String,
    pub quantity: i64,
    pub buy_quantity: u64,
    pub sell_quantity: u64,
    pub buy_value: Decimal,
    pub sell_value: Decimal,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub day_pnl: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct GetPositionsRequest;

impl RestRequest for GetPositionsRequest {
    type Response = Vec<HarborviewPosition>;
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
pub struct HarborviewHolding {
    pub ticker: String,
    pub exchange: String,
    pub quantity: u64,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub cusip: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetHoldingsRequest;

impl RestRequest for GetHoldingsRequest {
    type Response = Vec<HarborviewHolding>;
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
pub struct HarborviewFunds {
    pub cash_balance: Decimal,
    pub margin_used: Decimal,
    pub buying_power: Decimal,
    pub account_value: Decimal,
    pub currency: String,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct GetFundsRequest;

impl RestRequest for GetFundsRequest {
    type Response = HarborviewFunds;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/account/funds")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewQuote {
    pub last_price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub previous_close: Decimal,
    pub net_change: Decimal,
    pub pct_change: Decimal,
    pub bid_price: Decimal,
    pub bid_size: u64,
    pub ask_price: Decimal,
    pub ask_size: u64,
    pub volume: u64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetQuoteRequest {
    pub ticker_id: HarborviewInstrumentId,
}

impl RestRequest for GetQuoteRequest {
    type Response = HarborviewQuote;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/marketdata/{}/quote", self.ticker_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewDepthLevel {
    pub price: Decimal,
    pub quantity: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewDepth {
    pub bids: Vec<HarborviewDepthLevel>,
    pub asks: Vec<HarborviewDepthLevel>,
}

#[derive(Debug, Clone)]
pub struct GetMarketDepthRequest {
    pub ticker_id: HarborviewInstrumentId,
}

impl RestRequest for GetMarketDepthRequest {
    type Response = HarborviewDepth;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/marketdata/{}/depth", self.ticker_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetOhlcvParams {
    pub resolution: &'static str,
    pub from_ms: i64,
    pub to_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetOhlcvRequest {
    pub ticker_id: HarborviewInstrumentId,
    pub params: GetOhlcvParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewCandle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub timestamp_ms: i64,
}

impl RestRequest for GetOhlcvRequest {
    type Response = Vec<HarborviewCandle>;
    type QueryParams = GetOhlcvParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/marketdata/{}/candles", self.ticker_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

/// Translate a canonical order into the Harborview wire body (`spec.md` §4.B algorithm step 2-3).
pub fn place_order_body(
    mapping: &HarborviewMapping,
    ticker_id: HarborviewInstrumentId,
    order: &meridian_instrument::order::NewOrder,
) -> PlaceOrderBody {
    PlaceOrderBody {
        ticker_id,
        client_order_id: order.client_order_id.to_string(),
        side: mapping.to_broker(order.side),
        order_type: mapping.to_broker(order.kind),
        quantity: order.quantity,
        limit_price: order.price,
        stop_price: order.trigger_price,
        account_type: mapping.to_broker(order.product),
        time_in_force: mapping.to_broker(order.validity),
    }
}
