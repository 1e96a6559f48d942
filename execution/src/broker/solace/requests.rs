use super::mapping::SolaceMapping;
use chrono::{DateTime, Utc};
use meridian_instrument::mapping::BrokerMapping;
use meridian_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub type SolaceInstrumentId = String;

#[derive(Debug, Clone, Serialize)]
pub struct TokenExchangeBody {
    pub grant_type: &'static str,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenExchangeRequest {
    pub body: TokenExchangeBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub account_id: Option<String>,
}

impl RestRequest for TokenExchangeRequest {
    type Response = TokenExchangeResponse;
    type QueryParams = ();
    type Body = TokenExchangeBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/oauth/token")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub instrument_id: SolaceInstrumentId,
    pub client_order_id: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub product: &'static str,
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
        Cow::Borrowed("/v1/orders")
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
        Cow::Owned(format!("/v1/orders/{}", self.order_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::PATCH
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
        Cow::Owned(format!("/v1/orders/{}", self.order_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::DELETE
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceOrder {
    pub order_id: String,
    pub client_order_id: String,
    pub instrument_id: String,
    pub symbol: String,
    pub mic: String,
    pub side: String,
    pub order_type: String,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub product: String,
    pub time_in_force: String,
    pub status: String,
    pub filled_quantity: u64,
    pub avg_fill_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub venue_order_id: Option<String>,
    pub status_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetOrdersRequest;

impl RestRequest for GetOrdersRequest {
    type Response = Vec<SolaceOrder>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/orders")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceTrade {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub mic: String,
    pub side: String,
    pub quantity: u64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GetTradesRequest;

impl RestRequest for GetTradesRequest {
    type Response = Vec<SolaceTrade>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/trades")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolacePosition {
    pub symbol: String,
    pub mic: String,
    pub product: String,
    pub net_quantity: i64,
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
    type Response = Vec<SolacePosition>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/positions")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceHolding {
    pub symbol: String,
    pub mic: String,
    pub quantity: u64,
    pub avg_price: Decimal,
    pub last_price: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub isin: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetHoldingsRequest;

impl RestRequest for GetHoldingsRequest {
    type Response = Vec<SolaceHolding>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/holdings")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceFunds {
    pub cash_available: Decimal,
    pub margin_used: Decimal,
    pub margin_available: Decimal,
    pub total_equity: Decimal,
    pub currency: String,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct GetFundsRequest;

impl RestRequest for GetFundsRequest {
    type Response = SolaceFunds;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/account/funds")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceQuote {
    pub last_price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
    pub bid: Decimal,
    pub bid_size: u64,
    pub ask: Decimal,
    pub ask_size: u64,
    pub volume: u64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetQuoteRequest {
    pub instrument_id: SolaceInstrumentId,
}

impl RestRequest for GetQuoteRequest {
    type Response = SolaceQuote;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/v1/market-data/{}/quote", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceDepthLevel {
    pub price: Decimal,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceDepth {
    pub bids: Vec<SolaceDepthLevel>,
    pub asks: Vec<SolaceDepthLevel>,
}

#[derive(Debug, Clone)]
pub struct GetMarketDepthRequest {
    pub instrument_id: SolaceInstrumentId,
}

impl RestRequest for GetMarketDepthRequest {
    type Response = SolaceDepth;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/v1/market-data/{}/depth", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetOhlcvParams {
    pub interval: &'static str,
    pub from_ms: i64,
    pub to_ms: i64,
}

#[derive(Debug, Clone)]
pub struct GetOhlcvRequest {
    pub instrument_id: SolaceInstrumentId,
    pub params: GetOhlcvParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolaceCandle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub timestamp_ms: i64,
}

impl RestRequest for GetOhlcvRequest {
    type Response = Vec<SolaceCandle>;
    type QueryParams = GetOhlcvParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/v1/market-data/{}/candles", self.instrument_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

/// Translate a canonical order into the Solace wire body (`spec.md` §4.B algorithm step 2-3).
pub fn place_order_body(
    mapping: &SolaceMapping,
    instrument_id: SolaceInstrumentId,
    order: &meridian_instrument::order::NewOrder,
) -> PlaceOrderBody {
    PlaceOrderBody {
        instrument_id,
        client_order_id: order.client_order_id.to_string(),
        side: mapping.to_broker(order.side),
        order_type: mapping.to_broker(order.kind),
        quantity: order.quantity,
        limit_price: order.price,
        stop_price: order.trigger_price,
        product: mapping.to_broker(order.product),
        time_in_force: mapping.to_broker(order.validity),
    }
}
