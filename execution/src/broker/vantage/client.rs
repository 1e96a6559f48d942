use super::{
    mapping::VantageMapping,
    parser::VantageParser,
    requests::{
        self, CalculateMarginBody, CalculateMarginRequest, CancelOrderRequest, GetFundsRequest,
        GetHoldingsRequest, GetMarketDepthRequest, GetOhlcvParams, GetOhlcvRequest,
        GetOrdersRequest, GetPositionsRequest, GetQuoteRequest, GetTradesRequest, ModifyOrderBody,
        ModifyOrderRequest, PlaceOrderRequest,
    },
};
use crate::{
    adapter::{
        AuthResponse, BrokerAdapter, Credentials, InstrumentCache, MarginEstimate, OrderResult,
        TickSource, retry_read,
    },
    config::BrokerConfig,
    error::GatewayError,
    ports::master_contract::MasterContractPort,
    ports::notification::NotificationPort,
    rate_limit::TokenBucket,
    session::{AuthState, BrokerSession},
    stream_worker::{StreamCodec, StreamWorker},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use meridian_instrument::{
    candle::{Candle, Timeframe},
    depth::{DepthLevel, MarketDepth},
    exchange::Symbol,
    funds::Funds,
    holding::Holding,
    ids::{BrokerId, OrderId, SubscriptionId},
    mapping::BrokerMapping,
    order::{NewOrder, Order, OrderPatch},
    position::Position,
    quote::Quote,
    tick::{StreamMode, Tick},
    trade::Trade,
};
use meridian_integration::protocol::http::{private::RequestSigner, rest::client::RestClient};
use parking_lot::{Mutex, RwLock};
use sha2::Sha256;
use std::{borrow::Cow, sync::Arc, time::Duration};

use super::signer::VantageSigner;

/// Credentials the signer needs once `authenticate` has succeeded.
#[derive(Debug, Clone)]
struct VantageCredentials {
    api_key: String,
    api_secret: String,
}

/// Adapter for the Vantage venue: HMAC-SHA256-signed REST + JSON-over-WSS streaming, the Indian
/// cash-equity dialect described in `spec.md` §6.
///
/// A REST client plus a background streaming task sharing one `BrokerSession`, implementing
/// the venue-agnostic [`BrokerAdapter`] capability set.
pub struct VantageClient {
    broker_id: BrokerId,
    http_client: reqwest::Client,
    base_url: String,
    parser: VantageParser,
    credentials: RwLock<Option<VantageCredentials>>,
    session: Arc<Mutex<BrokerSession>>,
    rate_limiter: TokenBucket,
    read_rate_limiter: TokenBucket,
    mapping: VantageMapping,
    instrument_cache: Mutex<InstrumentCache>,
    master_contract: Arc<dyn MasterContractPort>,
    stream: StreamWorker,
}

struct VantageStreamCodec;

impl StreamCodec for VantageStreamCodec {
    fn subscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol, mode: StreamMode) -> String {
        let channel = match mode {
            StreamMode::Quote => "quote",
            StreamMode::Full => "depth",
        };
        serde_json::json!({
            "action": "subscribe",
            "sub_id": sub_id.to_string(),
            "channel": channel,
            "symbol": symbol.to_string(),
        })
        .to_string()
    }

    fn unsubscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol) -> String {
        serde_json::json!({
            "action": "unsubscribe",
            "sub_id": sub_id.to_string(),
            "symbol": symbol.to_string(),
        })
        .to_string()
    }

    fn parse_tick(&self, broker_id: &BrokerId, text: &str) -> Option<Tick> {
        #[derive(serde::Deserialize)]
        struct WireTick {
            symbol: String,
            last_price: rust_decimal::Decimal,
            last_qty: Option<u64>,
            bid: Option<rust_decimal::Decimal>,
            ask: Option<rust_decimal::Decimal>,
            volume: Option<u64>,
            timestamp_ms: i64,
        }

        let wire: WireTick = serde_json::from_str(text).ok()?;
        let symbol: Symbol = wire.symbol.parse().ok()?;
        Some(Tick {
            broker_id: broker_id.clone(),
            symbol,
            last_price: wire.last_price,
            last_qty: wire.last_qty,
            bid: wire.bid,
            ask: wire.ask,
            volume: wire.volume,
            timestamp_ms: wire.timestamp_ms,
        })
    }
}

impl VantageClient {
    pub fn new(
        config: &BrokerConfig,
        master_contract: Arc<dyn MasterContractPort>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Self {
        let session = Arc::new(Mutex::new(BrokerSession::new(
            config.broker_id.clone(),
            config.paper_mode,
        )));

        let stream = StreamWorker::spawn_with_notifications(
            config.broker_id.clone(),
            config.websocket_base_url.clone(),
            Arc::new(VantageStreamCodec),
            session.clone(),
            notifications,
        );

        Self {
            broker_id: config.broker_id.clone(),
            http_client: reqwest::Client::new(),
            base_url: config.rest_base_url.clone(),
            parser: VantageParser::new(config.broker_id.clone()),
            credentials: RwLock::new(None),
            session,
            rate_limiter: TokenBucket::new(config.rate_limit.orders_per_second),
            read_rate_limiter: TokenBucket::new(config.rate_limit.quotes_per_second),
            mapping: VantageMapping,
            instrument_cache: Mutex::new(InstrumentCache::new()),
            master_contract,
            stream,
        }
    }

    fn rest(
        &self,
    ) -> Result<RestClient<'static, RequestSigner<VantageSigner, Hmac<Sha256>, meridian_integration::protocol::http::private::encoder::HexEncoder>, VantageParser>, GatewayError>
    {
        let guard = self.credentials.read();
        let credentials = guard.as_ref().ok_or_else(|| {
            GatewayError::invalid_token("vantage: authenticate must be called first")
                .with_broker(self.broker_id.clone())
        })?;

        let mac = Hmac::<Sha256>::new_from_slice(credentials.api_secret.as_bytes())
            .map_err(|_| GatewayError::internal("vantage: api_secret is not a valid HMAC key"))?;

        Ok(RestClient {
            http_client: self.http_client.clone(),
            base_url: Cow::Owned(self.base_url.clone()),
            strategy: RequestSigner::new(
                VantageSigner::new(credentials.api_key.clone()),
                mac,
                meridian_integration::protocol::http::private::encoder::HexEncoder,
            ),
            parser: self.parser.clone(),
        })
    }

    async fn resolve_instrument(&self, symbol: &Symbol) -> Result<String, GatewayError> {
        if let Some(id) = self.instrument_cache.lock().get(symbol).cloned() {
            return Ok(id);
        }

        let contract = self
            .master_contract
            .lookup(&self.broker_id, symbol)
            .await
            .ok_or_else(|| {
                GatewayError::instrument_not_found(format!("no master contract entry for {symbol}"))
                    .with_broker(self.broker_id.clone())
            })?;

        self.instrument_cache
            .lock()
            .insert(symbol.clone(), contract.instrument_id.clone());

        Ok(contract.instrument_id)
    }

    fn map_order(&self, wire: requests::VantageOrder) -> Result<Order, GatewayError> {
        let symbol_str = format!("{}:{}", wire.symbol, wire.exchange);
        let symbol: Symbol = symbol_str
            .parse()
            .map_err(|_| GatewayError::internal(format!("vantage: unparseable symbol {symbol_str}")))?;

        Ok(Order {
            id: OrderId::new(wire.order_id),
            client_order_id: meridian_instrument::ids::ClientOrderId::new(wire.client_order_id),
            broker_id: self.broker_id.clone(),
            symbol,
            side: self.mapping.from_broker(&wire.side),
            kind: self.mapping.from_broker(&wire.order_type),
            quantity: wire.quantity,
            price: wire.price,
            trigger_price: wire.trigger_price,
            product: self.mapping.from_broker(&wire.product),
            validity: self.mapping.from_broker(&wire.validity),
            status: self.mapping.from_broker(&wire.status),
            filled_qty: wire.filled_quantity,
            avg_fill_price: wire.avg_fill_price,
            placed_at: wire.placed_at,
            updated_at: wire.updated_at,
            exchange_order_id: wire.exchange_order_id,
            status_message: wire.status_message,
        })
    }
}

impl BrokerAdapter for VantageClient {
    const BROKER_ID: &'static str = "vantage";

    fn broker_id(&self) -> BrokerId {
        self.broker_id.clone()
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        let (api_key, api_secret) = match (credentials.api_key, credentials.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                return Err(GatewayError::invalid_input(
                    "vantage authentication requires api_key and api_secret",
                )
                .with_broker(self.broker_id.clone()));
            }
        };

        *self.credentials.write() = Some(VantageCredentials {
            api_key: api_key.clone(),
            api_secret,
        });

        let mut session = self.session.lock();
        session.auth_state = AuthState::Authenticated;
        session.access_token = Some(api_key.clone());
        session.token_expires_at = None;

        Ok(AuthResponse {
            success: true,
            message: "authenticated".to_string(),
            user_id: None,
            access_token: Some(api_key),
            refresh_token: None,
            expires_at: None,
        })
    }

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError> {
        // Vantage HMAC credentials do not expire; refresh is a no-op confirming auth state.
        if self.session.lock().is_authenticated() {
            Ok(AuthResponse {
                success: true,
                message: "vantage credentials do not expire".to_string(),
                user_id: None,
                access_token: self.session.lock().access_token.clone(),
                refresh_token: None,
                expires_at: None,
            })
        } else {
            Err(GatewayError::invalid_token("vantage: not authenticated").with_broker(self.broker_id.clone()))
        }
    }

    fn oauth_url(&self, _client_id: &str) -> String {
        String::new()
    }

    async fn exchange_code_for_token(
        &self,
        _code: &str,
        _client_id: &str,
        _client_secret: &str,
        _redirect_uri: &str,
    ) -> Result<AuthResponse, GatewayError> {
        Err(GatewayError::not_supported("ExchangeCodeForToken").with_broker(self.broker_id.clone()))
    }

    async fn place_order(&self, order: &NewOrder) -> OrderResult {
        if let Err(error) = order.validate() {
            return OrderResult::failed(
                self.broker_id.clone(),
                GatewayError::invalid_order(error.to_string()),
            );
        }

        let instrument_id = match self.resolve_instrument(&order.symbol).await {
            Ok(id) => id,
            Err(error) => return OrderResult::failed(self.broker_id.clone(), error),
        };

        if let Err(error) = self.rate_limiter.acquire(Duration::from_secs(5)).await {
            return OrderResult::failed(self.broker_id.clone(), error);
        }

        let rest = match self.rest() {
            Ok(rest) => rest,
            Err(error) => return OrderResult::failed(self.broker_id.clone(), error),
        };

        let body = requests::place_order_body(&self.mapping, instrument_id, order);
        match rest.execute(PlaceOrderRequest { body }).await {
            Ok((response, _latency)) => OrderResult::ok(
                self.broker_id.clone(),
                OrderId::new(response.order_id),
                response.message.unwrap_or_else(|| "order placed".to_string()),
            ),
            Err(error) => OrderResult::failed(self.broker_id.clone(), error),
        }
    }

    async fn modify_order(&self, id: &OrderId, patch: &OrderPatch) -> OrderResult {
        if let Err(error) = self.rate_limiter.acquire(Duration::from_secs(5)).await {
            return OrderResult::failed(self.broker_id.clone(), error);
        }

        let rest = match self.rest() {
            Ok(rest) => rest,
            Err(error) => return OrderResult::failed(self.broker_id.clone(), error),
        };

        let body = ModifyOrderBody {
            quantity: patch.quantity,
            price: patch.price,
            trigger_price: patch.trigger_price,
            validity: patch.validity.map(|validity| self.mapping.to_broker(validity)),
        };

        match rest
            .execute(ModifyOrderRequest {
                order_id: id.to_string(),
                body,
            })
            .await
        {
            Ok((response, _latency)) => OrderResult::ok(
                self.broker_id.clone(),
                OrderId::new(response.order_id),
                response.message.unwrap_or_else(|| "order modified".to_string()),
            ),
            Err(error) => OrderResult::failed(self.broker_id.clone(), error),
        }
    }

    async fn cancel_order(&self, id: &OrderId) -> OrderResult {
        if let Err(error) = self.rate_limiter.acquire(Duration::from_secs(5)).await {
            return OrderResult::failed(self.broker_id.clone(), error);
        }

        let rest = match self.rest() {
            Ok(rest) => rest,
            Err(error) => return OrderResult::failed(self.broker_id.clone(), error),
        };

        match rest
            .execute(CancelOrderRequest {
                order_id: id.to_string(),
            })
            .await
        {
            Ok((response, _latency)) => OrderResult::ok(
                self.broker_id.clone(),
                OrderId::new(response.order_id),
                response.message.unwrap_or_else(|| "order cancelled".to_string()),
            ),
            Err(error) => OrderResult::failed(self.broker_id.clone(), error),
        }
    }

    async fn get_orders(&self) -> Result<Vec<Order>, GatewayError> {
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        let wire = retry_read(Self::BROKER_ID, "get_orders", || async {
            let rest = self.rest()?;
            rest.execute(GetOrdersRequest).await.map(|(response, _)| response)
        })
        .await?;

        wire.into_iter().map(|order| self.map_order(order)).collect()
    }

    async fn get_trades(&self) -> Result<Vec<Trade>, GatewayError> {
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        let wire = retry_read(Self::BROKER_ID, "get_trades", || async {
            let rest = self.rest()?;
            rest.execute(GetTradesRequest).await.map(|(response, _)| response)
        })
        .await?;

        wire.into_iter()
            .map(|trade| {
                let symbol_str = format!("{}:{}", trade.symbol, trade.exchange);
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("vantage: unparseable symbol {symbol_str}")))?;
                Ok(Trade {
                    id: meridian_instrument::ids::TradeId::new(trade.trade_id),
                    order_id: OrderId::new(trade.order_id),
                    broker_id: self.broker_id.clone(),
                    symbol,
                    side: self.mapping.from_broker(&trade.side),
                    quantity: trade.quantity,
                    price: trade.price,
                    executed_at: trade.executed_at,
                })
            })
            .collect()
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        let wire = retry_read(Self::BROKER_ID, "get_positions", || async {
            let rest = self.rest()?;
            rest.execute(GetPositionsRequest).await.map(|(response, _)| response)
        })
        .await?;

        wire.into_iter()
            .map(|position| {
                let symbol_str = format!("{}:{}", position.symbol, position.exchange);
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("vantage: unparseable symbol {symbol_str}")))?;
                Ok(Position {
                    symbol,
                    product: self.mapping.from_broker(&position.product),
                    quantity: position.quantity,
                    buy_qty: position.buy_quantity,
                    sell_qty: position.sell_quantity,
                    buy_value: position.buy_value,
                    sell_value: position.sell_value,
                    avg_price: position.avg_price,
                    last_price: position.last_price,
                    pnl: position.pnl,
                    pnl_percent: position.pnl_percent,
                    day_pnl: position.day_pnl,
                })
            })
            .collect()
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, GatewayError> {
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        let wire = retry_read(Self::BROKER_ID, "get_holdings", || async {
            let rest = self.rest()?;
            rest.execute(GetHoldingsRequest).await.map(|(response, _)| response)
        })
        .await?;

        wire.into_iter()
            .map(|holding| {
                // Vantage's holdings endpoint omits exchange; holdings settle NSE-only.
                Ok(Holding {
                    symbol: Symbol::new(&holding.symbol, meridian_instrument::exchange::Exchange::Nse),
                    quantity: holding.quantity,
                    avg_price: holding.avg_price,
                    last_price: holding.last_price,
                    invested_value: holding.invested_value,
                    current_value: holding.current_value,
                    pnl: holding.pnl,
                    pnl_percent: holding.pnl_percent,
                    isin: holding.isin,
                    pledged_qty: holding.pledged_quantity,
                    collateral_qty: holding.collateral_quantity,
                    t1_qty: holding.t1_quantity,
                })
            })
            .collect()
    }

    async fn get_funds(&self) -> Result<Funds, GatewayError> {
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_funds", || async {
            let rest = self.rest()?;
            let (funds, _latency) = rest.execute(GetFundsRequest).await?;
            Ok(Funds {
                available_cash: funds.available_cash,
                used_margin: funds.used_margin,
                available_margin: funds.available_margin,
                total_balance: funds.total_balance,
                currency: funds.currency,
                collateral: funds.collateral,
                unrealized_pnl: funds.unrealized_pnl,
                realized_pnl: funds.realized_pnl,
            })
        })
        .await
    }

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError> {
        let instrument_id = self.resolve_instrument(symbol).await?;
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_quote", || async {
            let rest = self.rest()?;
            let (quote, _latency) = rest
                .execute(GetQuoteRequest {
                    instrument_id: instrument_id.clone(),
                })
                .await?;
            Ok(Quote {
                symbol: symbol.clone(),
                last_price: quote.last_price,
                open: quote.open,
                high: quote.high,
                low: quote.low,
                close: quote.close,
                previous_close: quote.previous_close,
                change: quote.change,
                change_percent: quote.change_percent,
                bid: quote.bid,
                bid_qty: quote.bid_quantity,
                ask: quote.ask,
                ask_qty: quote.ask_quantity,
                volume: quote.volume,
                timestamp_ms: quote.timestamp_ms,
            })
        })
        .await
    }

    async fn get_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, GatewayError> {
        let instrument_id = self.resolve_instrument(symbol).await?;
        let wire_timeframe = match timeframe {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinute => "5m",
            Timeframe::FifteenMinute => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        };

        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_ohlcv", || async {
            let rest = self.rest()?;
            let (candles, _latency) = rest
                .execute(GetOhlcvRequest {
                    instrument_id: instrument_id.clone(),
                    params: GetOhlcvParams {
                        timeframe: wire_timeframe,
                        from_ms: from.timestamp_millis(),
                        to_ms: to.timestamp_millis(),
                    },
                })
                .await?;

            Ok(candles
                .into_iter()
                .map(|candle| Candle {
                    open: candle.open,
                    high: candle.high,
                    low: candle.low,
                    close: candle.close,
                    volume: candle.volume,
                    timestamp_ms: candle.timestamp_ms,
                })
                .collect())
        })
        .await
    }

    async fn get_market_depth(&self, symbol: &Symbol) -> Result<MarketDepth, GatewayError> {
        let instrument_id = self.resolve_instrument(symbol).await?;
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_market_depth", || async {
            let rest = self.rest()?;
            let (depth, _latency) = rest
                .execute(GetMarketDepthRequest {
                    instrument_id: instrument_id.clone(),
                })
                .await?;

            let to_level = |level: requests::VantageDepthLevel| DepthLevel {
                price: level.price,
                quantity: level.quantity,
                orders: level.orders,
            };

            let depth = MarketDepth {
                symbol: symbol.clone(),
                bids: depth.bids.into_iter().map(to_level).collect(),
                asks: depth.asks.into_iter().map(to_level).collect(),
            };
            depth.validate().map_err(|error| {
                GatewayError::internal(format!("vantage: invalid market depth: {error}"))
                    .with_broker(self.broker_id.clone())
            })?;

            Ok(depth)
        })
        .await
    }

    async fn subscribe(&self, symbol: &Symbol, mode: StreamMode) -> Result<SubscriptionId, GatewayError> {
        Ok(self.stream.subscribe(symbol.clone(), mode))
    }

    async fn unsubscribe(&self, symbol: &Symbol) -> Result<(), GatewayError> {
        self.stream.unsubscribe(symbol);
        Ok(())
    }

    async fn calculate_margin(&self, orders: &[NewOrder]) -> Result<MarginEstimate, GatewayError> {
        let mut bodies = Vec::with_capacity(orders.len());
        for order in orders {
            let instrument_id = self.resolve_instrument(&order.symbol).await?;
            bodies.push(requests::place_order_body(&self.mapping, instrument_id, order));
        }

        let rest = self.rest()?;
        let (estimate, _latency) = rest
            .execute(CalculateMarginRequest {
                body: CalculateMarginBody { orders: bodies },
            })
            .await?;

        Ok(MarginEstimate {
            total_margin: estimate.total_margin,
            initial_margin: estimate.initial_margin,
        })
    }
}

impl TickSource for VantageClient {
    fn subscribe_ticks(&self) -> tokio::sync::broadcast::Receiver<Tick> {
        self.stream.subscribe_ticks()
    }
}
