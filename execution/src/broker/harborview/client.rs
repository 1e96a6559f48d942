use super::{
    mapping::HarborviewMapping,
    parser::HarborviewParser,
    requests::{
        self, CancelOrderRequest, GetFundsRequest, GetHoldingsRequest, GetMarketDepthRequest,
        GetOhlcvParams, GetOhlcvRequest, GetOrdersRequest, GetPositionsRequest, GetQuoteRequest,
        GetTradesRequest, ModifyOrderBody, ModifyOrderRequest, PlaceOrderRequest,
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
use meridian_instrument::{
    candle::{Candle, Timeframe},
    depth::{DepthLevel, MarketDepth},
    exchange::Symbol,
    funds::Funds,
    holding::Holding,
    ids::{BrokerId, ClientOrderId, OrderId, SubscriptionId, TradeId},
    mapping::BrokerMapping,
    order::{NewOrder, Order, OrderPatch},
    position::Position,
    quote::Quote,
    tick::{StreamMode, Tick},
    trade::Trade,
};
use meridian_integration::protocol::http::{private::StaticHeaderStrategy, rest::client::RestClient};
use parking_lot::{Mutex, RwLock};
use std::{borrow::Cow, sync::Arc, time::Duration};

/// Credentials needed to populate the `X-App-Id`/`X-Secret` static headers.
#[derive(Debug, Clone)]
struct HarborviewCredentials {
    app_id: String,
    secret: String,
}

/// Adapter for the Harborview venue: static `X-App-Id`/`X-Secret` header REST + JSON-over-WSS
/// streaming, the US dialect described in `spec.md` §6.
///
/// Same REST-client-plus-streaming-task shape as [`crate::broker::vantage::VantageClient`]; the
/// auth half needs no signing at all, unlike Vantage's HMAC or Solace's bearer token - so
/// `rest()` rebuilds a [`StaticHeaderStrategy`] from the stored credential pair on every call.
pub struct HarborviewClient {
    broker_id: BrokerId,
    http_client: reqwest::Client,
    base_url: String,
    parser: HarborviewParser,
    credentials: RwLock<Option<HarborviewCredentials>>,
    session: Arc<Mutex<BrokerSession>>,
    rate_limiter: TokenBucket,
    read_rate_limiter: TokenBucket,
    mapping: HarborviewMapping,
    instrument_cache: Mutex<InstrumentCache>,
    master_contract: Arc<dyn MasterContractPort>,
    stream: StreamWorker,
}

struct HarborviewStreamCodec;

impl StreamCodec for HarborviewStreamCodec {
    fn subscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol, mode: StreamMode) -> String {
        let feed = match mode {
            StreamMode::Quote => "trades",
            StreamMode::Full => "book",
        };
        serde_json::json!({
            "type": "subscribe",
            "req_id": sub_id.to_string(),
            "feed": feed,
            "ticker": symbol.to_string(),
        })
        .to_string()
    }

    fn unsubscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol) -> String {
        serde_json::json!({
            "type": "unsubscribe",
            "req_id": sub_id.to_string(),
            "ticker": symbol.to_string(),
        })
        .to_string()
    }

    fn parse_tick(&self, broker_id: &BrokerId, text: &str) -> Option<Tick> {
        #[derive(serde::Deserialize)]
        struct WireTick {
            ticker: String,
            price: rust_decimal::Decimal,
            size: Option<u64>,
            bid: Option<rust_decimal::Decimal>,
            ask: Option<rust_decimal::Decimal>,
            volume: Option<u64>,
            ts_ms: i64,
        }

        let wire: WireTick = serde_json::from_str(text).ok()?;
        let symbol: Symbol = wire.ticker.parse().ok()?;
        Some(Tick {
            broker_id: broker_id.clone(),
            symbol,
            last_price: wire.price,
            last_qty: wire.size,
            bid: wire.bid,
            ask: wire.ask,
            volume: wire.volume,
            timestamp_ms: wire.ts_ms,
        })
    }
}

impl HarborviewClient {
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
            Arc::new(HarborviewStreamCodec),
            session.clone(),
            notifications,
        );

        Self {
            broker_id: config.broker_id.clone(),
            http_client: reqwest::Client::new(),
            base_url: config.rest_base_url.clone(),
            parser: HarborviewParser::new(config.broker_id.clone()),
            credentials: RwLock::new(None),
            session,
            rate_limiter: TokenBucket::new(config.rate_limit.orders_per_second),
            read_rate_limiter: TokenBucket::new(config.rate_limit.quotes_per_second),
            mapping: HarborviewMapping,
            instrument_cache: Mutex::new(InstrumentCache::new()),
            master_contract,
            stream,
        }
    }

    fn rest(&self) -> Result<RestClient<'static, StaticHeaderStrategy, HarborviewParser>, GatewayError> {
        let guard = self.credentials.read();
        let credentials = guard.as_ref().ok_or_else(|| {
            GatewayError::invalid_token("harborview: authenticate must be called first")
                .with_broker(self.broker_id.clone())
        })?;

        Ok(RestClient {
            http_client: self.http_client.clone(),
            base_url: Cow::Owned(self.base_url.clone()),
            strategy: StaticHeaderStrategy::new(vec![
                ("X-App-Id", credentials.app_id.clone()),
                ("X-Secret", credentials.secret.clone()),
            ]),
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

    fn map_order(&self, wire: requests::HarborviewOrder) -> Result<Order, GatewayError> {
        let symbol_str = format!("{}:{}", wire.ticker, wire.exchange);
        let symbol: Symbol = symbol_str
            .parse()
            .map_err(|_| GatewayError::internal(format!("harborview: unparseable symbol {symbol_str}")))?;

        Ok(Order {
            id: OrderId::new(wire.order_id),
            client_order_id: ClientOrderId::new(wire.client_order_id),
            broker_id: self.broker_id.clone(),
            symbol,
            side: self.mapping.from_broker(&wire.side),
            kind: self.mapping.from_broker(&wire.order_type),
            quantity: wire.quantity,
            price: wire.limit_price,
            trigger_price: wire.stop_price,
            product: self.mapping.from_broker(&wire.account_type),
            validity: self.mapping.from_broker(&wire.time_in_force),
            status: self.mapping.from_broker(&wire.status),
            filled_qty: wire.filled_quantity,
            avg_fill_price: wire.avg_fill_price,
            placed_at: wire.submitted_at,
            updated_at: wire.updated_at,
            exchange_order_id: wire.exchange_order_id,
            status_message: wire.reject_reason,
        })
    }
}

impl BrokerAdapter for HarborviewClient {
    const BROKER_ID: &'static str = "harborview";

    fn broker_id(&self) -> BrokerId {
        self.broker_id.clone()
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        let (app_id, secret) = match (credentials.api_key, credentials.api_secret) {
            (Some(app_id), Some(secret)) => (app_id, secret),
            _ => {
                return Err(GatewayError::invalid_input(
                    "harborview authentication requires api_key (app id) and api_secret",
                )
                .with_broker(self.broker_id.clone()));
            }
        };

        *self.credentials.write() = Some(HarborviewCredentials {
            app_id: app_id.clone(),
            secret,
        });

        let mut session = self.session.lock();
        session.auth_state = AuthState::Authenticated;
        session.access_token = Some(app_id.clone());
        session.token_expires_at = None;

        Ok(AuthResponse {
            success: true,
            message: "authenticated".to_string(),
            user_id: None,
            access_token: Some(app_id),
            refresh_token: None,
            expires_at: None,
        })
    }

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError> {
        if self.session.lock().is_authenticated() {
            Ok(AuthResponse {
                success: true,
                message: "harborview credentials do not expire".to_string(),
                user_id: None,
                access_token: self.session.lock().access_token.clone(),
                refresh_token: None,
                expires_at: None,
            })
        } else {
            Err(GatewayError::invalid_token("harborview: not authenticated").with_broker(self.broker_id.clone()))
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

        let ticker_id = match self.resolve_instrument(&order.symbol).await {
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

        let body = requests::place_order_body(&self.mapping, ticker_id, order);
        match rest.execute(PlaceOrderRequest { body }).await {
            Ok((response, _latency)) => {
                OrderResult::ok(self.broker_id.clone(), OrderId::new(response.order_id), response.status)
            }
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
            limit_price: patch.price,
            stop_price: patch.trigger_price,
            time_in_force: patch.validity.map(|validity| self.mapping.to_broker(validity)),
        };

        match rest
            .execute(ModifyOrderRequest {
                order_id: id.to_string(),
                body,
            })
            .await
        {
            Ok((response, _latency)) => {
                OrderResult::ok(self.broker_id.clone(), OrderId::new(response.order_id), response.status)
            }
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
            Ok((response, _latency)) => {
                OrderResult::ok(self.broker_id.clone(), OrderId::new(response.order_id), response.status)
            }
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
            .map(|execution| {
                let symbol_str = format!("{}:{}", execution.ticker, execution.exchange);
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("harborview: unparseable symbol {symbol_str}")))?;
                Ok(Trade {
                    id: TradeId::new(execution.execution_id),
                    order_id: OrderId::new(execution.order_id),
                    broker_id: self.broker_id.clone(),
                    symbol,
                    side: self.mapping.from_broker(&execution.side),
                    quantity: execution.quantity,
                    price: execution.price,
                    executed_at: execution.executed_at,
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
                let symbol_str = format!("{}:{}", position.ticker, position.exchange);
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("harborview: unparseable symbol {symbol_str}")))?;
                Ok(Position {
                    symbol,
                    product: self.mapping.from_broker(&position.account_type),
                    quantity: position.quantity,
                    buy_qty: position.buy_quantity,
                    sell_qty: position.sell_quantity,
                    buy_value: position.buy_value,
                    sell_value: position.sell_value,
                    avg_price: position.avg_price,
                    last_price: position.last_price,
                    pnl: position.unrealized_pnl,
                    pnl_percent: position.unrealized_pnl_pct,
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
                let symbol_str = format!("{}:{}", holding.ticker, holding.exchange);
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("harborview: unparseable symbol {symbol_str}")))?;
                Ok(Holding {
                    symbol,
                    quantity: holding.quantity,
                    avg_price: holding.avg_price,
                    last_price: holding.last_price,
                    invested_value: holding.cost_basis,
                    current_value: holding.market_value,
                    pnl: holding.unrealized_pnl,
                    pnl_percent: holding.unrealized_pnl_pct,
                    isin: holding.cusip,
                    pledged_qty: None,
                    collateral_qty: None,
                    t1_qty: None,
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
                available_cash: funds.cash_balance,
                used_margin: funds.margin_used,
                available_margin: funds.buying_power,
                total_balance: funds.account_value,
                currency: funds.currency,
                collateral: None,
                unrealized_pnl: funds.unrealized_pnl,
                realized_pnl: funds.realized_pnl,
            })
        })
        .await
    }

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError> {
        let ticker_id = self.resolve_instrument(symbol).await?;
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_quote", || async {
            let rest = self.rest()?;
            let (quote, _latency) = rest
                .execute(GetQuoteRequest {
                    ticker_id: ticker_id.clone(),
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
                change: quote.net_change,
                change_percent: quote.pct_change,
                bid: quote.bid_price,
                bid_qty: quote.bid_size,
                ask: quote.ask_price,
                ask_qty: quote.ask_size,
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
        let ticker_id = self.resolve_instrument(symbol).await?;
        let resolution = match timeframe {
            Timeframe::OneMinute => "1",
            Timeframe::FiveMinute => "5",
            Timeframe::FifteenMinute => "15",
            Timeframe::OneHour => "60",
            Timeframe::OneDay => "D",
        };

        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_ohlcv", || async {
            let rest = self.rest()?;
            let (candles, _latency) = rest
                .execute(GetOhlcvRequest {
                    ticker_id: ticker_id.clone(),
                    params: GetOhlcvParams {
                        resolution,
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
        let ticker_id = self.resolve_instrument(symbol).await?;
        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_market_depth", || async {
            let rest = self.rest()?;
            let (depth, _latency) = rest
                .execute(GetMarketDepthRequest {
                    ticker_id: ticker_id.clone(),
                })
                .await?;

            let to_level = |level: requests::HarborviewDepthLevel| DepthLevel {
                price: level.price,
                quantity: level.quantity,
                orders: None,
            };

            let depth = MarketDepth {
                symbol: symbol.clone(),
                bids: depth.bids.into_iter().map(to_level).collect(),
                asks: depth.asks.into_iter().map(to_level).collect(),
            };
            depth.validate().map_err(|error| {
                GatewayError::internal(format!("harborview: invalid market depth: {error}"))
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

    async fn calculate_margin(&self, _orders: &[NewOrder]) -> Result<MarginEstimate, GatewayError> {
        Err(GatewayError::not_supported("CalculateMargin").with_broker(self.broker_id.clone()))
    }
}

impl TickSource for HarborviewClient {
    fn subscribe_ticks(&self) -> tokio::sync::broadcast::Receiver<Tick> {
        self.stream.subscribe_ticks()
    }
}

