use super::{
    mapping::SolaceMapping,
    parser::SolaceParser,
    requests::{
        self, CancelOrderRequest, GetFundsRequest, GetHoldingsRequest, GetMarketDepthRequest,
        GetOhlcvParams, GetOhlcvRequest, GetOrdersRequest, GetPositionsRequest, GetQuoteRequest,
        GetTradesRequest, ModifyOrderBody, ModifyOrderRequest, PlaceOrderRequest,
        TokenExchangeBody, TokenExchangeRequest,
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
use chrono::{DateTime, Duration as ChronoDuration, Utc};
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
use meridian_integration::protocol::http::{
    private::{BearerTokenStrategy, PublicStrategy},
    rest::client::RestClient,
};
use parking_lot::{Mutex, RwLock};
use std::{borrow::Cow, sync::Arc, time::Duration};

/// Adapter for the Solace venue: OAuth2 bearer-token REST + JSON-over-WSS streaming, the European
/// dialect described in `spec.md` §6.
///
/// Same REST-client-plus-streaming-task shape as [`crate::broker::vantage::VantageClient`]; the
/// auth half follows the `AuthManager`'s OAuth flow from `spec.md` §4.C instead of Vantage's
/// static HMAC keypair.
pub struct SolaceClient {
    broker_id: BrokerId,
    http_client: reqwest::Client,
    base_url: String,
    parser: SolaceParser,
    access_token: RwLock<Option<String>>,
    session: Arc<Mutex<BrokerSession>>,
    rate_limiter: TokenBucket,
    read_rate_limiter: TokenBucket,
    mapping: SolaceMapping,
    instrument_cache: Mutex<InstrumentCache>,
    master_contract: Arc<dyn MasterContractPort>,
    stream: StreamWorker,
}

struct SolaceStreamCodec;

impl StreamCodec for SolaceStreamCodec {
    fn subscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol, mode: StreamMode) -> String {
        let channel = match mode {
            StreamMode::Quote => "top_of_book",
            StreamMode::Full => "order_book",
        };
        serde_json::json!({
            "op": "subscribe",
            "id": sub_id.to_string(),
            "channel": channel,
            "instrument": symbol.to_string(),
        })
        .to_string()
    }

    fn unsubscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol) -> String {
        serde_json::json!({
            "op": "unsubscribe",
            "id": sub_id.to_string(),
            "instrument": symbol.to_string(),
        })
        .to_string()
    }

    fn parse_tick(&self, broker_id: &BrokerId, text: &str) -> Option<Tick> {
        #[derive(serde::Deserialize)]
        struct WireTick {
            instrument: String,
            last_price: rust_decimal::Decimal,
            last_size: Option<u64>,
            bid: Option<rust_decimal::Decimal>,
            ask: Option<rust_decimal::Decimal>,
            volume: Option<u64>,
            ts_ms: i64,
        }

        let wire: WireTick = serde_json::from_str(text).ok()?;
        let symbol: Symbol = wire.instrument.parse().ok()?;
        Some(Tick {
            broker_id: broker_id.clone(),
            symbol,
            last_price: wire.last_price,
            last_qty: wire.last_size,
            bid: wire.bid,
            ask: wire.ask,
            volume: wire.volume,
            timestamp_ms: wire.ts_ms,
        })
    }
}

impl SolaceClient {
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
            Arc::new(SolaceStreamCodec),
            session.clone(),
            notifications,
        );

        Self {
            broker_id: config.broker_id.clone(),
            http_client: reqwest::Client::new(),
            base_url: config.rest_base_url.clone(),
            parser: SolaceParser::new(config.broker_id.clone()),
            access_token: RwLock::new(None),
            session,
            rate_limiter: TokenBucket::new(config.rate_limit.orders_per_second),
            read_rate_limiter: TokenBucket::new(config.rate_limit.quotes_per_second),
            mapping: SolaceMapping,
            instrument_cache: Mutex::new(InstrumentCache::new()),
            master_contract,
            stream,
        }
    }

    fn public_rest(&self) -> RestClient<'static, PublicStrategy, SolaceParser> {
        RestClient {
            http_client: self.http_client.clone(),
            base_url: Cow::Owned(self.base_url.clone()),
            strategy: PublicStrategy,
            parser: self.parser.clone(),
        }
    }

    fn rest(&self) -> Result<RestClient<'static, BearerTokenStrategy, SolaceParser>, GatewayError> {
        let token = self.access_token.read().clone().ok_or_else(|| {
            GatewayError::invalid_token("solace: authenticate must be called first")
                .with_broker(self.broker_id.clone())
        })?;

        Ok(RestClient {
            http_client: self.http_client.clone(),
            base_url: Cow::Owned(self.base_url.clone()),
            strategy: BearerTokenStrategy::new(token),
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

    fn apply_token_response(&self, response: &requests::TokenExchangeResponse) {
        *self.access_token.write() = Some(response.access_token.clone());

        let mut session = self.session.lock();
        session.auth_state = AuthState::Authenticated;
        session.access_token = Some(response.access_token.clone());
        session.refresh_token = response.refresh_token.clone().or(session.refresh_token.clone());
        session.token_expires_at = response
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        session.account_key = response.account_id.clone();
    }

    fn map_order(&self, wire: requests::SolaceOrder) -> Result<Order, GatewayError> {
        let symbol_str = format!("{}:{}", wire.symbol, mic_to_exchange(&wire.mic));
        let symbol: Symbol = symbol_str
            .parse()
            .map_err(|_| GatewayError::internal(format!("solace: unparseable symbol {symbol_str}")))?;

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
            product: self.mapping.from_broker(&wire.product),
            validity: self.mapping.from_broker(&wire.time_in_force),
            status: self.mapping.from_broker(&wire.status),
            filled_qty: wire.filled_quantity,
            avg_fill_price: wire.avg_fill_price,
            placed_at: wire.created_at,
            updated_at: wire.updated_at,
            exchange_order_id: wire.venue_order_id,
            status_message: wire.status_reason,
        })
    }
}

/// Solace identifies venues by ISO 10383 MIC rather than this gateway's [`Exchange`](meridian_instrument::exchange::Exchange)
/// enum; only the MICs this gateway's supported exchanges correspond to are recognised.
fn mic_to_exchange(mic: &str) -> &'static str {
    match mic {
        "XLON" => "LSE",
        "XETR" => "XETRA",
        "XNYS" => "NYSE",
        "XNAS" => "NASDAQ",
        _ => "LSE",
    }
}

impl BrokerAdapter for SolaceClient {
    const BROKER_ID: &'static str = "solace";

    fn broker_id(&self) -> BrokerId {
        self.broker_id.clone()
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        let access_token = credentials.access_token.ok_or_else(|| {
            GatewayError::invalid_input("solace authentication requires a pre-exchanged access_token")
                .with_broker(self.broker_id.clone())
        })?;

        *self.access_token.write() = Some(access_token.clone());

        let mut session = self.session.lock();
        session.auth_state = AuthState::Authenticated;
        session.access_token = Some(access_token.clone());
        session.refresh_token = credentials.refresh_token;

        Ok(AuthResponse {
            success: true,
            message: "authenticated".to_string(),
            user_id: None,
            access_token: Some(access_token),
            refresh_token: None,
            expires_at: None,
        })
    }

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError> {
        let refresh_token = self
            .session
            .lock()
            .refresh_token
            .clone()
            .ok_or_else(|| GatewayError::invalid_token("solace: no refresh_token on file").with_broker(self.broker_id.clone()))?;

        self.session.lock().auth_state = AuthState::Refreshing;

        let body = TokenExchangeBody {
            grant_type: "refresh_token",
            code: None,
            refresh_token: Some(refresh_token),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
        };

        let rest = self.public_rest();
        match rest.execute(TokenExchangeRequest { body }).await {
            Ok((response, _latency)) => {
                self.apply_token_response(&response);
                Ok(AuthResponse {
                    success: true,
                    message: "token refreshed".to_string(),
                    user_id: response.account_id.clone(),
                    access_token: Some(response.access_token.clone()),
                    refresh_token: response.refresh_token.clone(),
                    expires_at: response.expires_in.map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
                })
            }
            Err(error) => {
                self.session.lock().auth_state = AuthState::Failed;
                Err(error)
            }
        }
    }

    fn oauth_url(&self, client_id: &str) -> String {
        format!(
            "{}/oauth/authorize?response_type=code&client_id={client_id}&scope=trading",
            self.base_url
        )
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<AuthResponse, GatewayError> {
        let body = TokenExchangeBody {
            grant_type: "authorization_code",
            code: Some(code.to_string()),
            refresh_token: None,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: Some(redirect_uri.to_string()),
        };

        let rest = self.public_rest();
        let (response, _latency) = rest.execute(TokenExchangeRequest { body }).await?;
        self.apply_token_response(&response);

        Ok(AuthResponse {
            success: true,
            message: "authorization code exchanged".to_string(),
            user_id: response.account_id.clone(),
            access_token: Some(response.access_token.clone()),
            refresh_token: response.refresh_token.clone(),
            expires_at: response.expires_in.map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
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
            .map(|trade| {
                let symbol_str = format!("{}:{}", trade.symbol, mic_to_exchange(&trade.mic));
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("solace: unparseable symbol {symbol_str}")))?;
                Ok(Trade {
                    id: TradeId::new(trade.trade_id),
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
                let symbol_str = format!("{}:{}", position.symbol, mic_to_exchange(&position.mic));
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("solace: unparseable symbol {symbol_str}")))?;
                Ok(Position {
                    symbol,
                    product: self.mapping.from_broker(&position.product),
                    quantity: position.net_quantity,
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
                let symbol_str = format!("{}:{}", holding.symbol, mic_to_exchange(&holding.mic));
                let symbol: Symbol = symbol_str
                    .parse()
                    .map_err(|_| GatewayError::internal(format!("solace: unparseable symbol {symbol_str}")))?;
                Ok(Holding {
                    symbol,
                    quantity: holding.quantity,
                    avg_price: holding.avg_price,
                    last_price: holding.last_price,
                    invested_value: holding.invested_value,
                    current_value: holding.current_value,
                    pnl: holding.unrealized_pnl,
                    pnl_percent: holding.unrealized_pnl_pct,
                    isin: holding.isin,
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
                available_cash: funds.cash_available,
                used_margin: funds.margin_used,
                available_margin: funds.margin_available,
                total_balance: funds.total_equity,
                currency: funds.currency,
                collateral: None,
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
                change_percent: quote.change_pct,
                bid: quote.bid,
                bid_qty: quote.bid_size,
                ask: quote.ask,
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
        let instrument_id = self.resolve_instrument(symbol).await?;
        let interval = match timeframe {
            Timeframe::OneMinute => "PT1M",
            Timeframe::FiveMinute => "PT5M",
            Timeframe::FifteenMinute => "PT15M",
            Timeframe::OneHour => "PT1H",
            Timeframe::OneDay => "P1D",
        };

        self.read_rate_limiter.acquire(Duration::from_secs(5)).await?;
        retry_read(Self::BROKER_ID, "get_ohlcv", || async {
            let rest = self.rest()?;
            let (candles, _latency) = rest
                .execute(GetOhlcvRequest {
                    instrument_id: instrument_id.clone(),
                    params: GetOhlcvParams {
                        interval,
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

            let to_level = |level: requests::SolaceDepthLevel| DepthLevel {
                price: level.price,
                quantity: level.size,
                orders: None,
            };

            let depth = MarketDepth {
                symbol: symbol.clone(),
                bids: depth.bids.into_iter().map(to_level).collect(),
                asks: depth.asks.into_iter().map(to_level).collect(),
            };
            depth.validate().map_err(|error| {
                GatewayError::internal(format!("solace: invalid market depth: {error}"))
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

impl TickSource for SolaceClient {
    fn subscribe_ticks(&self) -> tokio::sync::broadcast::Receiver<Tick> {
        self.stream.subscribe_ticks()
    }
}
