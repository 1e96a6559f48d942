//! End-to-end routing scenarios against in-memory mock brokers: best-price selection with a
//! latency tiebreak, parallel fan-out with a partial failure, round-robin fairness, and
//! PRE_ORDER cancellation short-circuiting the real broker call.

use async_trait::async_trait;
use meridian_execution::adapter::{AuthResponse, BrokerAdapter, Credentials, OrderResult};
use meridian_execution::auth::AuthManager;
use meridian_execution::error::GatewayError;
use meridian_execution::ports::credentials::{CredentialsBlob, CredentialsPort};
use meridian_execution::orchestrator::Orchestrator;
use meridian_execution::plugin::{OrderOutcome, PluginPipeline};
use meridian_execution::router::{OrderRouter, RouteConfig, RouteStrategy};
use meridian_instrument::{
    candle::{Candle, Timeframe},
    depth::MarketDepth,
    exchange::{Exchange, Symbol},
    funds::Funds,
    holding::Holding,
    ids::{BrokerId, ClientOrderId, OrderId, SubscriptionId},
    mapping::{OrderType, Product, Side, Validity},
    order::{NewOrder, Order, OrderPatch},
    position::Position,
    quote::Quote,
    tick::StreamMode,
    trade::Trade,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

/// Controllable mock adapter: fixed quote, a configurable artificial delay (to model observed
/// latency), and an in-memory log of every `place_order` call.
struct MockAdapter {
    id: &'static str,
    bid: Decimal,
    ask: Decimal,
    delay: Duration,
    reject: bool,
    calls: Arc<Mutex<Vec<NewOrder>>>,
}

impl MockAdapter {
    fn new(id: &'static str, bid: Decimal, ask: Decimal, delay: Duration) -> Self {
        Self {
            id,
            bid,
            ask,
            delay,
            reject: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }
}

impl BrokerAdapter for MockAdapter {
    const BROKER_ID: &'static str = "mock";

    fn broker_id(&self) -> BrokerId {
        BrokerId::new(self.id)
    }

    async fn authenticate(&self, _credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        Ok(AuthResponse {
            success: true,
            message: "ok".to_string(),
            user_id: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
        })
    }

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError> {
        self.authenticate(Credentials {
            api_key: None,
            api_secret: None,
            access_token: None,
            refresh_token: None,
        })
        .await
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
        Err(GatewayError::not_supported("ExchangeCodeForToken"))
    }

    async fn place_order(&self, order: &NewOrder) -> OrderResult {
        self.calls.lock().push(order.clone());

        if self.reject {
            return OrderResult::failed(self.broker_id(), GatewayError::new(
                meridian_execution::error::ErrorKind::InsufficientFunds,
                "insufficient funds",
            ));
        }

        OrderResult::ok(self.broker_id(), OrderId::new(format!("{}-1", self.id)), "placed")
    }

    async fn modify_order(&self, _id: &OrderId, _patch: &OrderPatch) -> OrderResult {
        OrderResult::failed(self.broker_id(), GatewayError::not_supported("ModifyOrder"))
    }

    async fn cancel_order(&self, _id: &OrderId) -> OrderResult {
        OrderResult::failed(self.broker_id(), GatewayError::not_supported("CancelOrder"))
    }

    async fn get_orders(&self) -> Result<Vec<Order>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_trades(&self) -> Result<Vec<Trade>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_funds(&self) -> Result<Funds, GatewayError> {
        Ok(Funds {
            available_cash: Decimal::ZERO,
            used_margin: Decimal::ZERO,
            available_margin: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            currency: "INR".to_string(),
            collateral: None,
            unrealized_pnl: None,
            realized_pnl: None,
        })
    }

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(Quote {
            symbol: symbol.clone(),
            last_price: (self.bid + self.ask) / Decimal::from(2),
            open: self.bid,
            high: self.ask,
            low: self.bid,
            close: self.bid,
            previous_close: self.bid,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            bid: self.bid,
            bid_qty: 100,
            ask: self.ask,
            ask_qty: 100,
            volume: 1_000,
            timestamp_ms: 0,
        })
    }

    async fn get_ohlcv(
        &self,
        _symbol: &Symbol,
        _timeframe: Timeframe,
        _from: chrono::DateTime<chrono::Utc>,
        _to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Candle>, GatewayError> {
        Err(GatewayError::not_supported("GetOhlcv"))
    }

    async fn get_market_depth(&self, _symbol: &Symbol) -> Result<MarketDepth, GatewayError> {
        Err(GatewayError::not_supported("GetMarketDepth"))
    }

    async fn subscribe(&self, _symbol: &Symbol, _mode: StreamMode) -> Result<SubscriptionId, GatewayError> {
        Err(GatewayError::not_supported("Subscribe"))
    }

    async fn unsubscribe(&self, _symbol: &Symbol) -> Result<(), GatewayError> {
        Err(GatewayError::not_supported("Unsubscribe"))
    }
}

/// Local `CredentialsPort` double - every broker authenticates with an empty blob, none of
/// these scenarios exercise credential persistence itself.
#[derive(Default)]
struct EmptyCredentials;

#[async_trait]
impl CredentialsPort for EmptyCredentials {
    async fn load(&self, _broker_id: &BrokerId) -> Option<CredentialsBlob> {
        Some(CredentialsBlob::default())
    }

    async fn store(&self, _broker_id: &BrokerId, _blob: CredentialsBlob) {}

    async fn delete(&self, _broker_id: &BrokerId) {}
}

fn limit_order(side: Side, price: Decimal) -> NewOrder {
    NewOrder {
        client_order_id: ClientOrderId::random(),
        symbol: Symbol::new("RELIANCE", Exchange::Nse),
        side,
        kind: OrderType::Limit,
        quantity: 10,
        price: Some(price),
        trigger_price: None,
        product: Product::Cnc,
        validity: Validity::Day,
        tag: None,
        stop_loss: None,
        take_profit: None,
    }
}

async fn build_router(adapters: Vec<MockAdapter>) -> (OrderRouter, Vec<Arc<Mutex<Vec<NewOrder>>>>) {
    let auth = Arc::new(AuthManager::new(
        Arc::new(EmptyCredentials),
        Duration::from_secs(300),
    ));

    let mut call_logs = Vec::new();
    for adapter in adapters {
        call_logs.push(adapter.calls.clone());
        auth.register(Arc::new(adapter));
    }

    let orchestrator = Arc::new(Orchestrator::new(auth, Duration::from_secs(2)));
    let router = OrderRouter::new(orchestrator, Arc::new(PluginPipeline::new()));
    (router, call_logs)
}

#[tokio::test]
async fn s1_best_price_buy_picks_the_lowest_ask() {
    let a = MockAdapter::new("A", dec!(2499.90), dec!(2500.10), Duration::from_millis(5));
    let b = MockAdapter::new("B", dec!(2499.95), dec!(2500.15), Duration::from_millis(3));
    let (router, calls) = build_router(vec![a, b]).await;

    let outcome = router
        .route(
            limit_order(Side::Buy, dec!(2500.10)),
            RouteConfig::new(RouteStrategy::BestPrice),
        )
        .await;

    match outcome {
        OrderOutcome::Single(result) => {
            assert!(result.success);
            assert_eq!(result.broker_id, BrokerId::new("A"));
        }
        OrderOutcome::Multi(_) => panic!("expected single-broker outcome"),
    }

    assert_eq!(calls[0].lock().len(), 1, "A should receive exactly one place_order call");
    assert_eq!(calls[1].lock().len(), 0, "B should never be called");
}

#[tokio::test]
async fn s2_best_price_sell_ties_broken_by_lowest_latency() {
    let a = MockAdapter::new("A", dec!(2500.00), dec!(2500.20), Duration::from_millis(40));
    let b = MockAdapter::new("B", dec!(2500.00), dec!(2500.20), Duration::from_millis(5));
    let (router, calls) = build_router(vec![a, b]).await;

    let outcome = router
        .route(
            limit_order(Side::Sell, dec!(2500.00)),
            RouteConfig::new(RouteStrategy::BestPrice),
        )
        .await;

    match outcome {
        OrderOutcome::Single(result) => assert_eq!(result.broker_id, BrokerId::new("B")),
        OrderOutcome::Multi(_) => panic!("expected single-broker outcome"),
    }

    assert_eq!(calls[1].lock().len(), 1);
}

#[tokio::test]
async fn s3_parallel_fan_out_reports_partial_failure() {
    let a = MockAdapter::new("A", dec!(100), dec!(101), Duration::ZERO);
    let b = MockAdapter::new("B", dec!(100), dec!(101), Duration::ZERO).rejecting();
    let c = MockAdapter::new("C", dec!(100), dec!(101), Duration::ZERO);
    let (router, _calls) = build_router(vec![a, b, c]).await;

    let outcome = router
        .route(limit_order(Side::Buy, dec!(100)), RouteConfig::new(RouteStrategy::Parallel))
        .await;

    match outcome {
        OrderOutcome::Multi(multi) => {
            assert!(!multi.success);
            assert!(multi.results[&BrokerId::new("A")].success);
            assert!(!multi.results[&BrokerId::new("B")].success);
            assert!(multi.results[&BrokerId::new("C")].success);
        }
        OrderOutcome::Single(_) => panic!("expected multi-broker outcome"),
    }
}

#[tokio::test]
async fn property_5_round_robin_fairness() {
    let a = MockAdapter::new("A", dec!(100), dec!(101), Duration::ZERO);
    let b = MockAdapter::new("B", dec!(100), dec!(101), Duration::ZERO);
    let (router, calls) = build_router(vec![a, b]).await;

    const K: usize = 4;
    for _ in 0..(K * 2) {
        router
            .route(limit_order(Side::Buy, dec!(100)), RouteConfig::new(RouteStrategy::RoundRobin))
            .await;
    }

    assert_eq!(calls[0].lock().len(), K);
    assert_eq!(calls[1].lock().len(), K);
}

#[tokio::test]
async fn property_6_pre_order_cancellation_skips_every_adapter() {
    use meridian_execution::plugin::{PluginContext, PluginMeta, PreOrderPlugin};
    use meridian_instrument::ids::PluginId;

    struct CancelEverything;

    #[async_trait::async_trait]
    impl PreOrderPlugin for CancelEverything {
        fn meta(&self) -> &PluginMeta {
            static META: std::sync::OnceLock<PluginMeta> = std::sync::OnceLock::new();
            META.get_or_init(|| {
                PluginMeta::new(PluginId::new("cancel-all"), "cancel-all", meridian_execution::plugin::HookType::PreOrder, "1.0")
            })
        }

        async fn run(&self, ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError> {
            ctx.set_synthetic_result(OrderResult::ok(
                BrokerId::paper(),
                OrderId::new("paper-synthetic"),
                "intercepted",
            ));
            ctx.cancel();
            Ok(())
        }
    }

    let a = MockAdapter::new("A", dec!(100), dec!(101), Duration::ZERO);
    let calls = a.calls.clone();

    let auth = Arc::new(AuthManager::new(
        Arc::new(EmptyCredentials),
        Duration::from_secs(300),
    ));
    auth.register(Arc::new(a));
    let orchestrator = Arc::new(Orchestrator::new(auth, Duration::from_secs(2)));

    let mut plugins = PluginPipeline::new();
    plugins.register_pre_order(Box::new(CancelEverything));
    let router = OrderRouter::new(orchestrator, Arc::new(plugins));

    let outcome = router
        .route(limit_order(Side::Buy, dec!(100)), RouteConfig::new(RouteStrategy::BestPrice))
        .await;

    match outcome {
        OrderOutcome::Single(result) => {
            assert!(result.success);
            assert_eq!(result.broker_id, BrokerId::paper());
        }
        OrderOutcome::Multi(_) => panic!("expected single-broker outcome"),
    }

    assert_eq!(calls.lock().len(), 0, "no adapter should see place_order once cancelled");
}
