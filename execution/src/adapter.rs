use crate::error::{ErrorKind, GatewayError};
use chrono::{DateTime, Utc};
use meridian_instrument::{
    candle::{Candle, Timeframe},
    depth::MarketDepth,
    exchange::Symbol,
    funds::Funds,
    holding::Holding,
    ids::{BrokerId, OrderId, SubscriptionId},
    order::{BracketOrder, NewOrder, Order, OrderPatch},
    position::Position,
    quote::Quote,
    tick::StreamMode,
    trade::Trade,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, time::Duration};
use tracing::{debug, warn};

/// Credentials bundle handed to `authenticate` - opaque shape beyond what each adapter needs,
/// matching the tagged-union blob `spec.md` §6 describes for the credentials port.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a `PlaceOrder`/`ModifyOrder`/`CancelOrder`/`PlaceSmartOrder` call. Never surfaces as
/// a thrown error across the adapter boundary (`spec.md` §4.B step 6) - failures are represented
/// as `success = false` with a `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    pub broker_id: BrokerId,
    pub order_id: Option<OrderId>,
    pub message: String,
    pub error: Option<GatewayError>,
}

impl OrderResult {
    pub fn ok(broker_id: BrokerId, order_id: OrderId, message: impl Into<String>) -> Self {
        Self {
            success: true,
            broker_id,
            order_id: Some(order_id),
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(broker_id: BrokerId, error: GatewayError) -> Self {
        Self {
            success: false,
            message: error.message.clone(),
            broker_id,
            order_id: None,
            error: Some(error),
        }
    }
}

/// Aggregate result of `CancelAllOrders`/`CloseAllPositions` (`spec.md` §4.B): never fails
/// globally, aggregates per-item outcomes instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub items: Vec<OrderResult>,
}

impl FromIterator<OrderResult> for BulkResult {
    fn from_iter<I: IntoIterator<Item = OrderResult>>(iter: I) -> Self {
        let items: Vec<OrderResult> = iter.into_iter().collect();
        let ok = items.iter().filter(|item| item.success).count();
        let total = items.len();
        Self {
            total,
            ok,
            failed: total - ok,
            items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginEstimate {
    pub total_margin: Decimal,
    pub initial_margin: Decimal,
}

/// Unified capability set every broker adapter implements (`spec.md` §4.B). RPITIT style
/// (`impl Future<...> + Send` return positions), avoiding the `async_trait` macro in favor of
/// native return-position `impl Trait`.
pub trait BrokerAdapter: Send + Sync {
    const BROKER_ID: &'static str;

    fn broker_id(&self) -> BrokerId {
        BrokerId::new(Self::BROKER_ID)
    }

    fn authenticate(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = Result<AuthResponse, GatewayError>> + Send;

    fn refresh_token(&self) -> impl Future<Output = Result<AuthResponse, GatewayError>> + Send;

    fn oauth_url(&self, client_id: &str) -> String;

    fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<AuthResponse, GatewayError>> + Send;

    fn place_order(&self, order: &NewOrder) -> impl Future<Output = OrderResult> + Send;

    fn modify_order(
        &self,
        id: &OrderId,
        patch: &OrderPatch,
    ) -> impl Future<Output = OrderResult> + Send;

    fn cancel_order(&self, id: &OrderId) -> impl Future<Output = OrderResult> + Send;

    fn get_orders(&self) -> impl Future<Output = Result<Vec<Order>, GatewayError>> + Send;

    fn get_trades(&self) -> impl Future<Output = Result<Vec<Trade>, GatewayError>> + Send;

    fn get_positions(&self) -> impl Future<Output = Result<Vec<Position>, GatewayError>> + Send;

    fn get_holdings(&self) -> impl Future<Output = Result<Vec<Holding>, GatewayError>> + Send;

    fn get_funds(&self) -> impl Future<Output = Result<Funds, GatewayError>> + Send;

    fn get_quote(&self, symbol: &Symbol) -> impl Future<Output = Result<Quote, GatewayError>> + Send;

    fn get_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Candle>, GatewayError>> + Send;

    fn get_market_depth(
        &self,
        symbol: &Symbol,
    ) -> impl Future<Output = Result<MarketDepth, GatewayError>> + Send;

    fn subscribe(
        &self,
        symbol: &Symbol,
        mode: StreamMode,
    ) -> impl Future<Output = Result<SubscriptionId, GatewayError>> + Send;

    fn unsubscribe(&self, symbol: &Symbol) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Default implementation surfaces `NotSupported` - per `spec.md` §9's "adapters as
    /// duck-typed objects become a fixed capability set" design note: a broker lacking a
    /// capability returns an error rather than the method being absent.
    fn place_smart_order(&self, _bracket: &BracketOrder) -> impl Future<Output = OrderResult> + Send {
        async { OrderResult::failed(self.broker_id(), GatewayError::not_supported("PlaceSmartOrder")) }
    }

    fn calculate_margin(
        &self,
        _orders: &[NewOrder],
    ) -> impl Future<Output = Result<MarginEstimate, GatewayError>> + Send {
        async { Err(GatewayError::not_supported("CalculateMargin")) }
    }

    /// Fan out `cancel_order` across every currently open order via `FuturesUnordered`, as a
    /// default method every adapter gets for free.
    fn cancel_all_orders(&self) -> impl Future<Output = BulkResult> + Send
    where
        Self: Sized,
    {
        async {
            let orders = match self.get_orders().await {
                Ok(orders) => orders,
                Err(error) => {
                    warn!(broker_id = Self::BROKER_ID, ?error, "cancel_all_orders: failed to list orders");
                    return BulkResult::from_iter(std::iter::empty());
                }
            };

            let open: Vec<_> = orders.into_iter().filter(|order| !order.status.is_terminal()).collect();

            let results = futures::future::join_all(
                open.iter().map(|order| self.cancel_order(&order.id)),
            )
            .await;

            BulkResult::from_iter(results)
        }
    }

    fn close_all_positions(&self) -> impl Future<Output = BulkResult> + Send
    where
        Self: Sized,
    {
        async {
            let positions = match self.get_positions().await {
                Ok(positions) => positions,
                Err(error) => {
                    warn!(broker_id = Self::BROKER_ID, ?error, "close_all_positions: failed to list positions");
                    return BulkResult::from_iter(std::iter::empty());
                }
            };

            let closing_orders: Vec<NewOrder> = positions
                .iter()
                .filter(|position| position.quantity != 0)
                .map(close_position_order)
                .collect();

            let results = futures::future::join_all(
                closing_orders.iter().map(|order| self.place_order(order)),
            )
            .await;

            BulkResult::from_iter(results)
        }
    }
}

fn close_position_order(position: &Position) -> NewOrder {
    use meridian_instrument::{ids::ClientOrderId, mapping::{OrderType, Side, Validity}};

    NewOrder {
        client_order_id: ClientOrderId::random(),
        symbol: position.symbol.clone(),
        side: if position.is_long() { Side::Sell } else { Side::Buy },
        kind: OrderType::Market,
        quantity: position.quantity.unsigned_abs(),
        price: None,
        trigger_price: None,
        product: position.product,
        validity: Validity::Day,
        tag: Some("close_all_positions".to_string()),
        stop_loss: None,
        take_profit: None,
    }
}

/// Read-only retry policy shared by every adapter (`spec.md` §4.B: "up to 3 attempts with
/// 100/400/1200ms backoff"). Mutating calls (`PlaceOrder`/`ModifyOrder`/`CancelOrder`) never call
/// this helper - callers retry explicitly, never automatically, to avoid duplicate orders.
pub async fn retry_read<T, F, Fut>(broker_id: &str, operation: &str, mut call: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    const BACKOFFS_MS: [u64; 3] = [100, 400, 1200];

    let mut last_error = None;
    for (attempt, backoff_ms) in BACKOFFS_MS.iter().enumerate() {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.retryable && error.kind != ErrorKind::RateLimited => {
                debug!(broker_id, operation, attempt, backoff_ms, %error, "retrying read operation");
                tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }

    match call().await {
        Ok(value) => Ok(value),
        Err(error) => Err(last_error.unwrap_or(error)),
    }
}

/// Venue-specific instrument id resolved once per symbol and cached, per `spec.md` §4.I.
pub type InstrumentCache = HashMap<Symbol, String>;

/// Companion to [`BrokerAdapter`] implemented by every concrete adapter that supports streaming:
/// exposes the fan-in point the Streaming Aggregator (`spec.md` §4.G) pulls ticks from.
///
/// Kept separate from [`BrokerAdapter`] itself because tick delivery is a transport detail - an
/// owned broadcast channel rather than a callback, per `spec.md` §9's design note - not one of
/// the fixed request/response capabilities in the §4.B table.
pub trait TickSource: Send + Sync {
    /// Subscribe to this adapter's unified tick broadcast. Every call returns an independent
    /// receiver positioned at "now" (tokio broadcast semantics); a slow receiver that falls more
    /// than the channel capacity behind observes [`tokio::sync::broadcast::error::RecvError::Lagged`]
    /// rather than blocking the adapter's own ingestion loop.
    fn subscribe_ticks(&self) -> tokio::sync::broadcast::Receiver<meridian_instrument::tick::Tick>;
}

/// Object-safe bridge over [`BrokerAdapter`], letting `AuthManager`/`Orchestrator` hold a
/// registry of heterogeneous concrete adapters as `Arc<dyn ErasedAdapter>`. `BrokerAdapter`
/// itself can't be used this way - its RPITIT return positions and associated `BROKER_ID`
/// constant aren't object-safe - so every method here just forwards to the underlying
/// `BrokerAdapter` impl. Same tradeoff as [`crate::ports::master_contract::MasterContractPort`],
/// applied to adapters instead of a shared collaborator port.
#[async_trait::async_trait]
pub trait ErasedAdapter: Send + Sync {
    fn broker_id(&self) -> BrokerId;

    async fn authenticate(&self, credentials: Credentials) -> Result<AuthResponse, GatewayError>;

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError>;

    fn oauth_url(&self, client_id: &str) -> String;

    async fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<AuthResponse, GatewayError>;

    async fn place_order(&self, order: &NewOrder) -> OrderResult;

    async fn modify_order(&self, id: &OrderId, patch: &OrderPatch) -> OrderResult;

    async fn cancel_order(&self, id: &OrderId) -> OrderResult;

    async fn get_orders(&self) -> Result<Vec<Order>, GatewayError>;

    async fn get_trades(&self) -> Result<Vec<Trade>, GatewayError>;

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError>;

    async fn get_holdings(&self) -> Result<Vec<Holding>, GatewayError>;

    async fn get_funds(&self) -> Result<Funds, GatewayError>;

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError>;

    async fn get_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, GatewayError>;

    async fn get_market_depth(&self, symbol: &Symbol) -> Result<MarketDepth, GatewayError>;

    async fn subscribe(&self, symbol: &Symbol, mode: StreamMode) -> Result<SubscriptionId, GatewayError>;

    async fn unsubscribe(&self, symbol: &Symbol) -> Result<(), GatewayError>;

    async fn place_smart_order(&self, bracket: &BracketOrder) -> OrderResult;

    async fn calculate_margin(&self, orders: &[NewOrder]) -> Result<MarginEstimate, GatewayError>;

    async fn cancel_all_orders(&self) -> BulkResult;

    async fn close_all_positions(&self) -> BulkResult;
}

#[async_trait::async_trait]
impl<T: BrokerAdapter> ErasedAdapter for T {
    fn broker_id(&self) -> BrokerId {
        BrokerAdapter::broker_id(self)
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        BrokerAdapter::authenticate(self, credentials).await
    }

    async fn refresh_token(&self) -> Result<AuthResponse, GatewayError> {
        BrokerAdapter::refresh_token(self).await
    }

    fn oauth_url(&self, client_id: &str) -> String {
        BrokerAdapter::oauth_url(self, client_id)
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<AuthResponse, GatewayError> {
        BrokerAdapter::exchange_code_for_token(self, code, client_id, client_secret, redirect_uri).await
    }

    async fn place_order(&self, order: &NewOrder) -> OrderResult {
        BrokerAdapter::place_order(self, order).await
    }

    async fn modify_order(&self, id: &OrderId, patch: &OrderPatch) -> OrderResult {
        BrokerAdapter::modify_order(self, id, patch).await
    }

    async fn cancel_order(&self, id: &OrderId) -> OrderResult {
        BrokerAdapter::cancel_order(self, id).await
    }

    async fn get_orders(&self) -> Result<Vec<Order>, GatewayError> {
        BrokerAdapter::get_orders(self).await
    }

    async fn get_trades(&self) -> Result<Vec<Trade>, GatewayError> {
        BrokerAdapter::get_trades(self).await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        BrokerAdapter::get_positions(self).await
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, GatewayError> {
        BrokerAdapter::get_holdings(self).await
    }

    async fn get_funds(&self) -> Result<Funds, GatewayError> {
        BrokerAdapter::get_funds(self).await
    }

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError> {
        BrokerAdapter::get_quote(self, symbol).await
    }

    async fn get_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, GatewayError> {
        BrokerAdapter::get_ohlcv(self, symbol, timeframe, from, to).await
    }

    async fn get_market_depth(&self, symbol: &Symbol) -> Result<MarketDepth, GatewayError> {
        BrokerAdapter::get_market_depth(self, symbol).await
    }

    async fn subscribe(&self, symbol: &Symbol, mode: StreamMode) -> Result<SubscriptionId, GatewayError> {
        BrokerAdapter::subscribe(self, symbol, mode).await
    }

    async fn unsubscribe(&self, symbol: &Symbol) -> Result<(), GatewayError> {
        BrokerAdapter::unsubscribe(self, symbol).await
    }

    async fn place_smart_order(&self, bracket: &BracketOrder) -> OrderResult {
        BrokerAdapter::place_smart_order(self, bracket).await
    }

    async fn calculate_margin(&self, orders: &[NewOrder]) -> Result<MarginEstimate, GatewayError> {
        BrokerAdapter::calculate_margin(self, orders).await
    }

    async fn cancel_all_orders(&self) -> BulkResult {
        BrokerAdapter::cancel_all_orders(self).await
    }

    async fn close_all_positions(&self) -> BulkResult {
        BrokerAdapter::close_all_positions(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_read_succeeds_on_second_attempt() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<u32, GatewayError> = retry_read("vantage", "get_quote", || {
            let attempts = &attempts;
            async move {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    Err(GatewayError::new(ErrorKind::NetworkError, "connection reset"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_read_does_not_retry_non_retryable_errors() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<u32, GatewayError> = retry_read("vantage", "get_quote", || {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(GatewayError::new(ErrorKind::InstrumentNotFound, "unknown symbol"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn bulk_result_aggregates_counts() {
        let broker_id = BrokerId::new("vantage");
        let results = vec![
            OrderResult::ok(broker_id.clone(), OrderId::new("1"), "placed"),
            OrderResult::failed(broker_id.clone(), GatewayError::invalid_order("bad qty")),
        ];
        let bulk = BulkResult::from_iter(results);
        assert_eq!(bulk.total, 2);
        assert_eq!(bulk.ok, 1);
        assert_eq!(bulk.failed, 1);
    }
}
