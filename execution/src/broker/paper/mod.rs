use crate::adapter::{BrokerAdapter, Credentials, AuthResponse, OrderResult};
use crate::error::GatewayError;
use crate::plugin::{HookType, PluginContext, PluginMeta, PreOrderPlugin, QuoteSource};
use async_trait::async_trait;
use chrono::Utc;
use meridian_instrument::{
    exchange::Symbol,
    ids::{BrokerId, OrderId, PluginId, TradeId},
    mapping::{Side, Status},
    order::{NewOrder, Order},
    position::Position,
    quote::Quote,
    trade::Trade,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory paper-trading broker (`spec.md` §4.E, §8 property 6, scenario S4): accepts orders
/// directly (for explicit-price callers) or via [`PaperBroker::fill_at_market`] (used by
/// [`PaperTradingPlugin`]), simulating an instant fill and keeping its own books rather than
/// touching any real venue. `BrokerId::paper()` identifies it across the gateway.
///
/// An actor reached over a channel would make sense if a separate simulated-exchange task owned
/// the account state, but there is no such separate task here - the account state this broker
/// owns is exactly the thing a PRE_ORDER plugin call already runs on the caller's task - so the
/// state lives behind a plain `Mutex` instead of behind a channel.
#[derive(Debug)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

#[derive(Debug)]
struct PaperState {
    orders: Vec<Order>,
    trades: Vec<Trade>,
    positions: HashMap<Symbol, Position>,
    funds: meridian_instrument::funds::Funds,
    next_seq: u64,
}

impl PaperState {
    fn next_order_id(&mut self) -> OrderId {
        self.next_seq += 1;
        OrderId::new(format!("PAPER-{:010}", self.next_seq))
    }

    fn next_trade_id(&self) -> TradeId {
        TradeId::new(format!("PAPER-T-{:010}", self.next_seq))
    }

    fn apply_fill(&mut self, order: &Order) {
        let filled = Decimal::from(order.filled_qty);
        let price = order.avg_fill_price.unwrap_or_default();
        let signed_qty = match order.side {
            Side::Buy => order.filled_qty as i64,
            Side::Sell => -(order.filled_qty as i64),
        };

        let position = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position {
                symbol: order.symbol.clone(),
                product: order.product,
                quantity: 0,
                buy_qty: 0,
                sell_qty: 0,
                buy_value: Decimal::ZERO,
                sell_value: Decimal::ZERO,
                avg_price: Decimal::ZERO,
                last_price: price,
                pnl: Decimal::ZERO,
                pnl_percent: Decimal::ZERO,
                day_pnl: Decimal::ZERO,
            });

        match order.side {
            Side::Buy => {
                position.buy_qty += order.filled_qty;
                position.buy_value += price * filled;
            }
            Side::Sell => {
                position.sell_qty += order.filled_qty;
                position.sell_value += price * filled;
            }
        }
        position.quantity += signed_qty;
        position.last_price = price;

        let (cost, qty) = if position.quantity > 0 {
            (position.buy_value, position.buy_qty)
        } else {
            (position.sell_value, position.sell_qty)
        };
        position.avg_price = if qty > 0 {
            cost / Decimal::from(qty)
        } else {
            Decimal::ZERO
        };
        position.pnl = (position.last_price - position.avg_price) * Decimal::from(position.quantity);

        let notional = price * filled;
        match order.side {
            Side::Buy => self.funds.available_cash -= notional,
            Side::Sell => self.funds.available_cash += notional,
        }
        self.funds.total_balance = self.funds.available_cash + self.funds.used_margin;
        self.funds.available_margin = self.funds.available_cash;

        self.trades.push(Trade {
            id: self.next_trade_id(),
            order_id: order.id.clone(),
            broker_id: order.broker_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.filled_qty,
            price,
            executed_at: order.updated_at,
        });
    }
}

impl PaperBroker {
    pub fn new(initial_funds: meridian_instrument::funds::Funds) -> Self {
        Self {
            state: Mutex::new(PaperState {
                orders: Vec::new(),
                trades: Vec::new(),
                positions: HashMap::new(),
                funds: initial_funds,
                next_seq: 0,
            }),
        }
    }

    fn record_fill(&self, order: &NewOrder, price: Decimal) -> OrderResult {
        let mut state = self.state.lock();
        let id = state.next_order_id();
        let now = Utc::now();

        let filled = Order {
            id: id.clone(),
            client_order_id: order.client_order_id.clone(),
            broker_id: BrokerId::paper(),
            symbol: order.symbol.clone(),
            side: order.side,
            kind: order.kind,
            quantity: order.quantity,
            price: Some(price),
            trigger_price: order.trigger_price,
            product: order.product,
            validity: order.validity,
            status: Status::Filled,
            filled_qty: order.quantity,
            avg_fill_price: Some(price),
            placed_at: now,
            updated_at: now,
            exchange_order_id: None,
            status_message: Some("simulated fill".to_string()),
        };

        state.apply_fill(&filled);
        state.orders.push(filled);

        OrderResult::ok(BrokerId::paper(), id, "simulated fill")
    }

    /// Simulate a fill against a caller-supplied quote (`spec.md` §4.E): market orders fill at
    /// the crossing side (ask for BUY, bid for SELL), anything carrying an explicit `price`
    /// (limit-style) fills there instead. Used by [`PaperTradingPlugin`], which is the only
    /// caller that has a `Quote` on hand.
    pub fn fill_at_market(&self, order: &NewOrder, quote: &Quote) -> OrderResult {
        if let Err(error) = order.validate() {
            return OrderResult::failed(BrokerId::paper(), GatewayError::invalid_order(error.to_string()));
        }

        let price = order.price.unwrap_or(match order.side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        });

        self.record_fill(order, price)
    }
}

impl BrokerAdapter for PaperBroker {
    const BROKER_ID: &'static str = "paper";

    async fn authenticate(&self, _credentials: Credentials) -> Result<AuthResponse, GatewayError> {
        Ok(AuthResponse {
            success: true,
            message: "paper trading requires no authentication".to_string(),
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
        if let Err(error) = order.validate() {
            return OrderResult::failed(BrokerId::paper(), GatewayError::invalid_order(error.to_string()));
        }

        let Some(price) = order.price else {
            return OrderResult::failed(
                BrokerId::paper(),
                GatewayError::invalid_order(
                    "paper broker requires an explicit price; market orders are routed through \
                     the paper-trading plugin instead",
                ),
            );
        };

        self.record_fill(order, price)
    }

    async fn modify_order(
        &self,
        _id: &OrderId,
        _patch: &meridian_instrument::order::OrderPatch,
    ) -> OrderResult {
        OrderResult::failed(BrokerId::paper(), GatewayError::not_supported("ModifyOrder"))
    }

    async fn cancel_order(&self, id: &OrderId) -> OrderResult {
        let state = self.state.lock();
        if state.orders.iter().any(|order| &order.id == id) {
            OrderResult::failed(
                BrokerId::paper(),
                GatewayError::invalid_order("paper orders fill immediately and cannot be cancelled"),
            )
        } else {
            OrderResult::failed(BrokerId::paper(), GatewayError::invalid_input("unknown order id"))
        }
    }

    async fn get_orders(&self) -> Result<Vec<Order>, GatewayError> {
        Ok(self.state.lock().orders.clone())
    }

    async fn get_trades(&self) -> Result<Vec<Trade>, GatewayError> {
        Ok(self.state.lock().trades.clone())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        Ok(self.state.lock().positions.values().cloned().collect())
    }

    async fn get_holdings(&self) -> Result<Vec<meridian_instrument::holding::Holding>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_funds(&self) -> Result<meridian_instrument::funds::Funds, GatewayError> {
        Ok(self.state.lock().funds.clone())
    }

    async fn get_quote(&self, _symbol: &Symbol) -> Result<Quote, GatewayError> {
        Err(GatewayError::not_supported("GetQuote"))
    }

    async fn get_ohlcv(
        &self,
        _symbol: &Symbol,
        _timeframe: meridian_instrument::candle::Timeframe,
        _from: chrono::DateTime<Utc>,
        _to: chrono::DateTime<Utc>,
    ) -> Result<Vec<meridian_instrument::candle::Candle>, GatewayError> {
        Err(GatewayError::not_supported("GetOhlcv"))
    }

    async fn get_market_depth(&self, _symbol: &Symbol) -> Result<meridian_instrument::depth::MarketDepth, GatewayError> {
        Err(GatewayError::not_supported("GetMarketDepth"))
    }

    async fn subscribe(
        &self,
        _symbol: &Symbol,
        _mode: meridian_instrument::tick::StreamMode,
    ) -> Result<meridian_instrument::ids::SubscriptionId, GatewayError> {
        Err(GatewayError::not_supported("Subscribe"))
    }

    async fn unsubscribe(&self, _symbol: &Symbol) -> Result<(), GatewayError> {
        Err(GatewayError::not_supported("Unsubscribe"))
    }
}

/// PRE_ORDER plugin that intercepts an order, fetches a quote via [`QuoteSource`] (read-only,
/// `spec.md` §4.E), simulates the fill against [`PaperBroker`], and cancels the chain so the
/// real broker is never called (`spec.md` §8 property 6, scenario S4).
pub struct PaperTradingPlugin {
    meta: PluginMeta,
    broker: Arc<PaperBroker>,
    quotes: Arc<dyn QuoteSource>,
}

impl PaperTradingPlugin {
    pub fn new(broker: Arc<PaperBroker>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self {
            meta: PluginMeta::new(
                PluginId::new("paper_trading"),
                "Paper Trading",
                HookType::PreOrder,
                "1.0.0",
            ),
            broker,
            quotes,
        }
    }
}

#[async_trait]
impl PreOrderPlugin for PaperTradingPlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    async fn run(&self, ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError> {
        let quote = self.quotes.quote(&ctx.data().symbol).await?;
        let result = self.broker.fill_at_market(ctx.data(), &quote);
        ctx.set_synthetic_result(result);
        ctx.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_instrument::{
        exchange::Exchange,
        funds::Funds,
        ids::ClientOrderId,
        mapping::{OrderType, Product, Validity},
    };
    use rust_decimal_macros::dec;

    fn funds() -> Funds {
        Funds {
            available_cash: dec!(100_000),
            used_margin: Decimal::ZERO,
            available_margin: dec!(100_000),
            total_balance: dec!(100_000),
            currency: "INR".to_string(),
            collateral: None,
            unrealized_pnl: None,
            realized_pnl: None,
        }
    }

    fn market_order(side: Side, quantity: u64) -> NewOrder {
        NewOrder {
            client_order_id: ClientOrderId::random(),
            symbol: Symbol::new("INFY", Exchange::Nse),
            side,
            kind: OrderType::Market,
            quantity,
            price: None,
            trigger_price: None,
            product: Product::Cnc,
            validity: Validity::Day,
            tag: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    fn quote(bid: Decimal, ask: Decimal) -> Quote {
        Quote {
            symbol: Symbol::new("INFY", Exchange::Nse),
            last_price: (bid + ask) / Decimal::from(2),
            open: bid,
            high: ask,
            low: bid,
            close: bid,
            previous_close: bid,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            bid,
            bid_qty: 100,
            ask,
            ask_qty: 100,
            volume: 1_000,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn buy_market_order_fills_at_ask() {
        let broker = PaperBroker::new(funds());
        let order = market_order(Side::Buy, 10);
        let result = broker.fill_at_market(&order, &quote(dec!(100), dec!(101)));
        assert!(result.success);

        let positions = futures::executor::block_on(broker.get_positions()).unwrap();
        let position = positions.into_iter().find(|p| p.symbol == order.symbol).unwrap();
        assert_eq!(position.quantity, 10);
        assert_eq!(position.avg_price, dec!(101));
    }

    #[test]
    fn sell_market_order_fills_at_bid_and_credits_cash() {
        let broker = PaperBroker::new(funds());
        let order = market_order(Side::Sell, 5);
        let result = broker.fill_at_market(&order, &quote(dec!(100), dec!(101)));
        assert!(result.success);

        let funds_after = futures::executor::block_on(broker.get_funds()).unwrap();
        assert_eq!(funds_after.available_cash, dec!(100_000) + dec!(500));
    }

    #[test]
    fn place_order_without_price_is_rejected() {
        let broker = PaperBroker::new(funds());
        let order = market_order(Side::Buy, 1);
        let result = futures::executor::block_on(broker.place_order(&order));
        assert!(!result.success);
    }

    struct FixedQuoteSource(Quote);

    #[async_trait]
    impl QuoteSource for FixedQuoteSource {
        async fn quote(&self, _symbol: &Symbol) -> Result<Quote, GatewayError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn plugin_cancels_and_supplies_synthetic_result() {
        let broker = Arc::new(PaperBroker::new(funds()));
        let quotes = Arc::new(FixedQuoteSource(quote(dec!(100), dec!(101))));
        let plugin = PaperTradingPlugin::new(broker, quotes);

        let mut ctx = PluginContext::new(market_order(Side::Buy, 1));
        plugin.run(&mut ctx).await.unwrap();

        assert!(ctx.is_cancelled());
        let result = ctx.take_synthetic_result().unwrap();
        assert!(result.success);
        assert_eq!(result.broker_id, BrokerId::paper());
    }
}
