use crate::adapter::{ErasedAdapter, OrderResult};
use crate::error::GatewayError;
use crate::orchestrator::{Orchestrator, QuoteComparison};
use crate::plugin::{MultiBrokerResult, OrderOutcome, PluginPipeline};
use crate::ports::notification::NotificationPort;
use crate::FnvIndexMap;
use futures::stream::{FuturesUnordered, StreamExt};
use meridian_instrument::{
    ids::{BrokerId, OrderId},
    mapping::{OrderType, Side},
    order::{NewOrder, OrderPatch},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Output the router returns for a single `Route` call, identical to whatever
/// [`PluginPipeline::run_post_order`] observed (`spec.md` §4.F).
pub type RouteOutcome = OrderOutcome;

/// How [`OrderRouter::route`] picks which broker(s) actually see an order (`spec.md` §4.F).
#[derive(Clone)]
pub enum RouteStrategy {
    /// Place on every broker in `RouteConfig::brokers` (or every registered broker if `None`).
    Parallel,
    /// Place only on the broker with the best price, per [`Orchestrator::best_broker_by_price`].
    BestPrice,
    /// Place only on the broker with the lowest observed quote latency.
    BestLatency,
    /// Cycle through `RouteConfig::brokers` (or every registered broker) in round-robin order.
    RoundRobin,
    /// Caller-supplied broker selector given the latest [`QuoteComparison`].
    Custom(Arc<dyn Fn(&QuoteComparison) -> Option<BrokerId> + Send + Sync>),
}

impl std::fmt::Debug for RouteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteStrategy::Parallel => write!(f, "Parallel"),
            RouteStrategy::BestPrice => write!(f, "BestPrice"),
            RouteStrategy::BestLatency => write!(f, "BestLatency"),
            RouteStrategy::RoundRobin => write!(f, "RoundRobin"),
            RouteStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Per-call routing configuration (`spec.md` §4.F).
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub strategy: RouteStrategy,
    pub brokers: Option<Vec<BrokerId>>,
    pub fallback_broker: Option<BrokerId>,
}

impl RouteConfig {
    pub fn new(strategy: RouteStrategy) -> Self {
        Self {
            strategy,
            brokers: None,
            fallback_broker: None,
        }
    }
}

/// Order router (`spec.md` §4.F): runs the PRE_ORDER/POST_ORDER plugin chain around whichever
/// broker(s) the chosen [`RouteStrategy`] selects, reusing [`Orchestrator`] for the comparisons
/// `BestPrice`/`BestLatency` need.
pub struct OrderRouter {
    orchestrator: Arc<Orchestrator>,
    plugins: Arc<PluginPipeline>,
    round_robin_index: AtomicUsize,
    legacy_pre_order_hooks: Mutex<Vec<Box<dyn Fn(&NewOrder) + Send + Sync>>>,
    notifications: Arc<dyn NotificationPort>,
}

impl OrderRouter {
    /// Notifications default to a no-op collaborator; wire a real one in via
    /// [`Self::with_notifications`].
    pub fn new(orchestrator: Arc<Orchestrator>, plugins: Arc<PluginPipeline>) -> Self {
        Self {
            orchestrator,
            plugins,
            round_robin_index: AtomicUsize::new(0),
            legacy_pre_order_hooks: Mutex::new(Vec::new()),
            notifications: Arc::new(crate::ports::notification::NoopNotificationPort),
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationPort>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Register a fire-and-forget observer invoked after the plugin chain and before broker
    /// dispatch, for callers migrating from a legacy pre-hook API that predates the plugin
    /// pipeline (`spec.md` §4.F note on legacy hook compatibility).
    pub fn register_legacy_pre_order_hook(&self, hook: impl Fn(&NewOrder) + Send + Sync + 'static) {
        self.legacy_pre_order_hooks.lock().push(Box::new(hook));
    }

    fn candidate_brokers(&self, config: &RouteConfig) -> Vec<BrokerId> {
        config
            .brokers
            .clone()
            .unwrap_or_else(|| self.orchestrator.auth_manager().broker_ids())
    }

    async fn adapter_for(&self, broker_id: &BrokerId) -> Result<Arc<dyn ErasedAdapter>, GatewayError> {
        self.orchestrator
            .auth_manager()
            .adapter(broker_id)
            .ok_or_else(|| {
                GatewayError::invalid_input(format!("broker '{broker_id}' is not registered"))
                    .with_broker(broker_id.clone())
            })
    }

    async fn place_on(&self, broker_id: &BrokerId, order: &NewOrder) -> OrderResult {
        match self.adapter_for(broker_id).await {
            Ok(adapter) => adapter.place_order(order).await,
            Err(error) => OrderResult::failed(broker_id.clone(), error),
        }
    }

    /// Execute the selected strategy against `order`, producing the outcome POST_ORDER plugins
    /// will observe (`spec.md` §4.F).
    async fn execute_strategy(&self, config: &RouteConfig, order: &NewOrder) -> RouteOutcome {
        match &config.strategy {
            RouteStrategy::Parallel => {
                let brokers = self.candidate_brokers(config);
                let mut futures = FuturesUnordered::new();
                for broker_id in brokers {
                    futures.push(async move { (broker_id.clone(), self.place_on(&broker_id, order).await) });
                }

                let mut results = FnvIndexMap::default();
                while let Some((broker_id, result)) = futures.next().await {
                    results.insert(broker_id, result);
                }

                OrderOutcome::Multi(MultiBrokerResult::from_map(results))
            }
            RouteStrategy::BestPrice | RouteStrategy::BestLatency | RouteStrategy::Custom(_) => {
                let comparison = self.orchestrator.compare_quotes(&order.symbol).await;

                let chosen = match &config.strategy {
                    RouteStrategy::BestPrice => Orchestrator::best_broker_by_price(&comparison, order.side),
                    RouteStrategy::BestLatency => Orchestrator::best_broker_by_latency(&comparison),
                    RouteStrategy::Custom(selector) => selector(&comparison),
                    _ => unreachable!(),
                };

                let broker_id = chosen.or_else(|| config.fallback_broker.clone());

                match broker_id {
                    Some(broker_id) => OrderOutcome::Single(self.place_on(&broker_id, order).await),
                    None => OrderOutcome::Single(OrderResult::failed(
                        BrokerId::new("unresolved"),
                        GatewayError::instrument_not_found(format!(
                            "no quote available to route order for {}",
                            order.symbol
                        )),
                    )),
                }
            }
            RouteStrategy::RoundRobin => {
                let brokers = self.candidate_brokers(config);
                if brokers.is_empty() {
                    return OrderOutcome::Single(OrderResult::failed(
                        BrokerId::new("unresolved"),
                        GatewayError::invalid_input("round-robin routing has no candidate brokers"),
                    ));
                }

                let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed) % brokers.len();
                let broker_id = brokers[index].clone();
                OrderOutcome::Single(self.place_on(&broker_id, order).await)
            }
        }
    }

    /// `Route` (`spec.md` §4.F, §8 properties 5-6): runs PRE_ORDER, short-circuits on a plugin's
    /// synthetic result (eg/ paper trading interception), otherwise dispatches per `config` and
    /// runs POST_ORDER over whatever outcome resulted.
    pub async fn route(&self, order: NewOrder, config: RouteConfig) -> RouteOutcome {
        let pre_ctx = self.plugins.run_pre_order(order).await;
        let cancelled = pre_ctx.is_cancelled();
        let mut pre_ctx = pre_ctx;
        let synthetic = pre_ctx.take_synthetic_result();
        let order = pre_ctx.into_data();

        let outcome = if cancelled {
            OrderOutcome::Single(synthetic.unwrap_or_else(|| {
                OrderResult::failed(
                    BrokerId::new("unresolved"),
                    GatewayError::internal("pre_order plugin cancelled without a synthetic result"),
                )
            }))
        } else {
            for hook in self.legacy_pre_order_hooks.lock().iter() {
                hook(&order);
            }
            self.execute_strategy(&config, &order).await
        };

        self.notify_failures(&outcome);

        let post_ctx = self.plugins.run_post_order(outcome).await;
        post_ctx.into_data()
    }

    /// Every failed `OrderResult` yields a `Notification.Error` (`spec.md` §4.H), whether the
    /// order landed on one broker or fanned out across several.
    fn notify_failures(&self, outcome: &RouteOutcome) {
        let failures: Vec<&OrderResult> = match outcome {
            OrderOutcome::Single(result) if !result.success => vec![result],
            OrderOutcome::Multi(multi) => multi.results.values().filter(|result| !result.success).collect(),
            OrderOutcome::Single(_) => Vec::new(),
        };

        for result in failures {
            self.notifications
                .error("Order Failed", &result.message, Some(&result.broker_id));
        }
    }

    /// `SmartRoute` (`spec.md` §4.F): picks a strategy from the order's shape rather than
    /// requiring the caller to choose one - large orders split risk across brokers (`Parallel`),
    /// time-sensitive market orders chase the fastest venue (`BestLatency`), everything else
    /// chases the best price (`BestPrice`).
    pub async fn smart_route(&self, order: NewOrder) -> RouteOutcome {
        let strategy = if order.quantity > 1000 {
            RouteStrategy::Parallel
        } else if order.kind == OrderType::Market {
            RouteStrategy::BestLatency
        } else {
            RouteStrategy::BestPrice
        };

        self.route(order, RouteConfig::new(strategy)).await
    }

    /// `RouteBatch` (`spec.md` §4.F): routes every order independently and concurrently,
    /// preserving the caller's input ordering in the returned `Vec` despite
    /// `FuturesUnordered` completing them out of order.
    pub async fn route_batch(&self, orders: Vec<NewOrder>, config: RouteConfig) -> Vec<RouteOutcome> {
        let mut futures = FuturesUnordered::new();
        for (index, order) in orders.into_iter().enumerate() {
            let config = config.clone();
            futures.push(async move { (index, self.route(order, config).await) });
        }

        let mut indexed = Vec::new();
        while let Some(item) = futures.next().await {
            indexed.push(item);
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// `ModifyOrder` (`spec.md` §4.F): bypasses routing entirely and forwards directly to the
    /// broker that holds the order. Never retried - a retry could double-apply the modification.
    pub async fn modify_order(
        &self,
        broker_id: &BrokerId,
        order_id: &OrderId,
        patch: &OrderPatch,
    ) -> OrderResult {
        match self.adapter_for(broker_id).await {
            Ok(adapter) => adapter.modify_order(order_id, patch).await,
            Err(error) => OrderResult::failed(broker_id.clone(), error),
        }
    }

    /// `CancelOrder` (`spec.md` §4.F): same bypass as [`Self::modify_order`].
    pub async fn cancel_order(&self, broker_id: &BrokerId, order_id: &OrderId) -> OrderResult {
        match self.adapter_for(broker_id).await {
            Ok(adapter) => adapter.cancel_order(order_id).await,
            Err(error) => OrderResult::failed(broker_id.clone(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::InMemoryCredentials;
    use crate::auth::AuthManager;
    use crate::broker::paper::PaperBroker;
    use meridian_instrument::{
        exchange::{Exchange, Symbol},
        funds::Funds,
        ids::ClientOrderId,
        mapping::{Product, Validity},
    };
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn funds() -> Funds {
        Funds {
            available_cash: dec!(100_000),
            used_margin: rust_decimal::Decimal::ZERO,
            available_margin: dec!(100_000),
            total_balance: dec!(100_000),
            currency: "INR".to_string(),
            collateral: None,
            unrealized_pnl: None,
            realized_pnl: None,
        }
    }

    fn limit_order(price: rust_decimal::Decimal) -> NewOrder {
        NewOrder {
            client_order_id: ClientOrderId::random(),
            symbol: Symbol::new("INFY", Exchange::Nse),
            side: Side::Buy,
            kind: OrderType::Limit,
            quantity: 1,
            price: Some(price),
            trigger_price: None,
            product: Product::Cnc,
            validity: Validity::Day,
            tag: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    async fn build_router() -> OrderRouter {
        let auth = Arc::new(AuthManager::new(Arc::new(InMemoryCredentials::new()), Duration::from_secs(60)));
        auth.register(Arc::new(PaperBroker::new(funds())));
        let orchestrator = Arc::new(Orchestrator::new(auth, Duration::from_millis(500)));
        OrderRouter::new(orchestrator, Arc::new(PluginPipeline::new()))
    }

    #[tokio::test]
    async fn round_robin_dispatches_to_the_only_registered_broker() {
        let router = build_router().await;
        let config = RouteConfig::new(RouteStrategy::RoundRobin);
        let outcome = router.route(limit_order(dec!(101)), config).await;

        match outcome {
            OrderOutcome::Single(result) => assert!(result.success),
            OrderOutcome::Multi(_) => panic!("expected a single-broker outcome"),
        }
    }

    #[tokio::test]
    async fn parallel_strategy_fans_out_to_every_candidate_broker() {
        let router = build_router().await;
        let config = RouteConfig::new(RouteStrategy::Parallel);
        let outcome = router.route(limit_order(dec!(101)), config).await;

        match outcome {
            OrderOutcome::Multi(multi) => {
                assert_eq!(multi.results.len(), 1);
                assert!(multi.success);
            }
            OrderOutcome::Single(_) => panic!("expected a multi-broker outcome"),
        }
    }

    #[tokio::test]
    async fn smart_route_uses_parallel_for_large_quantities() {
        let router = build_router().await;
        let mut order = limit_order(dec!(101));
        order.quantity = 5_000;
        let outcome = router.smart_route(order).await;
        assert!(matches!(outcome, OrderOutcome::Multi(_)));
    }
}
