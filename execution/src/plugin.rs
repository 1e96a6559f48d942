use crate::error::GatewayError;
use async_trait::async_trait;
use meridian_instrument::{
    exchange::Symbol,
    ids::{BrokerId, PluginId},
    order::{NewOrder, Order},
    position::Position,
    quote::Quote,
    tick::Tick,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::adapter::OrderResult;
use crate::FnvIndexMap;

/// The nine hook points plugins attach to (`spec.md` §4.E). Only `PreOrder`/`PostOrder` sit on
/// the order-placement critical path; the rest are observational fan-out points.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookType {
    PreOrder,
    PostOrder,
    OrderUpdate,
    PositionUpdate,
    DataFeed,
    Analytics,
    Export,
    AiAgent,
    Performance,
}

/// Registration-time descriptor shared by every plugin kind. `enabled` is independently
/// toggleable at runtime without requiring `&mut` access to the owning pipeline.
#[derive(Debug)]
pub struct PluginMeta {
    pub id: PluginId,
    pub name: String,
    pub hook: HookType,
    pub version: String,
    enabled: AtomicBool,
}

impl PluginMeta {
    pub fn new(id: PluginId, name: impl Into<String>, hook: HookType, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hook,
            version: version.into(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, value: bool) {
        self.enabled.store(value, Ordering::Relaxed);
    }
}

/// Mutable context a plugin runs against. Explicit struct rather than captured closures
/// (`spec.md` §9's design note on avoiding closure lifetime hazards): a plugin calls `cancel()`
/// or queues a `modify()` instead of being handed `&mut NewOrder` and a pair of callbacks.
pub struct PluginContext<T> {
    data: T,
    cancelled: bool,
    synthetic_result: Option<OrderResult>,
    modifications: Vec<Box<dyn FnOnce(&mut T) + Send>>,
}

impl<T> PluginContext<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cancelled: false,
            synthetic_result: None,
            modifications: Vec::new(),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    /// Stop the PRE_ORDER chain after this plugin and skip the real broker call
    /// (`spec.md` §4.E, §8 property 6). Has no effect on chain continuation outside PRE_ORDER.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Queue a transformation of the underlying data, applied once this plugin's `run` returns.
    pub fn modify(&mut self, f: impl FnOnce(&mut T) + Send + 'static) {
        self.modifications.push(Box::new(f));
    }

    /// Supply the result the router returns in place of a real broker call when `cancel()` was
    /// called during PRE_ORDER (eg/ the paper-trading interception plugin's simulated fill).
    pub fn set_synthetic_result(&mut self, result: OrderResult) {
        self.synthetic_result = Some(result);
    }

    pub fn take_synthetic_result(&mut self) -> Option<OrderResult> {
        self.synthetic_result.take()
    }

    pub(crate) fn apply_modifications(&mut self) {
        for modification in self.modifications.drain(..) {
            modification(&mut self.data);
        }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

#[async_trait]
pub trait PreOrderPlugin: Send + Sync {
    fn meta(&self) -> &PluginMeta;
    async fn run(&self, ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait PostOrderPlugin: Send + Sync {
    fn meta(&self) -> &PluginMeta;
    async fn run(&self, ctx: &mut PluginContext<OrderOutcome>) -> Result<(), GatewayError>;
}

/// Observational payload for the five non-order hook types (`spec.md` §4.E). These plugins only
/// observe; they carry no cancel/modify context since nothing downstream consumes a mutation.
#[derive(Debug, Clone)]
pub enum GenericPayload {
    OrderUpdate(Order),
    PositionUpdate(Position),
    DataFeed(Tick),
    Analytics(serde_json::Value),
    Export(serde_json::Value),
    AiAgent(serde_json::Value),
    Performance(serde_json::Value),
}

#[async_trait]
pub trait GenericPlugin: Send + Sync {
    fn meta(&self) -> &PluginMeta;
    async fn run(&self, payload: &GenericPayload) -> Result<(), GatewayError>;
}

/// Result of a single-broker `Route` (`OrderOutcome::Single`) or a `PARALLEL`/multi-broker
/// `Route` (`OrderOutcome::Multi`). POST_ORDER plugins observe whichever shape the router
/// actually produced rather than a lossy single-result projection.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    Single(OrderResult),
    Multi(MultiBrokerResult),
}

#[derive(Debug, Clone)]
pub struct MultiBrokerResult {
    pub success: bool,
    pub results: FnvIndexMap<BrokerId, OrderResult>,
}

impl MultiBrokerResult {
    pub fn from_map(results: FnvIndexMap<BrokerId, OrderResult>) -> Self {
        let success = !results.is_empty() && results.values().all(|result| result.success);
        Self { success, results }
    }
}

/// Read-only quote lookup a PRE_ORDER plugin can use without holding a reference to the whole
/// Orchestrator (`spec.md` §4.E: "fetches a live quote via the adapters (read-only) or cached
/// price"). Implemented by [`crate::orchestrator::Orchestrator`].
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError>;
}

/// Ordered plugin registry for one gateway instance (`spec.md` §4.E). Plugins run in registration
/// order within their hook type; failures are logged and skipped rather than aborting the chain,
/// except a PRE_ORDER `cancel()` which stops the remaining PRE_ORDER plugins.
#[derive(Default)]
pub struct PluginPipeline {
    pre_order: Vec<Box<dyn PreOrderPlugin>>,
    post_order: Vec<Box<dyn PostOrderPlugin>>,
    generic: Vec<Box<dyn GenericPlugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pre_order(&mut self, plugin: Box<dyn PreOrderPlugin>) {
        self.pre_order.push(plugin);
    }

    pub fn register_post_order(&mut self, plugin: Box<dyn PostOrderPlugin>) {
        self.post_order.push(plugin);
    }

    pub fn register_generic(&mut self, plugin: Box<dyn GenericPlugin>) {
        self.generic.push(plugin);
    }

    pub async fn run_pre_order(&self, order: NewOrder) -> PluginContext<NewOrder> {
        let mut ctx = PluginContext::new(order);

        for plugin in &self.pre_order {
            if !plugin.meta().is_enabled() {
                continue;
            }

            if let Err(error) = plugin.run(&mut ctx).await {
                warn!(plugin = %plugin.meta().id, %error, "pre_order plugin failed");
                continue;
            }

            ctx.apply_modifications();

            if ctx.is_cancelled() {
                break;
            }
        }

        ctx
    }

    pub async fn run_post_order(&self, outcome: OrderOutcome) -> PluginContext<OrderOutcome> {
        let mut ctx = PluginContext::new(outcome);

        for plugin in &self.post_order {
            if !plugin.meta().is_enabled() {
                continue;
            }

            if let Err(error) = plugin.run(&mut ctx).await {
                warn!(plugin = %plugin.meta().id, %error, "post_order plugin failed");
                continue;
            }

            ctx.apply_modifications();
        }

        ctx
    }

    pub async fn run_generic(&self, hook: HookType, payload: GenericPayload) {
        for plugin in &self.generic {
            if plugin.meta().hook != hook || !plugin.meta().is_enabled() {
                continue;
            }

            if let Err(error) = plugin.run(&payload).await {
                warn!(plugin = %plugin.meta().id, ?hook, %error, "generic plugin failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_instrument::{
        exchange::Exchange,
        ids::{BrokerId, ClientOrderId, OrderId},
        mapping::{OrderType, Product, Side, Validity},
    };

    fn order() -> NewOrder {
        NewOrder {
            client_order_id: ClientOrderId::new("cid-1"),
            symbol: Symbol::new("INFY", Exchange::Nse),
            side: Side::Buy,
            kind: OrderType::Market,
            quantity: 1,
            price: None,
            trigger_price: None,
            product: Product::Cnc,
            validity: Validity::Day,
            tag: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    struct CancellingPlugin {
        meta: PluginMeta,
    }

    #[async_trait]
    impl PreOrderPlugin for CancellingPlugin {
        fn meta(&self) -> &PluginMeta {
            &self.meta
        }

        async fn run(&self, ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError> {
            ctx.set_synthetic_result(OrderResult::ok(
                BrokerId::paper(),
                OrderId::new("paper-1"),
                "simulated fill",
            ));
            ctx.cancel();
            Ok(())
        }
    }

    struct UnreachablePlugin {
        meta: PluginMeta,
        ran: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl PreOrderPlugin for UnreachablePlugin {
        fn meta(&self) -> &PluginMeta {
            &self.meta
        }

        async fn run(&self, _ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancel_stops_remaining_pre_order_plugins() {
        let mut pipeline = PluginPipeline::new();
        pipeline.register_pre_order(Box::new(CancellingPlugin {
            meta: PluginMeta::new(PluginId::new("cancel"), "cancel", HookType::PreOrder, "1.0"),
        }));

        let second_ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        struct Tracking(std::sync::Arc<std::sync::atomic::AtomicBool>, PluginMeta);

        #[async_trait]
        impl PreOrderPlugin for Tracking {
            fn meta(&self) -> &PluginMeta {
                &self.1
            }

            async fn run(&self, _ctx: &mut PluginContext<NewOrder>) -> Result<(), GatewayError> {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        pipeline.register_pre_order(Box::new(Tracking(
            second_ran.clone(),
            PluginMeta::new(PluginId::new("tracking"), "tracking", HookType::PreOrder, "1.0"),
        )));

        let ctx = pipeline.run_pre_order(order()).await;
        assert!(ctx.is_cancelled());
        assert!(!second_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn disabled_plugin_is_skipped() {
        let plugin = UnreachablePlugin {
            meta: PluginMeta::new(PluginId::new("disabled"), "disabled", HookType::PreOrder, "1.0"),
            ran: std::sync::atomic::AtomicBool::new(false),
        };
        plugin.meta().set_enabled(false);

        let mut pipeline = PluginPipeline::new();
        pipeline.register_pre_order(Box::new(plugin));

        let ctx = pipeline.run_pre_order(order()).await;
        assert!(!ctx.is_cancelled());
    }
}
