use crate::auth::AuthManager;
use crate::error::GatewayError;
use crate::plugin::QuoteSource;
use crate::FnvIndexMap;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use meridian_instrument::{exchange::Symbol, ids::BrokerId, mapping::Side, quote::Quote};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Per-broker fan-out result for a single logical operation (`spec.md` §4.D): brokers that
/// errored or timed out land in `errors` rather than aborting the whole call.
#[derive(Debug, Clone)]
pub struct AggregateResult<T> {
    pub data: FnvIndexMap<BrokerId, T>,
    pub errors: FnvIndexMap<BrokerId, GatewayError>,
}

impl<T> Default for AggregateResult<T> {
    fn default() -> Self {
        Self {
            data: FnvIndexMap::default(),
            errors: FnvIndexMap::default(),
        }
    }
}

/// Result of `CompareQuotes`/`CompareMarketDepth` (`spec.md` §4.D): per-broker payload plus the
/// wall-clock latency observed for that broker's own call, so callers can rank by speed as well
/// as by price.
#[derive(Debug, Clone)]
pub struct QuoteComparison {
    pub data: FnvIndexMap<BrokerId, Quote>,
    pub latency: FnvIndexMap<BrokerId, Duration>,
    pub errors: FnvIndexMap<BrokerId, GatewayError>,
}

/// Multi-broker coordinator (`spec.md` §4.D): fans a request out across every authenticated
/// broker within a bounded deadline, using `FuturesUnordered` for "one call against every
/// registered adapter", the same way an individual adapter fans a call out across its own
/// open orders.
pub struct Orchestrator {
    auth: Arc<AuthManager>,
    fan_out_deadline: Duration,
}

impl Orchestrator {
    pub fn new(auth: Arc<AuthManager>, fan_out_deadline: Duration) -> Self {
        Self { auth, fan_out_deadline }
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Run `call` against every registered broker concurrently, bounded by `fan_out_deadline`
    /// (`spec.md` §4.D: "a broker that doesn't respond within the fan-out deadline is recorded as
    /// a timeout error, the rest proceed unaffected").
    async fn fan_out<T, F, Fut>(&self, call: F) -> AggregateResult<T>
    where
        F: Fn(Arc<dyn crate::adapter::ErasedAdapter>) -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = self.fan_out_deadline;
        let broker_ids = self.auth.broker_ids();

        let mut futures = FuturesUnordered::new();
        for broker_id in broker_ids {
            let Some(adapter) = self.auth.adapter(&broker_id) else {
                continue;
            };
            let fut = call(adapter);
            futures.push(async move {
                let result = tokio::time::timeout(deadline, fut)
                    .await
                    .unwrap_or_else(|_| Err(GatewayError::timeout(format!("broker '{broker_id}' fan-out"))));
                (broker_id, result)
            });
        }

        let mut aggregate = AggregateResult::default();
        while let Some((broker_id, result)) = futures.next().await {
            match result {
                Ok(value) => {
                    aggregate.data.insert(broker_id, value);
                }
                Err(error) => {
                    warn!(broker_id = %broker_id, %error, "fan-out call failed");
                    aggregate.errors.insert(broker_id, error);
                }
            }
        }

        aggregate
    }

    /// `CompareQuotes` (`spec.md` §4.D, §8 property 7, scenario S3).
    pub async fn compare_quotes(&self, symbol: &Symbol) -> QuoteComparison {
        let symbol = symbol.clone();
        let aggregate = self
            .fan_out(move |adapter| {
                let symbol = symbol.clone();
                let started = Instant::now();
                async move {
                    let result = adapter.get_quote(&symbol).await;
                    result.map(|quote| (quote, started.elapsed()))
                }
            })
            .await;

        let mut data = FnvIndexMap::default();
        let mut latency = FnvIndexMap::default();
        for (broker_id, (quote, elapsed)) in aggregate.data {
            data.insert(broker_id.clone(), quote);
            latency.insert(broker_id, elapsed);
        }

        QuoteComparison {
            data,
            latency,
            errors: aggregate.errors,
        }
    }

    /// `CompareMarketDepth` (`spec.md` §4.D).
    pub async fn compare_market_depth(
        &self,
        symbol: &Symbol,
    ) -> AggregateResult<meridian_instrument::depth::MarketDepth> {
        let symbol = symbol.clone();
        self.fan_out(move |adapter| {
            let symbol = symbol.clone();
            async move { adapter.get_market_depth(&symbol).await }
        })
        .await
    }

    /// Best price across a [`QuoteComparison`] (`spec.md` §4.D "best price" ranking): lowest ask
    /// for a BUY (you pay the ask), highest bid for a SELL (you receive the bid). Ties break on
    /// lower latency, then lexicographically on broker id for determinism.
    pub fn best_broker_by_price(comparison: &QuoteComparison, side: Side) -> Option<BrokerId> {
        comparison
            .data
            .iter()
            .min_by(|(left_id, left_quote), (right_id, right_quote)| {
                let left_price = match side {
                    Side::Buy => left_quote.ask,
                    Side::Sell => -left_quote.bid,
                };
                let right_price = match side {
                    Side::Buy => right_quote.ask,
                    Side::Sell => -right_quote.bid,
                };

                left_price
                    .cmp(&right_price)
                    .then_with(|| {
                        let left_latency = comparison.latency.get(*left_id);
                        let right_latency = comparison.latency.get(*right_id);
                        left_latency.cmp(&right_latency)
                    })
                    .then_with(|| left_id.to_string().cmp(&right_id.to_string()))
            })
            .map(|(broker_id, _)| broker_id.clone())
    }

    /// Best (lowest) latency across a [`QuoteComparison`] (`spec.md` §4.D "best latency"
    /// ranking), ties broken lexicographically by broker id.
    pub fn best_broker_by_latency(comparison: &QuoteComparison) -> Option<BrokerId> {
        comparison
            .latency
            .iter()
            .min_by(|(left_id, left_latency), (right_id, right_latency)| {
                left_latency
                    .cmp(right_latency)
                    .then_with(|| left_id.to_string().cmp(&right_id.to_string()))
            })
            .map(|(broker_id, _)| broker_id.clone())
    }
}

#[async_trait]
impl QuoteSource for Orchestrator {
    async fn quote(&self, symbol: &Symbol) -> Result<Quote, GatewayError> {
        let comparison = self.compare_quotes(symbol).await;
        let broker_id = Self::best_broker_by_latency(&comparison)
            .ok_or_else(|| GatewayError::instrument_not_found(symbol.to_string()))?;

        comparison
            .data
            .get(&broker_id)
            .cloned()
            .ok_or_else(|| GatewayError::instrument_not_found(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::InMemoryCredentials;
    use crate::broker::paper::PaperBroker;
    use meridian_instrument::funds::Funds;
    use rust_decimal::Decimal;

    fn funds() -> Funds {
        Funds {
            available_cash: Decimal::ZERO,
            used_margin: Decimal::ZERO,
            available_margin: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            currency: "INR".to_string(),
            collateral: None,
            unrealized_pnl: None,
            realized_pnl: None,
        }
    }

    #[tokio::test]
    async fn compare_quotes_records_errors_for_unsupported_broker() {
        let auth = Arc::new(AuthManager::new(Arc::new(InMemoryCredentials::new()), Duration::from_secs(60)));
        auth.register(Arc::new(PaperBroker::new(funds())));

        let orchestrator = Orchestrator::new(auth, Duration::from_millis(500));
        let comparison = orchestrator
            .compare_quotes(&Symbol::new("INFY", meridian_instrument::exchange::Exchange::Nse))
            .await;

        assert!(comparison.data.is_empty());
        assert_eq!(comparison.errors.len(), 1);
    }

    #[test]
    fn best_broker_by_price_prefers_lowest_ask_for_buy() {
        use rust_decimal_macros::dec;

        let symbol = Symbol::new("INFY", meridian_instrument::exchange::Exchange::Nse);
        let mut data = FnvIndexMap::default();
        data.insert(
            BrokerId::new("vantage"),
            Quote {
                symbol: symbol.clone(),
                last_price: dec!(100),
                open: dec!(100),
                high: dec!(100),
                low: dec!(100),
                close: dec!(100),
                previous_close: dec!(100),
                change: Decimal::ZERO,
                change_percent: Decimal::ZERO,
                bid: dec!(99),
                bid_qty: 10,
                ask: dec!(101),
                ask_qty: 10,
                volume: 0,
                timestamp_ms: 0,
            },
        );
        data.insert(
            BrokerId::new("solace"),
            Quote {
                symbol,
                last_price: dec!(100),
                open: dec!(100),
                high: dec!(100),
                low: dec!(100),
                close: dec!(100),
                previous_close: dec!(100),
                change: Decimal::ZERO,
                change_percent: Decimal::ZERO,
                bid: dec!(99),
                bid_qty: 10,
                ask: dec!(100),
                ask_qty: 10,
                volume: 0,
                timestamp_ms: 0,
            },
        );

        let comparison = QuoteComparison {
            data,
            latency: FnvIndexMap::default(),
            errors: FnvIndexMap::default(),
        };

        assert_eq!(
            Orchestrator::best_broker_by_price(&comparison, Side::Buy),
            Some(BrokerId::new("solace"))
        );
    }
}
