use crate::adapter::TickSource;
use crate::error::GatewayError;
use crate::FnvIndexMap;
use meridian_instrument::{exchange::Symbol, ids::BrokerId, tick::Tick};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event the aggregator emits downstream (`spec.md` §4.G): either a deduplicated, in-order tick,
/// or a stall notification when a subscribed (broker, symbol) pair has gone quiet.
#[derive(Debug, Clone)]
pub enum AggregatedEvent {
    Tick(Tick),
    SourceStalled { broker_id: BrokerId, symbol: Symbol },
}

const STALL_THRESHOLD: Duration = Duration::from_secs(10);
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

struct SubEntry {
    ref_count: u32,
    last_timestamp_ms: Option<i64>,
    last_seen: Instant,
}

/// Fan-in point for every broker's tick stream (`spec.md` §4.G): ref-counts subscriptions so two
/// callers subscribing to the same (broker, symbol) share one underlying adapter subscription,
/// drops out-of-order/duplicate ticks, and raises `SourceStalled` when a pair stops updating.
///
/// Uses a `tokio::sync::broadcast` channel rather than `integration::channel::Tx`: that
/// abstraction is generic over a transmission error type tied to exchange-specific wire errors,
/// which has no equivalent here - every event this aggregator emits already passed through
/// adapter-level error handling. `broadcast` also gives this channel the same "latest-wins"
/// backpressure the per-adapter fan-in already has in [`crate::stream_worker::StreamWorker`]: once
/// a lagging receiver falls more than [`Self::EVENT_CHANNEL_CAPACITY`] events behind, the oldest
/// buffered event is dropped for it rather than buffering without bound, matching `spec.md`'s
/// "lossy-latest" fan-in policy for this aggregator specifically.
pub struct StreamingAggregator {
    entries: Mutex<FnvIndexMap<(BrokerId, Symbol), SubEntry>>,
    tx: broadcast::Sender<AggregatedEvent>,
}

impl StreamingAggregator {
    const EVENT_CHANNEL_CAPACITY: usize = 1024;

    pub fn new() -> (Arc<Self>, broadcast::Receiver<AggregatedEvent>) {
        let (tx, rx) = broadcast::channel(Self::EVENT_CHANNEL_CAPACITY);
        (
            Arc::new(Self {
                entries: Mutex::new(FnvIndexMap::default()),
                tx,
            }),
            rx,
        )
    }

    /// Subscribe an additional downstream consumer to this aggregator's event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<AggregatedEvent> {
        self.tx.subscribe()
    }

    /// Ref-counted subscribe (`spec.md` §4.G `Subscribe`): only the first caller for a given
    /// (broker, symbol) pair needs to actually ask the adapter to subscribe; callers after that
    /// just increment the ref-count.
    pub async fn subscribe(
        &self,
        adapter: &dyn crate::adapter::ErasedAdapter,
        symbol: &Symbol,
        mode: meridian_instrument::tick::StreamMode,
    ) -> Result<(), GatewayError> {
        let broker_id = adapter.broker_id();
        let key = (broker_id.clone(), symbol.clone());

        let needs_subscribe = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&key) {
                Some(entry) => {
                    entry.ref_count += 1;
                    false
                }
                None => {
                    entries.insert(
                        key.clone(),
                        SubEntry {
                            ref_count: 1,
                            last_timestamp_ms: None,
                            last_seen: Instant::now(),
                        },
                    );
                    true
                }
            }
        };

        if needs_subscribe {
            if let Err(error) = adapter.subscribe(symbol, mode).await {
                self.entries.lock().shift_remove(&key);
                return Err(error);
            }
        }

        Ok(())
    }

    /// Ref-counted unsubscribe, idempotent: unsubscribing a pair with no remaining subscription
    /// is a no-op rather than an error.
    pub async fn unsubscribe(
        &self,
        adapter: &dyn crate::adapter::ErasedAdapter,
        symbol: &Symbol,
    ) -> Result<(), GatewayError> {
        let broker_id = adapter.broker_id();
        let key = (broker_id, symbol.clone());

        let should_unsubscribe = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&key) {
                Some(entry) if entry.ref_count > 1 => {
                    entry.ref_count -= 1;
                    false
                }
                Some(_) => {
                    entries.shift_remove(&key);
                    true
                }
                None => false,
            }
        };

        if should_unsubscribe {
            adapter.unsubscribe(symbol).await?;
        }

        Ok(())
    }

    /// Feed one raw tick through ordering/dedup and emit it (`spec.md` §4.G, §8 property 4:
    /// "strictly monotonic per (broker, symbol)"). Ticks that arrive out of order or with a
    /// duplicate timestamp are dropped silently save for a debug log.
    pub fn ingest(&self, tick: Tick) {
        let key = (tick.broker_id.clone(), tick.symbol.clone());
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(&key) else {
            debug!(broker_id = %tick.broker_id, symbol = %tick.symbol, "tick for unsubscribed pair dropped");
            return;
        };

        if let Some(last) = entry.last_timestamp_ms {
            if tick.timestamp_ms <= last {
                debug!(broker_id = %tick.broker_id, symbol = %tick.symbol, "out-of-order or duplicate tick dropped");
                return;
            }
        }

        entry.last_timestamp_ms = Some(tick.timestamp_ms);
        entry.last_seen = Instant::now();
        drop(entries);

        let _ = self.tx.send(AggregatedEvent::Tick(tick));
    }

    /// Background loop emitting `SourceStalled` for any (broker, symbol) pair whose last tick is
    /// older than [`STALL_THRESHOLD`] (`spec.md` §4.G, scenario S6). Intended to be spawned once
    /// via `tokio::spawn` alongside [`Self::spawn_ingest_loop`].
    pub async fn run_stall_watchdog(self: Arc<Self>) {
        let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
        loop {
            interval.tick().await;

            let stalled: Vec<(BrokerId, Symbol)> = self
                .entries
                .lock()
                .iter()
                .filter(|(_, entry)| entry.last_seen.elapsed() >= STALL_THRESHOLD)
                .map(|(key, _)| key.clone())
                .collect();

            for (broker_id, symbol) in stalled {
                let _ = self.tx.send(AggregatedEvent::SourceStalled {
                    broker_id: broker_id.clone(),
                    symbol: symbol.clone(),
                });
                warn!(%broker_id, %symbol, "tick source stalled");
            }
        }
    }

    /// Forward an adapter's tick broadcast into [`Self::ingest`] (`spec.md` §4.G). Intended to be
    /// spawned once per adapter via `tokio::spawn`.
    pub async fn spawn_ingest_loop(self: Arc<Self>, adapter: Arc<dyn TickSource>) {
        let mut rx = adapter.subscribe_ticks();
        loop {
            match rx.recv().await {
                Ok(tick) => self.ingest(tick),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "tick aggregator lagged behind adapter broadcast");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_instrument::exchange::Exchange;

    fn tick(symbol: &Symbol, timestamp_ms: i64) -> Tick {
        Tick {
            broker_id: BrokerId::new("vantage"),
            symbol: symbol.clone(),
            last_price: rust_decimal::Decimal::ZERO,
            last_qty: 0,
            bid: rust_decimal::Decimal::ZERO,
            ask: rust_decimal::Decimal::ZERO,
            volume: 0,
            timestamp_ms,
        }
    }

    #[tokio::test]
    async fn out_of_order_ticks_are_dropped() {
        let (aggregator, mut rx) = StreamingAggregator::new();
        let symbol = Symbol::new("INFY", Exchange::Nse);
        aggregator
            .entries
            .lock()
            .insert(
                (BrokerId::new("vantage"), symbol.clone()),
                SubEntry {
                    ref_count: 1,
                    last_timestamp_ms: None,
                    last_seen: Instant::now(),
                },
            );

        aggregator.ingest(tick(&symbol, 100));
        aggregator.ingest(tick(&symbol, 50));
        aggregator.ingest(tick(&symbol, 100));
        aggregator.ingest(tick(&symbol, 200));

        drop(aggregator);

        let mut received = Vec::new();
        loop {
            match rx.recv().await {
                Ok(AggregatedEvent::Tick(tick)) => received.push(tick.timestamp_ms),
                Ok(AggregatedEvent::SourceStalled { .. }) => {}
                Err(_) => break,
            }
        }
        assert_eq!(received, vec![100, 200]);
    }

    #[tokio::test]
    async fn ingest_for_unsubscribed_pair_is_dropped() {
        let (aggregator, mut rx) = StreamingAggregator::new();
        let symbol = Symbol::new("INFY", Exchange::Nse);
        aggregator.ingest(tick(&symbol, 100));
        drop(aggregator);
        assert!(rx.recv().await.is_err());
    }
}
