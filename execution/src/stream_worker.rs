use crate::ports::notification::{NoopNotificationPort, NotificationPort};
use crate::session::{BrokerSession, SubscriptionEntry};
use futures::{SinkExt, StreamExt};
use meridian_instrument::{
    exchange::Symbol,
    ids::{BrokerId, SubscriptionId},
    tick::{StreamMode, Tick},
};
use meridian_integration::protocol::{
    backoff::ReconnectBackoff,
    websocket::{WsMessage, connect, is_websocket_disconnected},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Venue-specific wire format for the shared [`StreamWorker`] reconnect loop: every broker
/// speaks JSON-over-WSS (`spec.md` §6) but frames its subscribe/unsubscribe/tick payloads
/// differently, so only this thin codec differs per adapter.
pub trait StreamCodec: Send + Sync + 'static {
    fn subscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol, mode: StreamMode) -> String;
    fn unsubscribe_frame(&self, sub_id: &SubscriptionId, symbol: &Symbol) -> String;
    fn parse_tick(&self, broker_id: &BrokerId, text: &str) -> Option<Tick>;
}

/// Reconnect/resubscribe/tick-fan-in loop shared by every streaming-capable adapter
/// (`spec.md` §4.B): connect, replay the subscription table on (re)connect, reconnect with
/// [`ReconnectBackoff`] (base 500ms, cap 30s, +/-20% jitter) on disconnect. Implemented once
/// here rather than per broker, sharing the connect/disconnect-detection helpers in
/// `integration::protocol::websocket` across every broker client.
///
/// Backpressure is "latest-wins": the underlying `tokio::sync::broadcast` channel drops the
/// oldest buffered tick for every lagging receiver once its capacity is exceeded, which is this
/// gateway's realisation of `spec.md` §4.B's "lossy-latest" rule.
#[derive(Debug)]
pub struct StreamWorker {
    session: Arc<Mutex<BrokerSession>>,
    tick_tx: broadcast::Sender<Tick>,
}

impl StreamWorker {
    const TICK_CHANNEL_CAPACITY: usize = 1024;

    pub fn spawn<C: StreamCodec>(
        broker_id: BrokerId,
        ws_url: String,
        codec: Arc<C>,
        session: Arc<Mutex<BrokerSession>>,
    ) -> Self {
        Self::spawn_with_notifications(broker_id, ws_url, codec, session, Arc::new(NoopNotificationPort))
    }

    pub fn spawn_with_notifications<C: StreamCodec>(
        broker_id: BrokerId,
        ws_url: String,
        codec: Arc<C>,
        session: Arc<Mutex<BrokerSession>>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Self {
        let (tick_tx, _) = broadcast::channel(Self::TICK_CHANNEL_CAPACITY);
        tokio::spawn(run(
            broker_id,
            ws_url,
            codec,
            session.clone(),
            tick_tx.clone(),
            notifications,
        ));
        Self { session, tick_tx }
    }

    pub fn subscribe_ticks(&self) -> broadcast::Receiver<Tick> {
        self.tick_tx.subscribe()
    }

    /// Allocate a subscription id and record it in the session's subscription table
    /// (`spec.md` §3's "Subscription entries" lifecycle: created on subscribe). The worker task
    /// replays this table whenever it (re)connects.
    pub fn subscribe(&self, symbol: Symbol, mode: StreamMode) -> SubscriptionId {
        let sub_id = SubscriptionId::new(format!("{symbol}:{mode:?}"));
        self.session
            .lock()
            .subscriptions
            .insert(sub_id.clone(), SubscriptionEntry { symbol, mode });
        sub_id
    }

    /// Idempotent: removing an already-absent entry is a no-op (`spec.md` §8 property 4).
    pub fn unsubscribe(&self, symbol: &Symbol) {
        self.session
            .lock()
            .subscriptions
            .retain(|_, entry| &entry.symbol != symbol);
    }
}

async fn run<C: StreamCodec>(
    broker_id: BrokerId,
    ws_url: String,
    codec: Arc<C>,
    session: Arc<Mutex<BrokerSession>>,
    tick_tx: broadcast::Sender<Tick>,
    notifications: Arc<dyn NotificationPort>,
) {
    let mut backoff = ReconnectBackoff::default();
    let mut reconnecting = false;

    loop {
        match connect(ws_url.as_str()).await {
            Ok(websocket) => {
                backoff.reset();
                info!(broker_id = %broker_id, "adapter websocket connected");

                if reconnecting {
                    notifications.info(
                        "Broker Reconnected",
                        &format!("{broker_id} websocket connection restored"),
                        Some(&broker_id),
                    );
                }
                reconnecting = true;

                let (mut sink, mut stream) = websocket.split();

                let entries: Vec<_> = session
                    .lock()
                    .subscriptions
                    .iter()
                    .map(|(id, entry)| (id.clone(), entry.clone()))
                    .collect();

                for (sub_id, entry) in &entries {
                    let frame = codec.subscribe_frame(sub_id, &entry.symbol, entry.mode);
                    if sink.send(WsMessage::text(frame)).await.is_err() {
                        warn!(broker_id = %broker_id, "failed to replay subscription on reconnect");
                        break;
                    }
                }

                loop {
                    match stream.next().await {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(tick) = codec.parse_tick(&broker_id, text.as_str()) {
                                // Send failure just means there are currently no receivers;
                                // the tick is simply dropped, matching lossy delivery.
                                let _ = tick_tx.send(tick);
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) if is_websocket_disconnected(&error) => {
                            warn!(broker_id = %broker_id, %error, "adapter websocket disconnected");
                            break;
                        }
                        Some(Err(error)) => {
                            warn!(broker_id = %broker_id, %error, "adapter websocket error");
                        }
                        None => {
                            warn!(broker_id = %broker_id, "adapter websocket stream ended");
                            break;
                        }
                    }
                }
            }
            Err(error) => {
                warn!(broker_id = %broker_id, %error, "adapter websocket connect failed");
            }
        }

        let delay = backoff.next_delay();
        tokio::time::sleep(delay).await;
    }
}
