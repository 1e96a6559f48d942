use crate::adapter::{Credentials, ErasedAdapter};
use crate::error::GatewayError;
use crate::ports::credentials::CredentialsPort;
use crate::ports::logging::LoggingPort;
use crate::ports::notification::NotificationPort;
use crate::FnvIndexMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use meridian_instrument::ids::BrokerId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Snapshot published to listeners whenever a broker's authentication state changes
/// (`spec.md` §4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStatus {
    pub broker_id: BrokerId,
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub message: String,
}

struct RefreshState {
    expires_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

/// Process-wide broker registry plus token-refresh scheduler (`spec.md` §4.C).
///
/// `adapters` is populated once at startup (single-writer via `register`, many-reader
/// afterwards), since `spec.md` needs more than one broker live per process and the registry
/// is never mutated again outside registration.
pub struct AuthManager {
    adapters: Mutex<FnvIndexMap<BrokerId, Arc<dyn ErasedAdapter>>>,
    credentials: Arc<dyn CredentialsPort>,
    refresh_lead: Duration,
    listeners: Mutex<Vec<Box<dyn Fn(&AuthStatus) + Send + Sync>>>,
    refresh_state: Mutex<FnvIndexMap<BrokerId, RefreshState>>,
    notifications: Arc<dyn NotificationPort>,
    logging: Arc<dyn LoggingPort>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("brokers", &self.adapters.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}

impl AuthManager {
    /// Ports default to no-op collaborators (`spec.md` §4.H fires through them regardless, a real
    /// presentation/log sink just has nothing to render until one is wired in via
    /// [`Self::with_notifications`]/[`Self::with_logging`]).
    pub fn new(credentials: Arc<dyn CredentialsPort>, refresh_lead: Duration) -> Self {
        Self {
            adapters: Mutex::new(FnvIndexMap::default()),
            credentials,
            refresh_lead,
            listeners: Mutex::new(Vec::new()),
            refresh_state: Mutex::new(FnvIndexMap::default()),
            notifications: Arc::new(crate::ports::notification::NoopNotificationPort),
            logging: Arc::new(crate::ports::logging::NoopLoggingPort),
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationPort>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_logging(mut self, logging: Arc<dyn LoggingPort>) -> Self {
        self.logging = logging;
        self
    }

    /// Register an adapter under its `broker_id` (`spec.md` §4.C `Register`). Re-registering the
    /// same id replaces the previous adapter.
    pub fn register(&self, adapter: Arc<dyn ErasedAdapter>) {
        self.adapters.lock().insert(adapter.broker_id(), adapter);
    }

    pub fn adapter(&self, broker_id: &BrokerId) -> Option<Arc<dyn ErasedAdapter>> {
        self.adapters.lock().get(broker_id).cloned()
    }

    pub fn broker_ids(&self) -> Vec<BrokerId> {
        self.adapters.lock().keys().cloned().collect()
    }

    /// Add a listener notified in registration order on every `AuthStatus` change. Listeners
    /// never mutate the registry mid-dispatch (`spec.md` §4.C: "no re-entrant mutation during
    /// dispatch").
    pub fn on_auth_status_change(&self, listener: impl Fn(&AuthStatus) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    /// `InitializeBroker` (`spec.md` §4.C): load stored credentials and authenticate.
    pub async fn initialize_broker(&self, broker_id: &BrokerId) -> Result<AuthStatus, GatewayError> {
        let adapter = self.adapter(broker_id).ok_or_else(|| {
            GatewayError::invalid_input(format!("broker '{broker_id}' is not registered"))
        })?;

        let blob = self.credentials.load(broker_id).await.ok_or_else(|| {
            GatewayError::invalid_token(format!("no stored credentials for broker '{broker_id}'"))
                .with_broker(broker_id.clone())
        })?;

        let response = adapter
            .authenticate(Credentials {
                api_key: blob.api_key,
                api_secret: blob.api_secret,
                access_token: blob.access_token,
                refresh_token: blob.refresh_token,
            })
            .await?;

        Ok(self.publish_status(broker_id, &response))
    }

    fn publish_status(&self, broker_id: &BrokerId, response: &crate::adapter::AuthResponse) -> AuthStatus {
        let status = AuthStatus {
            broker_id: broker_id.clone(),
            authenticated: response.success,
            user_id: response.user_id.clone(),
            token_expires_at: response.expires_at,
            message: response.message.clone(),
        };

        self.refresh_state.lock().insert(
            broker_id.clone(),
            RefreshState {
                expires_at: response.expires_at,
                consecutive_failures: 0,
            },
        );

        for listener in self.listeners.lock().iter() {
            listener(&status);
        }

        status
    }

    fn next_refresh_target(&self) -> Option<(BrokerId, DateTime<Utc>)> {
        let lead = ChronoDuration::from_std(self.refresh_lead).unwrap_or(ChronoDuration::zero());

        self.refresh_state
            .lock()
            .iter()
            .filter_map(|(broker_id, state)| {
                state.expires_at.map(|expires_at| (broker_id.clone(), expires_at - lead))
            })
            .min_by_key(|(_, refresh_at)| *refresh_at)
    }

    async fn refresh_one(&self, broker_id: &BrokerId) {
        let Some(adapter) = self.adapter(broker_id) else {
            self.refresh_state.lock().shift_remove(broker_id);
            return;
        };

        match adapter.refresh_token().await {
            Ok(response) => {
                info!(broker_id = %broker_id, "refreshed broker token");
                self.publish_status(broker_id, &response);
            }
            Err(error) => {
                warn!(broker_id = %broker_id, %error, "token refresh failed");
                self.logging.warn("auth", &error.message, Some(broker_id));

                let failed_status = {
                    let mut state_guard = self.refresh_state.lock();
                    let Some(state) = state_guard.get_mut(broker_id) else {
                        return;
                    };

                    state.consecutive_failures += 1;
                    if state.consecutive_failures >= 3 {
                        state.expires_at = None;
                        Some(AuthStatus {
                            broker_id: broker_id.clone(),
                            authenticated: false,
                            user_id: None,
                            token_expires_at: None,
                            message: error.message.clone(),
                        })
                    } else {
                        // Retry in 30s, per `spec.md` §4.C's "3 consecutive failures spaced 30s
                        // apart" rule.
                        state.expires_at = Some(Utc::now() + ChronoDuration::seconds(30) + lead_as_chrono(self.refresh_lead));
                        None
                    }
                };

                if let Some(status) = failed_status {
                    self.logging.error("auth", &status.message, Some(broker_id));
                    self.notifications.error(
                        "Broker Authentication Failed",
                        &status.message,
                        Some(broker_id),
                    );

                    for listener in self.listeners.lock().iter() {
                        listener(&status);
                    }
                }
            }
        }
    }

    /// Background scheduler loop: sleeps until the earliest `refresh_at` across every broker
    /// with a known token expiry, then refreshes it (`spec.md` §4.C:
    /// `refresh_at = token_expires_at - refresh_lead`). Intended to be spawned once via
    /// `tokio::spawn` and run for the gateway's lifetime.
    pub async fn run_refresh_loop(self: Arc<Self>) {
        loop {
            match self.next_refresh_target() {
                Some((broker_id, refresh_at)) => {
                    let now = Utc::now();
                    if refresh_at > now {
                        if let Ok(wait) = (refresh_at - now).to_std() {
                            tokio::time::sleep(wait).await;
                        }
                    }
                    self.refresh_one(&broker_id).await;
                }
                None => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
    }
}

fn lead_as_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ports::credentials::CredentialsBlob;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory [`CredentialsPort`] test double (`spec.md` §1 places real persistence out of
    /// scope for this crate).
    #[derive(Debug, Default)]
    pub struct InMemoryCredentials {
        store: Mutex<HashMap<BrokerId, CredentialsBlob>>,
    }

    impl InMemoryCredentials {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, broker_id: BrokerId, blob: CredentialsBlob) {
            self.store.lock().insert(broker_id, blob);
        }
    }

    #[async_trait]
    impl CredentialsPort for InMemoryCredentials {
        async fn load(&self, broker_id: &BrokerId) -> Option<CredentialsBlob> {
            self.store.lock().get(broker_id).cloned()
        }

        async fn store(&self, broker_id: &BrokerId, blob: CredentialsBlob) {
            self.store.lock().insert(broker_id.clone(), blob);
        }

        async fn delete(&self, broker_id: &BrokerId) {
            self.store.lock().remove(broker_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::InMemoryCredentials;
    use super::*;
    use crate::broker::paper::PaperBroker;
    use crate::ports::credentials::CredentialsBlob;
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
    async fn initialize_broker_publishes_status_to_listeners() {
        let credentials = Arc::new(InMemoryCredentials::new());
        credentials.seed(BrokerId::paper(), CredentialsBlob::default());

        let manager = AuthManager::new(credentials, Duration::from_secs(300));
        manager.register(Arc::new(PaperBroker::new(funds())));

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        manager.on_auth_status_change(move |status| received_clone.lock().push(status.clone()));

        let status = manager.initialize_broker(&BrokerId::paper()).await.unwrap();
        assert!(status.authenticated);
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn initialize_broker_fails_without_stored_credentials() {
        let credentials = Arc::new(InMemoryCredentials::new());
        let manager = AuthManager::new(credentials, Duration::from_secs(300));
        manager.register(Arc::new(PaperBroker::new(funds())));

        let error = manager.initialize_broker(&BrokerId::paper()).await.unwrap_err();
        assert_eq!(error.kind, crate::error::ErrorKind::InvalidToken);
    }
}
