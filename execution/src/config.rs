use meridian_instrument::ids::BrokerId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level gateway configuration, deserialized via `serde` into a typed struct rather than a
/// bespoke parser.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub brokers: Vec<BrokerConfig>,
    /// How long before token expiry the `AuthManager` schedules a refresh (`spec.md` §4.C).
    #[serde(with = "humantime_secs", default = "GatewayConfig::default_refresh_lead")]
    pub refresh_lead: Duration,
    /// Per-call deadline applied to every `Orchestrator` fan-out (`spec.md` §4.D, default 5s).
    #[serde(with = "humantime_secs", default = "GatewayConfig::default_fan_out_deadline")]
    pub fan_out_deadline: Duration,
}

impl GatewayConfig {
    pub fn default_refresh_lead() -> Duration {
        Duration::from_secs(300)
    }

    pub fn default_fan_out_deadline() -> Duration {
        Duration::from_secs(5)
    }

    pub fn broker(&self, broker_id: &BrokerId) -> Option<&BrokerConfig> {
        self.brokers.iter().find(|broker| &broker.broker_id == broker_id)
    }
}

/// Per-broker section of [`GatewayConfig`]: wire base URLs, the venue's published rate limits,
/// and whether this broker entry should be routed into paper trading instead of live execution.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub broker_id: BrokerId,
    pub rest_base_url: String,
    pub websocket_base_url: String,
    pub paper_mode: bool,
    pub rate_limit: RateLimitConfig,
}

/// Token-bucket sizing derived from a broker's published per-second limits (`spec.md` §5).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub orders_per_second: u32,
    pub quotes_per_second: u32,
}

mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_broker_config_from_json() {
        let json = r#"{
            "brokers": [{
                "broker_id": "vantage_primary",
                "rest_base_url": "https://api.vantage.example",
                "websocket_base_url": "wss://stream.vantage.example",
                "paper_mode": false,
                "rate_limit": {"orders_per_second": 10, "quotes_per_second": 50}
            }],
            "refresh_lead": 300,
            "fan_out_deadline": 5
        }"#;

        let config: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.brokers.len(), 1);
        assert_eq!(config.refresh_lead, Duration::from_secs(300));
        assert!(config.broker(&BrokerId::new("vantage_primary")).is_some());
    }
}
