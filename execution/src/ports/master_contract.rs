use async_trait::async_trait;
use meridian_instrument::{exchange::Symbol, ids::BrokerId};
use rust_decimal::Decimal;

/// Venue-specific instrument identity resolved by a master-contract snapshot lookup
/// (`spec.md` §4.I). A lookup miss is treated by the calling adapter as
/// `GatewayError::instrument_not_found` unless a broker-native search endpoint exists as
/// fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentContract {
    pub instrument_id: String,
    pub lot_size: u64,
    pub tick_size: Decimal,
}

/// External collaborator backing `Symbol -> {instrument_id, lot_size, tick_size}` lookups,
/// typically backed by a downloaded daily CSV/JSON snapshot per broker (`spec.md` §4.I).
///
/// Unlike [`crate::adapter::BrokerAdapter`], this port is held behind `Arc<dyn MasterContractPort>`
/// so every broker adapter can share one instance - it uses `#[async_trait]` rather than RPITIT
/// for that reason, since RPITIT traits aren't object-safe and a shared dyn collaborator is
/// exactly what's needed here.
#[async_trait]
pub trait MasterContractPort: Send + Sync {
    async fn lookup(&self, broker_id: &BrokerId, symbol: &Symbol) -> Option<InstrumentContract>;
}
