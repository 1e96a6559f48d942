use async_trait::async_trait;
use meridian_instrument::ids::BrokerId;
use serde::{Deserialize, Serialize};

/// Opaque-to-the-core credential blob (`spec.md` §6): a tagged union where only the fields
/// present for a given broker are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsBlob {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at_ms: Option<i64>,
}

/// External collaborator that persists/retrieves [`CredentialsBlob`]s by [`BrokerId`]. No
/// in-crate implementation is shipped (`spec.md` §1 places local credential persistence out of
/// scope); an in-memory test double is provided under `#[cfg(test)]` in `auth.rs`.
///
/// Held behind `Arc<dyn CredentialsPort>` by the `AuthManager`, hence `#[async_trait]` rather
/// than RPITIT - see the note on [`crate::ports::master_contract::MasterContractPort`].
#[async_trait]
pub trait CredentialsPort: Send + Sync {
    async fn load(&self, broker_id: &BrokerId) -> Option<CredentialsBlob>;
    async fn store(&self, broker_id: &BrokerId, blob: CredentialsBlob);
    async fn delete(&self, broker_id: &BrokerId);
}
