use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Signed or unsigned HTTP REST client.
pub mod client;

/// A single REST API request: its HTTP method, path, optional query/body, and response type.
///
/// Every broker adapter (`spec.md` §4.B) implements this once per venue endpoint it calls
/// (`PlaceOrder`, `GetOrders`, `GetQuote`, ...); the [`client::RestClient`] handles build/execute/
/// parse generically over any `RestRequest`.
pub trait RestRequest {
    type Response: DeserializeOwned;
    type QueryParams: Serialize;
    type Body: Serialize;

    /// Path appended to the [`RestClient::base_url`](client::RestClient::base_url).
    fn path(&self) -> std::borrow::Cow<'static, str>;

    fn method() -> reqwest::Method;

    fn query_params(&self) -> Option<&Self::QueryParams> {
        None
    }

    fn body(&self) -> Option<&Self::Body> {
        None
    }

    /// Per-request timeout; defaults to 10s for a call that sits behind a per-adapter rate
    /// limiter and a caller-supplied deadline.
    fn timeout() -> Duration {
        Duration::from_secs(10)
    }
}
