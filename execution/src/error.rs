use meridian_instrument::ids::BrokerId;
use meridian_integration::error::SocketError;
use serde::{Deserialize, Serialize};

/// Canonical gateway error, returned as `{kind, message, retryable, broker_id?}` from every
/// public operation: a single tagged struct rather than a layered error hierarchy, matching the
/// flat canonical taxonomy `spec.md` §7 specifies.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub broker_id: Option<BrokerId>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.is_retryable_by_default();
        Self {
            kind,
            message: message.into(),
            retryable,
            broker_id: None,
        }
    }

    pub fn with_broker(mut self, broker_id: BrokerId) -> Self {
        self.broker_id = Some(broker_id);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn instrument_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InstrumentNotFound, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, message)
    }

    pub fn invalid_order(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOrder, message)
    }

    pub fn not_supported(capability: &str) -> Self {
        Self::new(
            ErrorKind::NotSupported,
            format!("{capability} is not supported by this broker"),
        )
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<SocketError> for GatewayError {
    fn from(error: SocketError) -> Self {
        let kind = match &error {
            SocketError::HttpTimeout(_) => ErrorKind::Timeout,
            SocketError::Http(_) | SocketError::WebSocket(_) => ErrorKind::NetworkError,
            SocketError::HttpResponse(status, _) if status.as_u16() == 429 => ErrorKind::RateLimited,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, error.to_string())
    }
}

/// Canonical error taxonomy from `spec.md` §7, flattened to one enum rather than a layered
/// hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("invalid input")]
    InvalidInput,
    #[error("instrument not found")]
    InstrumentNotFound,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("mfa required")]
    MfaRequired,
    #[error("unauthorized")]
    Unauthorized,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("invalid order")]
    InvalidOrder,
    #[error("rejected")]
    Rejected,
    #[error("market closed")]
    MarketClosed,
    #[error("instrument not tradable")]
    InstrumentNotTradable,
    #[error("rate limited")]
    RateLimited,
    #[error("too many requests")]
    TooManyRequests,
    #[error("network error")]
    NetworkError,
    #[error("timeout")]
    Timeout,
    #[error("not supported")]
    NotSupported,
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Default retryability per `spec.md` §7's propagation policy table. Individual call sites
    /// (eg/ order mutation) still force `retryable = false` even for a kind that is usually
    /// retryable, via [`GatewayError::with_retryable`].
    pub fn is_retryable_by_default(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::TooManyRequests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_defaults_to_retryable() {
        let error = GatewayError::new(ErrorKind::NetworkError, "connection reset");
        assert!(error.retryable);
    }

    #[test]
    fn invalid_order_defaults_to_not_retryable() {
        let error = GatewayError::new(ErrorKind::InvalidOrder, "quantity must be positive");
        assert!(!error.retryable);
    }

    #[test]
    fn with_broker_attaches_broker_id() {
        let error =
            GatewayError::invalid_token("token expired").with_broker(BrokerId::from("vantage"));
        assert_eq!(error.broker_id, Some(BrokerId::from("vantage")));
    }
}
