use crate::error::{ErrorKind, GatewayError};
use meridian_instrument::ids::BrokerId;
use meridian_integration::protocol::http::HttpParser;
use serde::Deserialize;

/// Vantage's error envelope: `{"error_code": "...", "error_message": "...", "request_id": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct VantageApiError {
    pub error_code: String,
    pub error_message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VantageParser {
    pub broker_id: BrokerId,
}

impl VantageParser {
    pub fn new(broker_id: BrokerId) -> Self {
        Self { broker_id }
    }
}

impl HttpParser for VantageParser {
    type ApiError = VantageApiError;
    type OutputError = GatewayError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        let kind = classify(status, &error.error_code);
        GatewayError::new(kind, format!("{}: {}", error.error_code, error.error_message))
            .with_broker(self.broker_id.clone())
    }
}

/// Maps Vantage's `(http_status, error_code)` pair onto the canonical taxonomy (`spec.md` §7).
fn classify(status: reqwest::StatusCode, code: &str) -> ErrorKind {
    match code {
        "INVALID_TOKEN" | "TOKEN_EXPIRED" => ErrorKind::InvalidToken,
        "UNAUTHORIZED" => ErrorKind::Unauthorized,
        "MFA_REQUIRED" => ErrorKind::MfaRequired,
        "INSUFFICIENT_FUNDS" | "MARGIN_EXCEEDED" => ErrorKind::InsufficientFunds,
        "INVALID_ORDER" | "INVALID_QUANTITY" | "INVALID_PRICE" => ErrorKind::InvalidOrder,
        "ORDER_REJECTED" => ErrorKind::Rejected,
        "MARKET_CLOSED" => ErrorKind::MarketClosed,
        "INSTRUMENT_NOT_TRADABLE" => ErrorKind::InstrumentNotTradable,
        "INSTRUMENT_NOT_FOUND" | "UNKNOWN_SYMBOL" => ErrorKind::InstrumentNotFound,
        "RATE_LIMIT_EXCEEDED" => ErrorKind::RateLimited,
        _ if status.as_u16() == 429 => ErrorKind::RateLimited,
        _ if status.is_server_error() => ErrorKind::NetworkError,
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_error_codes() {
        assert_eq!(classify(reqwest::StatusCode::UNAUTHORIZED, "INVALID_TOKEN"), ErrorKind::InvalidToken);
        assert_eq!(classify(reqwest::StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS"), ErrorKind::InsufficientFunds);
        assert_eq!(classify(reqwest::StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"), ErrorKind::RateLimited);
    }

    #[test]
    fn falls_back_to_internal_for_unknown_codes() {
        assert_eq!(classify(reqwest::StatusCode::BAD_REQUEST, "SOMETHING_NEW"), ErrorKind::Internal);
    }

    #[test]
    fn server_error_status_without_known_code_is_network_error() {
        assert_eq!(classify(reqwest::StatusCode::BAD_GATEWAY, "UPSTREAM_DOWN"), ErrorKind::NetworkError);
    }
}
