use crate::error::{ErrorKind, GatewayError};
use meridian_instrument::ids::BrokerId;
use meridian_integration::protocol::http::HttpParser;
use serde::Deserialize;

/// Harborview's error envelope: `{"code": "SCREAMING_CASE", "message": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HarborviewApiError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct HarborviewParser {
    pub broker_id: BrokerId,
}

impl HarborviewParser {
    pub fn new(broker_id: BrokerId) -> Self {
        Self { broker_id }
    }
}

impl HttpParser for HarborviewParser {
    type ApiError = HarborviewApiError;
    type OutputError = GatewayError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        let kind = classify(status, &error.code);
        GatewayError::new(kind, format!("{}: {}", error.code, error.message))
            .with_broker(self.broker_id.clone())
    }
}

fn classify(status: reqwest::StatusCode, code: &str) -> ErrorKind {
    match code {
        "AUTH_INVALID" | "AUTH_EXPIRED" => ErrorKind::InvalidToken,
        "FORBIDDEN" => ErrorKind::Unauthorized,
        "MFA_REQUIRED" => ErrorKind::MfaRequired,
        "INSUFFICIENT_BUYING_POWER" | "MARGIN_CALL" => ErrorKind::InsufficientFunds,
        "INVALID_ORDER_PARAMS" | "INVALID_QUANTITY" | "INVALID_PRICE" => ErrorKind::InvalidOrder,
        "ORDER_REJECTED" => ErrorKind::Rejected,
        "MARKET_CLOSED" => ErrorKind::MarketClosed,
        "SYMBOL_NOT_TRADABLE" => ErrorKind::InstrumentNotTradable,
        "SYMBOL_NOT_FOUND" | "UNKNOWN_TICKER" => ErrorKind::InstrumentNotFound,
        "THROTTLED" => ErrorKind::RateLimited,
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
        assert_eq!(
            classify(reqwest::StatusCode::UNAUTHORIZED, "AUTH_EXPIRED"),
            ErrorKind::InvalidToken
        );
        assert_eq!(
            classify(reqwest::StatusCode::BAD_REQUEST, "INSUFFICIENT_BUYING_POWER"),
            ErrorKind::InsufficientFunds
        );
    }

    #[test]
    fn falls_back_to_internal_for_unknown_codes() {
        assert_eq!(
            classify(reqwest::StatusCode::BAD_REQUEST, "SOMETHING_NEW"),
            ErrorKind::Internal
        );
    }

    #[test]
    fn status_429_is_rate_limited_regardless_of_code() {
        assert_eq!(
            classify(reqwest::StatusCode::TOO_MANY_REQUESTS, "UNKNOWN"),
            ErrorKind::RateLimited
        );
    }
}
