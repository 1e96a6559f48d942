use crate::error::{ErrorKind, GatewayError};
use meridian_instrument::ids::BrokerId;
use meridian_integration::protocol::http::HttpParser;
use serde::Deserialize;

/// Solace's error envelope: `{"error": "snake_case_code", "error_description": "...", "status": 400}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SolaceApiError {
    pub error: String,
    pub error_description: String,
}

#[derive(Debug, Clone)]
pub struct SolaceParser {
    pub broker_id: BrokerId,
}

impl SolaceParser {
    pub fn new(broker_id: BrokerId) -> Self {
        Self { broker_id }
    }
}

impl HttpParser for SolaceParser {
    type ApiError = SolaceApiError;
    type OutputError = GatewayError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        let kind = classify(status, &error.error);
        GatewayError::new(kind, format!("{}: {}", error.error, error.error_description))
            .with_broker(self.broker_id.clone())
    }
}

fn classify(status: reqwest::StatusCode, code: &str) -> ErrorKind {
    match code {
        "invalid_token" | "expired_token" => ErrorKind::InvalidToken,
        "access_denied" | "unauthorized" => ErrorKind::Unauthorized,
        "mfa_required" | "step_up_auth_required" => ErrorKind::MfaRequired,
        "insufficient_funds" | "margin_call" => ErrorKind::InsufficientFunds,
        "invalid_order" | "invalid_quantity" | "invalid_price" => ErrorKind::InvalidOrder,
        "order_rejected" => ErrorKind::Rejected,
        "market_closed" => ErrorKind::MarketClosed,
        "instrument_not_tradable" => ErrorKind::InstrumentNotTradable,
        "instrument_not_found" | "unknown_instrument" => ErrorKind::InstrumentNotFound,
        "rate_limit_exceeded" => ErrorKind::RateLimited,
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
        assert_eq!(classify(reqwest::StatusCode::UNAUTHORIZED, "invalid_token"), ErrorKind::InvalidToken);
        assert_eq!(classify(reqwest::StatusCode::BAD_REQUEST, "margin_call"), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn falls_back_to_internal_for_unknown_codes() {
        assert_eq!(classify(reqwest::StatusCode::BAD_REQUEST, "something_new"), ErrorKind::Internal);
    }
}
