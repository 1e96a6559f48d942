use crate::error::SocketError;
use serde::de::DeserializeOwned;

/// Signed/unsigned [`RestRequest`](rest::RestRequest) construction.
pub mod rest;

/// Request signing primitives (HMAC [`Signer`](private::Signer), [`Encoder`](private::encoder::Encoder)).
pub mod private;

/// Determines how a [`reqwest::RequestBuilder`] is finished into a [`reqwest::Request`] for a
/// given API: a public strategy only adds mandatory headers, a private (signed) strategy also
/// authenticates the request via a [`private::Signer`].
pub trait BuildStrategy {
    fn build<Request>(
        &self,
        request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: rest::RestRequest;
}

/// Parses the raw bytes of a [`reqwest::Response`] body into either a successful `Response`, or
/// classifies a venue error payload into `Self::OutputError`.
pub trait HttpParser {
    type ApiError: DeserializeOwned;
    type OutputError: From<SocketError>;

    /// Parse an API error payload that does not deserialise into the expected `Response`.
    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError;

    /// Parse the raw HTTP response body into `Response` on success, or [`Self::OutputError`] if
    /// the status/payload indicates a venue-side failure.
    fn parse<Response>(
        &self,
        status: reqwest::StatusCode,
        payload: &[u8],
    ) -> Result<Response, Self::OutputError>
    where
        Response: DeserializeOwned,
    {
        if status.is_success() {
            serde_json::from_slice::<Response>(payload).map_err(|error| {
                Self::OutputError::from(SocketError::Deserialise {
                    error,
                    payload: String::from_utf8_lossy(payload).to_string(),
                })
            })
        } else {
            match serde_json::from_slice::<Self::ApiError>(payload) {
                Ok(api_error) => Err(self.parse_api_error(status, api_error)),
                Err(error) => Err(Self::OutputError::from(SocketError::Deserialise {
                    error,
                    payload: String::from_utf8_lossy(payload).to_string(),
                })),
            }
        }
    }
}
