use chrono::Utc;
use hmac::Mac;
use meridian_integration::{
    error::SocketError,
    protocol::http::{private::Signer, rest::RestRequest},
};

/// HMAC-SHA256 request signer for the Vantage (Indian-style) venue: signature header derived
/// from `(api_key, api_secret, timestamp, path, body)`.
///
/// Implements the `Signer` trait over a timestamp+key+body-to-sign pattern, adapted to
/// Vantage's header names.
#[derive(Debug, Clone)]
pub struct VantageSigner {
    pub api_key: String,
}

impl VantageSigner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into() }
    }
}

pub struct VantageSignConfig<'a> {
    pub api_key: &'a str,
    pub timestamp: i64,
    pub path: String,
    pub body_to_sign: Option<&'a [u8]>,
}

impl Signer for VantageSigner {
    type Config<'a>
        = VantageSignConfig<'a>
    where
        Self: 'a;

    fn config<'a, Request>(
        &'a self,
        request: &Request,
        _builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'a>, SocketError>
    where
        Request: RestRequest,
    {
        Ok(VantageSignConfig {
            api_key: &self.api_key,
            timestamp: Utc::now().timestamp_millis(),
            path: request.path().into_owned(),
            body_to_sign: None,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac,
    {
        mac.update(config.api_key.as_bytes());
        mac.update(config.timestamp.to_string().as_bytes());
        mac.update(config.path.as_bytes());
        if let Some(body) = config.body_to_sign {
            mac.update(body);
        }
    }

    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, SocketError> {
        builder
            .header("X-Api-Key", config.api_key)
            .header("X-Timestamp", config.timestamp.to_string())
            .header("X-Signature", signature)
            .build()
            .map_err(SocketError::from)
    }
}
