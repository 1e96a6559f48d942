use crate::{
    error::SocketError,
    protocol::http::{BuildStrategy, rest::RestRequest},
};
use hmac::Mac;

/// Bytes-to-string encoding used by [`RequestSigner`] to turn a raw HMAC digest into a header
/// value (eg/ hex or base64).
pub mod encoder;

use encoder::Encoder;

/// Produces the broker-specific configuration (API key, timestamp, bytes-to-sign, ...) a
/// [`RequestSigner`] needs to compute and attach a request signature.
///
/// Implemented once per HMAC-signing venue family in `meridian-execution` (`broker::vantage`).
pub trait Signer {
    type Config<'a>
    where
        Self: 'a;

    /// Gather everything about this request that must be signed.
    fn config<'a, Request>(
        &'a self,
        request: &Request,
        builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'a>, SocketError>
    where
        Request: RestRequest;

    /// Feed the bytes to sign into the running [`Mac`].
    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac;

    /// Attach the computed signature (and any other auth headers) to the request builder.
    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, SocketError>;
}

/// [`BuildStrategy`] that signs every request using a [`Signer`] + HMAC [`Mac`] + [`Encoder`].
#[derive(Debug, Clone)]
pub struct RequestSigner<S, M, E> {
    pub signer: S,
    pub mac: M,
    pub encoder: E,
}

impl<S, M, E> RequestSigner<S, M, E> {
    pub fn new(signer: S, mac: M, encoder: E) -> Self {
        Self {
            signer,
            mac,
            encoder,
        }
    }
}

impl<S, M, E> BuildStrategy for RequestSigner<S, M, E>
where
    S: Signer,
    M: Mac + Clone,
    E: Encoder,
{
    fn build<Request>(
        &self,
        request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        let config = self.signer.config(&request, &builder)?;

        let mut mac = self.mac.clone();
        S::add_bytes_to_sign(&mut mac, &config);
        let signature = self.encoder.encode(mac.finalize().into_bytes());

        S::build_signed_request(config, builder, signature)
    }
}

/// [`BuildStrategy`] that authenticates purely via a bearer token header, no HMAC signing - used
/// by `broker::solace` (`spec.md` §6's European "Authorization: Bearer <token>" venue).
#[derive(Debug, Clone)]
pub struct BearerTokenStrategy {
    pub token: String,
}

impl BearerTokenStrategy {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl BuildStrategy for BearerTokenStrategy {
    fn build<Request>(
        &self,
        _request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        builder
            .bearer_auth(&self.token)
            .build()
            .map_err(SocketError::from)
    }
}

/// [`BuildStrategy`] that attaches a fixed pair of static headers - used by `broker::harborview`
/// (`spec.md` §6's US "X-App-Id" + "X-Secret" venue).
#[derive(Debug, Clone)]
pub struct StaticHeaderStrategy {
    pub headers: Vec<(&'static str, String)>,
}

impl StaticHeaderStrategy {
    pub fn new(headers: Vec<(&'static str, String)>) -> Self {
        Self { headers }
    }
}

impl BuildStrategy for StaticHeaderStrategy {
    fn build<Request>(
        &self,
        _request: Request,
        mut builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        builder.build().map_err(SocketError::from)
    }
}

/// [`BuildStrategy`] for venues that require no authentication at all (public endpoints).
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicStrategy;

impl BuildStrategy for PublicStrategy {
    fn build<Request>(
        &self,
        _request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        builder.build().map_err(SocketError::from)
    }
}

