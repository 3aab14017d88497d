//! A [`Facilitator`] that talks to a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] handles the `/verify`, `/settle` and `/supported`
//! endpoints. `/supported` answers are cached for
//! [`FacilitatorClient::DEFAULT_SUPPORTED_CACHE_TTL`]; verify and settle are
//! never cached and never retried.
//!
//! ```rust
//! use x402_axum::facilitator_client::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://facilitator.x402.rs").unwrap();
//! assert_eq!(facilitator.verify_url().as_str(), "https://facilitator.x402.rs/verify");
//! ```
//!
//! The inherent [`FacilitatorClient::verify`] and [`FacilitatorClient::settle`]
//! surface transport failures as [`FacilitatorClientError`]. Through the
//! [`Facilitator`] trait the same failures come back as an ordinary
//! [`VerifyResponse::Invalid`] / [`SettleResponse::Error`] carrying one of
//! [`REASON_UNREACHABLE`], [`REASON_HTTP_ERROR`] or [`REASON_INVALID_RESPONSE`].

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{Instrument, Span, instrument};
use url::Url;
use x402_types::facilitator::Facilitator;
use x402_types::proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

/// The facilitator could not be reached.
pub const REASON_UNREACHABLE: &str = "facilitator_unreachable";
/// The facilitator answered with a non-200 status.
pub const REASON_HTTP_ERROR: &str = "facilitator_http_error";
/// The facilitator answered 200 with a body that is not the expected JSON.
pub const REASON_INVALID_RESPONSE: &str = "facilitator_invalid_response";

#[derive(Clone, Debug)]
struct SupportedCacheState {
    response: SupportedResponse,
    expires_at: std::time::Instant,
}

/// TTL cache for the `/supported` response.
///
/// Each clone has an independent cache state.
#[derive(Debug)]
pub struct SupportedCache {
    ttl: Duration,
    state: RwLock<Option<SupportedCacheState>>,
}

impl SupportedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    /// Returns the cached response if it has not expired.
    pub async fn get(&self) -> Option<SupportedResponse> {
        let guard = self.state.read().await;
        let cache = guard.as_ref()?;
        if std::time::Instant::now() < cache.expires_at {
            Some(cache.response.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, response: SupportedResponse) {
        let mut guard = self.state.write().await;
        *guard = Some(SupportedCacheState {
            response,
            expires_at: std::time::Instant::now() + self.ttl,
        });
    }

    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }
}

impl Clone for SupportedCache {
    fn clone(&self) -> Self {
        Self::new(self.ttl)
    }
}

/// A client for a remote x402 facilitator.
///
/// Clones do not share the `/supported` cache; wrap the client in an `Arc`
/// to share one.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: Client,
    /// Sent with each request, e.g. an API key.
    headers: HeaderMap,
    timeout: Option<Duration>,
    supported_cache: SupportedCache,
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    /// Never fails: transport problems become [`VerifyResponse::Invalid`].
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        Ok(self.verify_or_invalid(request).await)
    }

    /// Never fails: transport problems become [`SettleResponse::Error`].
    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        Ok(self.settle_or_error(request).await)
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        FacilitatorClient::supported(self).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl FacilitatorClientError {
    /// Stable reason string reported to buyers in place of this error.
    pub fn reason(&self) -> &'static str {
        match self {
            FacilitatorClientError::UrlParse { .. } | FacilitatorClientError::Http { .. } => {
                REASON_UNREACHABLE
            }
            FacilitatorClientError::HttpStatus { .. } => REASON_HTTP_ERROR,
            FacilitatorClientError::JsonDeserialization { .. }
            | FacilitatorClientError::ResponseBodyRead { .. } => REASON_INVALID_RESPONSE,
        }
    }
}

impl FacilitatorClient {
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(60);

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> &Option<Duration> {
        &self.timeout
    }

    pub fn supported_cache(&self) -> &SupportedCache {
        &self.supported_cache
    }

    /// Sets up `./verify`, `./settle` and `./supported` relative to `base_url`.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let client = Client::new();
        let join = |path: &str, context: &'static str| {
            base_url
                .join(path)
                .map_err(|e| FacilitatorClientError::UrlParse { context, source: e })
        };
        let verify_url = join("./verify", "Failed to construct ./verify URL")?;
        let settle_url = join("./settle", "Failed to construct ./settle URL")?;
        let supported_url = join("./supported", "Failed to construct ./supported URL")?;
        Ok(Self {
            client,
            base_url,
            verify_url,
            settle_url,
            supported_url,
            headers: HeaderMap::new(),
            timeout: None,
            supported_cache: SupportedCache::new(Self::DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Default is one minute. Use [`Self::without_supported_cache()`] to disable caching.
    pub fn with_supported_cache_ttl(&self, ttl: Duration) -> Self {
        let mut this = self.clone();
        this.supported_cache = SupportedCache::new(ttl);
        this
    }

    pub fn without_supported_cache(&self) -> Self {
        self.with_supported_cache_ttl(Duration::ZERO)
    }

    /// Sends a `POST /verify` request to the facilitator.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .instrument(tracing::info_span!(
                "x402.facilitator_client.verify",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ))
            .await
    }

    /// Sends a `POST /settle` request to the facilitator.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .instrument(tracing::info_span!(
                "x402.facilitator_client.settle",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ))
            .await
    }

    /// [`Self::verify`], with failures folded into [`VerifyResponse::Invalid`].
    pub async fn verify_or_invalid(&self, request: &VerifyRequest) -> VerifyResponse {
        match self.verify(request).await {
            Ok(response) => response,
            Err(error) => VerifyResponse::invalid(None, error.reason()),
        }
    }

    /// [`Self::settle`], with failures folded into [`SettleResponse::Error`].
    pub async fn settle_or_error(&self, request: &SettleRequest) -> SettleResponse {
        match self.settle(request).await {
            Ok(response) => response,
            Err(error) => SettleResponse::Error {
                reason: error.reason().to_string(),
                network: request.payment_requirements.network.clone(),
            },
        }
    }

    /// Always makes the HTTP request.
    #[instrument(
        name = "x402.facilitator_client.supported",
        skip_all,
        fields(otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
        err
    )]
    async fn supported_inner(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        self.get_json(&self.supported_url, "GET /supported").await
    }

    /// Sends a `GET /supported` request, answering from the cache while it is fresh.
    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        if let Some(response) = self.supported_cache.get().await {
            return Ok(response);
        }

        tracing::info!("x402.facilitator_client.supported_cache_miss");

        let response = self.supported_inner().await?;
        self.supported_cache.set(response.clone()).await;

        Ok(response)
    }

    /// `context` names the call in traces and errors, e.g. `"POST /verify"`.
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.post(url.clone()).json(payload);
        self.send(req, context).await
    }

    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.get(url.clone());
        self.send(req, context).await
    }

    async fn send<R>(
        &self,
        mut req: reqwest::RequestBuilder,
        context: &'static str,
    ) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let result = match req.send().await {
            Err(e) => Err(FacilitatorClientError::Http { context, source: e }),
            Ok(http_response) if http_response.status() == StatusCode::OK => http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e }),
            Ok(http_response) => {
                let status = http_response.status();
                match http_response.text().await {
                    Ok(body) => Err(FacilitatorClientError::HttpStatus {
                        context,
                        status,
                        body,
                    }),
                    Err(e) => Err(FacilitatorClientError::ResponseBodyRead { context, source: e }),
                }
            }
        };

        record_result_on_span(&result);

        result
    }
}

/// Parses the URL, normalising any trailing slashes to exactly one.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}

fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}
