use axum_core::extract::Request;
use axum_core::response::Response;
use http::StatusCode;
use http::header::AUTHORIZATION;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};
use tracing::instrument;
use url::Url;
use x402_types::access_pass::{AccessPassClaims, TierAdvertisement};
use x402_types::facilitator::Facilitator;
use x402_types::headers;
use x402_types::timestamp::UnixTimestamp;

use crate::access_pass::tiers::{ResolvedTier, TierQuery, TierTable};
use crate::access_pass::token::{AccessPassSigner, TokenError};
use crate::paygate::echoed_quote_hash;
use crate::requirements::{PaymentRequirementBuilder, RequirementsError, SettledPayment};
use crate::responses::{
    error_response, insert_header, json_response, payment_required_response, resource_url,
};

/// Sells access passes in front of a protected service.
///
/// As a tower [`Layer`], each request goes through:
///
/// 1. A valid bearer token (`Authorization: Bearer ..` or `ACCESS-PASS`) lets
///    the request through with [`AccessPassClaims`] in its extensions.
/// 2. A `PAYMENT-SIGNATURE` header buys a pass for the tier selected by the
///    `tier` or `duration` query parameter. The answer is the purchase
///    receipt with the token in `ACCESS-PASS`; the protected service is not
///    called.
/// 3. Anything else gets a 402 quoting the selected tier, with the tier table
///    in `X-ACCESS-PASS-TIERS`.
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use x402_axum::access_pass::{AccessPassIssuer, AccessPassSigner, TierTable};
/// use x402_axum::facilitator_client::FacilitatorClient;
/// use x402_axum::requirements::PaymentRequirementBuilder;
/// use x402_types::chain::ChainId;
///
/// let builder = PaymentRequirementBuilder::new(
///     FacilitatorClient::try_from("https://facilitator.x402.rs").unwrap(),
///     ChainId::new("eip155", "84532"),
///     "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
///     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
/// );
/// let tiers = TierTable::new([("1h", "$0.10"), ("24h", "$2.00")], Some("$0.15"), 6).unwrap();
/// let signer = AccessPassSigner::new("change-me", "api.example.com").unwrap();
///
/// let app: Router = Router::new()
///     .route("/data", get(|| async { "premium" }))
///     .layer(AccessPassIssuer::new(builder, signer, tiers));
/// ```
pub struct AccessPassIssuer<F> {
    builder: Arc<PaymentRequirementBuilder<F>>,
    signer: Arc<AccessPassSigner>,
    tiers: Arc<TierTable>,
    base_url: Option<Arc<Url>>,
}

impl<F> Clone for AccessPassIssuer<F> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            signer: self.signer.clone(),
            tiers: self.tiers.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

/// A freshly bought pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasedPass {
    pub token: String,
    pub claims: AccessPassClaims,
    pub settlement: SettledPayment,
}

impl PurchasedPass {
    /// `200` with the token in `ACCESS-PASS` and the settlement in `PAYMENT-RESPONSE`.
    pub fn into_response(self) -> Response {
        let body = json!({
            "accessPass": self.token,
            "tier": self.claims.tier,
            "duration": self.claims.duration,
            "issuedAt": self.claims.iat,
            "expiresAt": self.claims.exp,
            "payer": self.claims.payer,
            "network": self.claims.network,
            "transaction": self.settlement.transaction,
        });
        let mut response = json_response(StatusCode::OK, &body);
        insert_header(&mut response, headers::ACCESS_PASS, &self.token);
        match self.settlement.to_header() {
            Ok(header) => insert_header(&mut response, headers::PAYMENT_RESPONSE, &header),
            Err(e) => tracing::error!(error = %e, "Failed to encode PAYMENT-RESPONSE"),
        }
        response
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error(transparent)]
    Payment(#[from] RequirementsError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl<F> AccessPassIssuer<F> {
    pub fn new(builder: PaymentRequirementBuilder<F>, signer: AccessPassSigner, tiers: TierTable) -> Self {
        Self {
            builder: Arc::new(builder),
            signer: Arc::new(signer),
            tiers: Arc::new(tiers),
            base_url: None,
        }
    }

    /// Base for the resource URLs put into 402 answers. Defaults to `http://localhost/`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(Arc::new(base_url));
        self
    }

    pub fn builder(&self) -> &PaymentRequirementBuilder<F> {
        &self.builder
    }

    pub fn signer(&self) -> &AccessPassSigner {
        &self.signer
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn advertisement(&self) -> TierAdvertisement {
        self.tiers.advertisement(self.signer.issuer())
    }

    /// Claims of a valid, unexpired pass issued here. Everything else is `None`.
    pub fn verify_token(&self, token: &str) -> Option<AccessPassClaims> {
        self.signer.verify(token, UnixTimestamp::now())
    }

    /// Mints a pass for `tier`, starting now.
    pub fn mint(
        &self,
        tier: &ResolvedTier,
        settlement: SettledPayment,
    ) -> Result<PurchasedPass, TokenError> {
        let claims = AccessPassClaims::new(
            tier.id.clone(),
            tier.seconds,
            UnixTimestamp::now(),
            settlement.payer.clone(),
            settlement.network.clone(),
            self.signer.issuer(),
        );
        let token = self.signer.mint(&claims)?;
        Ok(PurchasedPass {
            token,
            claims,
            settlement,
        })
    }
}

impl<F> AccessPassIssuer<F>
where
    F: Facilitator + Send + Sync + 'static,
{
    /// Settles `payment_header` at the price of `tier` and mints the pass.
    ///
    /// A `quote_hash` echoed by the buyer must match the quote for `tier`.
    pub async fn purchase(
        &self,
        payment_header: &str,
        quote_hash: Option<&str>,
        tier: &ResolvedTier,
    ) -> Result<PurchasedPass, PurchaseError> {
        let verified = self
            .builder
            .verify_quoted(payment_header, quote_hash, &tier.price_atomic.to_string())
            .await?;
        let settlement = self.builder.settle(verified).await?;
        let pass = self.mint(tier, settlement)?;
        tracing::info!(
            tier = %pass.claims.tier,
            payer = %pass.claims.payer,
            expires_at = pass.claims.exp,
            "Access pass issued"
        );
        Ok(pass)
    }

    #[instrument(name = "x402.access_pass", skip_all, fields(path = %req.uri().path()))]
    pub async fn handle_request(
        self,
        inner: BoxCloneSyncService<Request, Response, Infallible>,
        mut req: Request,
    ) -> Result<Response, Infallible> {
        if let Some(claims) = bearer_token(&req).and_then(|token| self.verify_token(token)) {
            tracing::debug!(tier = %claims.tier, "Access pass accepted");
            req.extensions_mut().insert(claims);
            return inner.oneshot(req).await;
        }

        let query = TierQuery::from_query(req.uri().query());
        let resource_url = resource_url(self.base_url.as_deref(), req.uri());
        let tier = match self.tiers.resolve(&query) {
            Ok(tier) => tier,
            Err(e) => {
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    e.code(),
                    &e.to_string(),
                ));
            }
        };

        let payment_header = req
            .headers()
            .get(headers::PAYMENT_SIGNATURE)
            .and_then(|value| value.to_str().ok());
        let Some(payment_header) = payment_header else {
            return Ok(self.payment_required(&resource_url, &tier, None).await);
        };

        let quote_hash = echoed_quote_hash(&req);
        match self
            .purchase(payment_header, quote_hash.as_deref(), &tier)
            .await
        {
            Ok(pass) => Ok(pass.into_response()),
            Err(PurchaseError::Payment(e)) => {
                tracing::warn!(code = e.code(), error = %e, "Access pass purchase failed");
                Ok(self
                    .payment_required(&resource_url, &tier, Some(e.reason()))
                    .await)
            }
            Err(PurchaseError::Token(e)) => {
                tracing::error!(error = %e, "Payment settled but the access pass could not be minted");
                Ok(error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "access_pass_mint_failed",
                    &e.to_string(),
                ))
            }
        }
    }

    async fn payment_required(
        &self,
        resource_url: &str,
        tier: &ResolvedTier,
        error: Option<String>,
    ) -> Response {
        let required = match self
            .builder
            .build(resource_url, &tier.price_atomic.to_string())
            .await
        {
            Ok(required) => required,
            Err(e) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.code(),
                    &e.to_string(),
                );
            }
        };
        let required = match error {
            Some(error) => required.with_error(error),
            None => required,
        };
        let mut response = payment_required_response(&required);
        match self.advertisement().to_header() {
            Ok(header) => insert_header(&mut response, headers::ACCESS_PASS_TIERS, &header),
            Err(e) => tracing::error!(error = %e, "Failed to encode X-ACCESS-PASS-TIERS"),
        }
        response
    }
}

/// `Authorization: Bearer <token>`, else the `ACCESS-PASS` header.
fn bearer_token(req: &Request) -> Option<&str> {
    let from_authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
        });
    from_authorization.or_else(|| {
        req.headers()
            .get(headers::ACCESS_PASS)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    })
}

impl<S, F> Layer<S> for AccessPassIssuer<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = AccessPassService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessPassService {
            issuer: self.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service produced by [`AccessPassIssuer`] as a layer.
pub struct AccessPassService<F> {
    issuer: AccessPassIssuer<F>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Clone for AccessPassService<F> {
    fn clone(&self) -> Self {
        Self {
            issuer: self.issuer.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<F> Service<Request> for AccessPassService<F>
where
    F: Facilitator + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let issuer = self.issuer.clone();
        let inner = self.inner.clone();
        Box::pin(issuer.handle_request(inner, req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Extension, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use x402_types::chain::ChainId;
    use x402_types::proto::{PaymentRequired, SettleResponse};

    const ISSUER: &str = "api.example.com";

    fn issuer(facilitator: FakeFacilitator) -> AccessPassIssuer<FakeFacilitator> {
        let builder = PaymentRequirementBuilder::new(
            facilitator,
            ChainId::new("eip155", "84532"),
            BASE_SEPOLIA_USDC,
            EVM_PAY_TO,
        );
        let tiers = TierTable::new(
            [("1h", "$0.50"), ("24h", "$2.00"), ("bogus", "$1")],
            Some("$0.60"),
            6,
        )
        .unwrap();
        let signer = AccessPassSigner::new("test-secret", ISSUER).unwrap();
        AccessPassIssuer::new(builder, signer, tiers)
            .with_base_url(Url::parse("https://api.example.com/").unwrap())
    }

    fn app(issuer: AccessPassIssuer<FakeFacilitator>, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/data",
                get(move |Extension(claims): Extension<AccessPassClaims>| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        format!("premium for {}", claims.tier)
                    }
                }),
            )
            .layer(issuer)
    }

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn payment_required(response: &Response) -> PaymentRequired {
        let header = response.headers().get("payment-required").unwrap();
        PaymentRequired::from_header(header.as_bytes()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_no_credentials_quotes_cheapest_tier() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(issuer(FakeFacilitator::new()), hits.clone())
            .oneshot(request("/data", &[]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let required = payment_required(&response);
        assert_eq!(required.resource.url, "https://api.example.com/data");
        assert_eq!(required.accepts[0].amount.as_deref(), Some("500000"));
        assert!(response.headers().contains_key("x-quote-hash"));

        let tiers = response.headers().get("x-access-pass-tiers").unwrap();
        let advertisement = TierAdvertisement::from_header(tiers.as_bytes()).unwrap();
        let ids: Vec<_> = advertisement
            .tiers
            .unwrap()
            .into_iter()
            .map(|tier| tier.id)
            .collect();
        assert_eq!(ids, vec!["1h", "24h"]);
        assert_eq!(advertisement.issuer.as_deref(), Some(ISSUER));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_purchase_mints_requested_tier() {
        let facilitator = FakeFacilitator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(issuer(facilitator.clone()), hits.clone());

        let quote = app
            .clone()
            .oneshot(request("/data?tier=24h", &[]))
            .await
            .unwrap();
        let required = payment_required(&quote);
        assert_eq!(required.accepts[0].amount.as_deref(), Some("2000000"));

        let header = pay_first_option(&required);
        let response = app
            .oneshot(request("/data?tier=24h", &[("PAYMENT-SIGNATURE", &header)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let token = response
            .headers()
            .get("access-pass")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let claims = AccessPassClaims::peek(&token).unwrap();
        assert_eq!(claims.tier, "24h");
        assert_eq!(claims.duration, 86_400);
        assert_eq!(claims.exp, claims.iat + 86_400);
        assert_eq!(claims.payer, EVM_PAYER);
        assert_eq!(claims.iss, ISSUER);

        let settlement = response.headers().get("payment-response").unwrap();
        assert!(
            SettleResponse::from_header(settlement.as_bytes())
                .unwrap()
                .is_success()
        );
        let body = body_json(response).await;
        assert_eq!(body["accessPass"], token);
        assert_eq!(body["tier"], "24h");
        assert_eq!(body["expiresAt"], claims.exp);

        assert_eq!(facilitator.settle_count(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_token_bypasses_payment() {
        let facilitator = FakeFacilitator::new();
        let issuer = issuer(facilitator.clone());
        let claims = AccessPassClaims::new("1h", 3_600, UnixTimestamp::now(), EVM_PAYER, BASE_SEPOLIA, ISSUER);
        let token = issuer.signer().mint(&claims).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(issuer, hits.clone());

        let bearer = format!("Bearer {token}");
        let response = app
            .clone()
            .oneshot(request("/data", &[("Authorization", &bearer)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("/data", &[("ACCESS-PASS", &token)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"premium for 1h");

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(facilitator.verify_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_or_tampered_token_falls_through_to_402() {
        let issuer = issuer(FakeFacilitator::new());
        let expired = AccessPassClaims::new(
            "1h",
            3_600,
            UnixTimestamp::now() - 7_200,
            EVM_PAYER,
            BASE_SEPOLIA,
            ISSUER,
        );
        let expired = issuer.signer().mint(&expired).unwrap();
        let foreign = AccessPassSigner::new("another-secret", ISSUER)
            .unwrap()
            .mint(&AccessPassClaims::new("1h", 3_600, UnixTimestamp::now(), EVM_PAYER, BASE_SEPOLIA, ISSUER))
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(issuer, hits.clone());

        for token in [expired, foreign, "garbage".to_string()] {
            let bearer = format!("Bearer {token}");
            let response = app
                .clone()
                .oneshot(request("/data", &[("Authorization", &bearer)]))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_payment_returns_402_with_reason() {
        let facilitator = FakeFacilitator::rejecting("insufficient_funds");
        let app = app(issuer(facilitator.clone()), Arc::new(AtomicUsize::new(0)));
        let quote = app.clone().oneshot(request("/data", &[])).await.unwrap();
        let header = pay_first_option(&payment_required(&quote));

        let response = app
            .oneshot(request("/data", &[("PAYMENT-SIGNATURE", &header)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            payment_required(&response).error.as_deref(),
            Some("insufficient_funds")
        );
        assert!(!response.headers().contains_key("access-pass"));
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_quote_hash_mints_nothing() {
        let facilitator = FakeFacilitator::new();
        let app = app(issuer(facilitator.clone()), Arc::new(AtomicUsize::new(0)));
        let quote = app
            .clone()
            .oneshot(request("/data?tier=24h", &[]))
            .await
            .unwrap();
        let header = pay_first_option(&payment_required(&quote));

        let response = app
            .oneshot(request(
                "/data?tier=24h",
                &[("PAYMENT-SIGNATURE", &header), ("X-Quote-Hash", "deadbeef")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            payment_required(&response).error.as_deref(),
            Some("quote_mismatch")
        );
        assert!(!response.headers().contains_key("access-pass"));
        assert_eq!(facilitator.verify_count(), 0);
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_echoed_quote_hash_is_accepted() {
        let facilitator = FakeFacilitator::new();
        let app = app(issuer(facilitator.clone()), Arc::new(AtomicUsize::new(0)));
        let quote = app.clone().oneshot(request("/data", &[])).await.unwrap();
        let hash = quote
            .headers()
            .get("x-quote-hash")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let header = pay_first_option(&payment_required(&quote));

        let response = app
            .oneshot(request(
                "/data",
                &[("PAYMENT-SIGNATURE", &header), ("X-Quote-Hash", &hash)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("access-pass"));
        assert_eq!(facilitator.settle_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tier_is_bad_request() {
        let app = app(issuer(FakeFacilitator::new()), Arc::new(AtomicUsize::new(0)));
        let response = app.oneshot(request("/data?tier=3y", &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "unknown_tier");
    }

    #[tokio::test]
    async fn test_duration_purchase_priced_at_rate() {
        let app = app(issuer(FakeFacilitator::new()), Arc::new(AtomicUsize::new(0)));
        let quote = app
            .clone()
            .oneshot(request("/data?duration=7200", &[]))
            .await
            .unwrap();
        let required = payment_required(&quote);
        assert_eq!(required.accepts[0].amount.as_deref(), Some("1200000"));

        let header = pay_first_option(&required);
        let response = app
            .oneshot(request("/data?duration=7200", &[("PAYMENT-SIGNATURE", &header)]))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["tier"], "2h");
        assert_eq!(body["duration"], 7_200);
    }

    #[tokio::test]
    async fn test_odd_duration_mints_parsable_tier() {
        let app = app(issuer(FakeFacilitator::new()), Arc::new(AtomicUsize::new(0)));
        let quote = app
            .clone()
            .oneshot(request("/data?duration=90", &[]))
            .await
            .unwrap();
        let header = pay_first_option(&payment_required(&quote));
        let response = app
            .oneshot(request("/data?duration=90", &[("PAYMENT-SIGNATURE", &header)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let token = response.headers().get("access-pass").unwrap().to_str().unwrap().to_string();
        let claims = AccessPassClaims::peek(&token).unwrap();
        assert_eq!(claims.tier, "2m");
        assert!(claims.tier.parse::<x402_types::access_pass::TierId>().is_ok());
        assert_eq!(claims.duration, 90);
        assert_eq!(claims.exp, claims.iat + 90);
    }
}
