//! Axum middleware for charging per call on protected routes.
//!
//! Requests without a `PAYMENT-SIGNATURE` header get a `402 Payment Required`
//! quote. Signed payments are verified with the facilitator before the
//! handler runs and settled either before or after it (configurable).
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use x402_axum::X402Middleware;
//! use x402_axum::facilitator_client::FacilitatorClient;
//! use x402_axum::requirements::PaymentRequirementBuilder;
//! use x402_types::chain::ChainId;
//!
//! let builder = PaymentRequirementBuilder::new(
//!     FacilitatorClient::try_from("https://facilitator.x402.rs").unwrap(),
//!     ChainId::new("eip155", "84532"),
//!     "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
//!     "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
//! )
//! .with_description("VIP content");
//! let x402 = X402Middleware::new(builder);
//!
//! let app: Router = Router::new().route(
//!     "/protected",
//!     get(|| async { "This is VIP content!" }).layer(x402.with_money_price("$0.01").unwrap()),
//! );
//! ```
//!
//! ## Settlement Timing
//!
//! By default, settlement occurs **after** the request is processed, and a
//! handler answering with an error status is not charged. You can change this behavior:
//!
//! - **[`X402Middleware::settle_before_execution`]** - Settle payment **before** request execution.
//! - **[`X402Middleware::settle_after_execution`]** - Settle payment **after** request execution (default).
//!
//! ## Configuration Notes
//!
//! - **[`X402Middleware::with_price`]** sets the price in atomic token units,
//!   **[`X402Middleware::with_money_price`]** in human units like `"$0.01"`.
//! - **[`X402Middleware::with_base_url`]** sets the base URL for computing full resource URLs.
//!   If not set, defaults to `http://localhost/` (avoid in production).

use axum_core::extract::Request;
use axum_core::response::Response;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use url::Url;
use x402_types::facilitator::Facilitator;
use x402_types::util::money_amount::{MoneyAmount, MoneyAmountParseError};

use crate::paygate::Paygate;
use crate::requirements::PaymentRequirementBuilder;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Token decimals for {asset} on {network} are unknown; configure them on the builder")]
    UnknownDecimals { network: String, asset: String },
    #[error(transparent)]
    Amount(#[from] MoneyAmountParseError),
}

pub struct X402Middleware<F> {
    builder: Arc<PaymentRequirementBuilder<F>>,
    base_url: Option<Arc<Url>>,
    settle_before_execution: bool,
}

impl<F> Clone for X402Middleware<F> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            base_url: self.base_url.clone(),
            settle_before_execution: self.settle_before_execution,
        }
    }
}

impl<F> X402Middleware<F> {
    pub fn new(builder: PaymentRequirementBuilder<F>) -> Self {
        Self {
            builder: Arc::new(builder),
            base_url: None,
            settle_before_execution: false,
        }
    }

    pub fn builder(&self) -> &PaymentRequirementBuilder<F> {
        &self.builder
    }

    pub fn with_base_url(&self, base_url: Url) -> Self {
        let mut this = self.clone();
        this.base_url = Some(Arc::new(base_url));
        this
    }

    pub fn settle_before_execution(&self) -> Self {
        let mut this = self.clone();
        this.settle_before_execution = true;
        this
    }

    pub fn settle_after_execution(&self) -> Self {
        let mut this = self.clone();
        this.settle_before_execution = false;
        this
    }

    /// Layer charging `amount_atomic` token units per call.
    pub fn with_price(&self, amount_atomic: impl Into<String>) -> X402LayerBuilder<F> {
        let amount_atomic: String = amount_atomic.into();
        X402LayerBuilder {
            paygate: Paygate {
                builder: self.builder.clone(),
                amount_atomic: Arc::from(amount_atomic),
                base_url: self.base_url.clone(),
                settle_before_execution: self.settle_before_execution,
            },
        }
    }

    /// Layer charging a human amount such as `"$0.01"`, converted with the
    /// builder's token decimals.
    pub fn with_money_price(&self, price: &str) -> Result<X402LayerBuilder<F>, PriceError> {
        let decimals = self
            .builder
            .token_decimals()
            .ok_or_else(|| PriceError::UnknownDecimals {
                network: self.builder.network().to_string(),
                asset: self.builder.asset().to_string(),
            })?;
        let atomic = MoneyAmount::parse(price)?.to_atomic(decimals)?;
        Ok(self.with_price(atomic.to_string()))
    }
}

/// A priced [`X402Middleware`], ready to be used as a layer.
pub struct X402LayerBuilder<F> {
    paygate: Paygate<F>,
}

impl<F> Clone for X402LayerBuilder<F> {
    fn clone(&self) -> Self {
        Self {
            paygate: self.paygate.clone(),
        }
    }
}

impl<F> X402LayerBuilder<F> {
    pub fn amount_atomic(&self) -> &str {
        &self.paygate.amount_atomic
    }
}

impl<S, F> Layer<S> for X402LayerBuilder<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = X402MiddlewareService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        X402MiddlewareService {
            paygate: self.paygate.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

pub struct X402MiddlewareService<F> {
    paygate: Paygate<F>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Clone for X402MiddlewareService<F> {
    fn clone(&self) -> Self {
        Self {
            paygate: self.paygate.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<F> Service<Request> for X402MiddlewareService<F>
where
    F: Facilitator + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        Box::pin(self.paygate.clone().handle_request(self.inner.clone(), req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use x402_types::chain::ChainId;
    use x402_types::proto::{PaymentRequired, SettleResponse};

    fn middleware(facilitator: FakeFacilitator) -> X402Middleware<FakeFacilitator> {
        X402Middleware::new(PaymentRequirementBuilder::new(
            facilitator,
            ChainId::new("eip155", "84532"),
            BASE_SEPOLIA_USDC,
            EVM_PAY_TO,
        ))
    }

    fn app(x402: &X402Middleware<FakeFacilitator>, status: StatusCode, hits: Arc<AtomicUsize>) -> Router {
        let handler = move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (status, "content")
            }
        };
        Router::new()
            .route("/cheap", get(handler.clone()).layer(x402.with_price("10000")))
            .route("/pricey", get(handler).layer(x402.with_price("990000")))
    }

    fn request(uri: &str, payment: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(payment) = payment {
            builder = builder.header("PAYMENT-SIGNATURE", payment);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn payment_required(response: &Response) -> PaymentRequired {
        let header = response.headers().get("payment-required").unwrap();
        PaymentRequired::from_header(header.as_bytes()).unwrap()
    }

    async fn quote(app: &Router, uri: &str) -> PaymentRequired {
        let response = app.clone().oneshot(request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        payment_required(&response)
    }

    #[tokio::test]
    async fn test_unpaid_request_gets_quote() {
        let hits = Arc::new(AtomicUsize::new(0));
        let x402 = middleware(FakeFacilitator::new())
            .with_base_url(Url::parse("https://api.example.com/").unwrap());
        let app = app(&x402, StatusCode::OK, hits.clone());

        let required = quote(&app, "/cheap?q=1").await;
        assert_eq!(required.resource.url, "https://api.example.com/cheap?q=1");
        assert_eq!(required.accepts[0].amount.as_deref(), Some("10000"));
        assert_eq!(required.accepts[0].pay_to, EVM_PAY_TO);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_paid_request_runs_handler_and_settles() {
        let facilitator = FakeFacilitator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&middleware(facilitator.clone()), StatusCode::OK, hits.clone());

        let header = pay_first_option(&quote(&app, "/cheap").await);
        let response = app.oneshot(request("/cheap", Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let settlement = response.headers().get("payment-response").unwrap();
        assert_eq!(
            SettleResponse::from_header(settlement.as_bytes()).unwrap(),
            facilitator.settle
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(facilitator.settle_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_is_not_settled() {
        let facilitator = FakeFacilitator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(
            &middleware(facilitator.clone()),
            StatusCode::INTERNAL_SERVER_ERROR,
            hits.clone(),
        );

        let header = pay_first_option(&quote(&app, "/cheap").await);
        let response = app.oneshot(request("/cheap", Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key("payment-response"));
        assert_eq!(facilitator.verify_count(), 1);
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_settle_before_execution_charges_failed_handler() {
        let facilitator = FakeFacilitator::new();
        let x402 = middleware(facilitator.clone()).settle_before_execution();
        let app = app(&x402, StatusCode::INTERNAL_SERVER_ERROR, Arc::new(AtomicUsize::new(0)));

        let header = pay_first_option(&quote(&app, "/cheap").await);
        let response = app.oneshot(request("/cheap", Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key("payment-response"));
        assert_eq!(facilitator.settle_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_payment_gets_402_with_reason() {
        let facilitator = FakeFacilitator::rejecting("invalid_exact_evm_payload_signature");
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&middleware(facilitator.clone()), StatusCode::OK, hits.clone());

        let header = pay_first_option(&quote(&app, "/cheap").await);
        let response = app.oneshot(request("/cheap", Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            payment_required(&response).error.as_deref(),
            Some("invalid_exact_evm_payload_signature")
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_payment_for_cheaper_route_is_refused() {
        let facilitator = FakeFacilitator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&middleware(facilitator.clone()), StatusCode::OK, hits.clone());

        let header = pay_first_option(&quote(&app, "/cheap").await);
        let response = app.oneshot(request("/pricey", Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let required = payment_required(&response);
        assert_eq!(required.error.as_deref(), Some("no_matching_requirements"));
        assert_eq!(required.accepts[0].amount.as_deref(), Some("990000"));
        assert_eq!(facilitator.verify_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_quote_hash_is_refused() {
        let facilitator = FakeFacilitator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&middleware(facilitator.clone()), StatusCode::OK, hits.clone());

        let quoted = app.clone().oneshot(request("/cheap", None)).await.unwrap();
        let echoed = quoted.headers().get("x-quote-hash").unwrap().clone();
        let header = pay_first_option(&payment_required(&quoted));

        let mut stale = request("/cheap", Some(&header));
        stale
            .headers_mut()
            .insert("x-quote-hash", http::HeaderValue::from_static("deadbeef"));
        let response = app.clone().oneshot(stale).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            payment_required(&response).error.as_deref(),
            Some("quote_mismatch")
        );
        assert_eq!(facilitator.verify_count(), 0);
        assert_eq!(facilitator.settle_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let mut fresh = request("/cheap", Some(&header));
        fresh.headers_mut().insert("x-quote-hash", echoed);
        let response = app.oneshot(fresh).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(facilitator.settle_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_facilitator_is_server_error() {
        let mut facilitator = FakeFacilitator::new();
        facilitator.unavailable = true;
        let app = app(&middleware(facilitator), StatusCode::OK, Arc::new(AtomicUsize::new(0)));

        let response = app.oneshot(request("/cheap", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_money_price_uses_token_decimals() {
        let x402 = middleware(FakeFacilitator::new());
        assert_eq!(x402.with_money_price("$0.01").unwrap().amount_atomic(), "10000");

        let unknown = X402Middleware::new(PaymentRequirementBuilder::new(
            FakeFacilitator::new(),
            ChainId::new("eip155", "84532"),
            "0x0000000000000000000000000000000000000001",
            EVM_PAY_TO,
        ));
        assert!(matches!(
            unknown.with_money_price("$0.01"),
            Err(PriceError::UnknownDecimals { .. })
        ));
        assert!(matches!(x402.with_money_price("cheap"), Err(PriceError::Amount(_))));
    }
}
