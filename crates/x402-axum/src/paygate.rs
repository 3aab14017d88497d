//! Pay-per-call gate shared by every route layered with [`X402Middleware`](crate::X402Middleware).
//!
//! The paygate:
//! - answers requests without `PAYMENT-SIGNATURE` with a 402 quote
//! - verifies the signed payment against the quote it would have issued,
//!   including an echoed `X-Quote-Hash` when the buyer sends one
//! - runs the protected handler
//! - settles, unless the handler failed, and attaches `PAYMENT-RESPONSE`

use axum_core::extract::Request;
use axum_core::response::Response;
use http::StatusCode;
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tracing::{Instrument, instrument};
use url::Url;
use x402_types::facilitator::Facilitator;
use x402_types::headers;

use crate::requirements::{PaymentRequirementBuilder, RequirementsError, SettledPayment};
use crate::responses::{error_response, insert_header, payment_required_response, resource_url};

pub struct Paygate<F> {
    pub builder: Arc<PaymentRequirementBuilder<F>>,
    pub amount_atomic: Arc<str>,
    pub base_url: Option<Arc<Url>>,
    pub settle_before_execution: bool,
}

impl<F> Clone for Paygate<F> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            amount_atomic: self.amount_atomic.clone(),
            base_url: self.base_url.clone(),
            settle_before_execution: self.settle_before_execution,
        }
    }
}

impl<F> Paygate<F>
where
    F: Facilitator + Send + Sync + 'static,
{
    /// Handles an incoming request, charging for it if the payment holds up.
    ///
    /// Payment problems become a 402 carrying the reason; the handler's own
    /// failures are returned as they are, unsettled.
    #[instrument(name = "x402.handle_request", skip_all, fields(amount = %self.amount_atomic))]
    pub async fn handle_request(
        self,
        inner: BoxCloneSyncService<Request, Response, Infallible>,
        req: Request,
    ) -> Result<Response, Infallible> {
        let resource_url = resource_url(self.base_url.as_deref(), req.uri());
        let payment_header = req
            .headers()
            .get(headers::PAYMENT_SIGNATURE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let Some(payment_header) = payment_header else {
            return Ok(self.payment_required(&resource_url, None).await);
        };
        let quote_hash = echoed_quote_hash(&req);

        match self
            .charge(inner, req, &payment_header, quote_hash.as_deref())
            .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Payment not accepted");
                Ok(self.payment_required(&resource_url, Some(e.reason())).await)
            }
        }
    }

    async fn charge(
        &self,
        inner: BoxCloneSyncService<Request, Response, Infallible>,
        req: Request,
        payment_header: &str,
        quote_hash: Option<&str>,
    ) -> Result<Response, RequirementsError> {
        let verified = self
            .builder
            .verify_quoted(payment_header, quote_hash, &self.amount_atomic)
            .await?;

        if self.settle_before_execution {
            tracing::debug!("Settling payment before request execution");
            let settlement = self.builder.settle(verified).await?;
            let mut response = call_inner(inner, req).await;
            attach_settlement(&mut response, &settlement);
            return Ok(response);
        }

        tracing::debug!("Settling payment after request execution");
        let mut response = call_inner(inner, req).await;
        if response.status().is_client_error() || response.status().is_server_error() {
            tracing::debug!(status = %response.status(), "Handler failed, payment not settled");
            return Ok(response);
        }
        let settlement = self.builder.settle(verified).await?;
        attach_settlement(&mut response, &settlement);
        Ok(response)
    }

    async fn payment_required(&self, resource_url: &str, error: Option<String>) -> Response {
        match self.builder.build(resource_url, &self.amount_atomic).await {
            Ok(required) => {
                let required = match error {
                    Some(error) => required.with_error(error),
                    None => required,
                };
                payment_required_response(&required)
            }
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.code(), &e.to_string()),
        }
    }
}

/// `X-Quote-Hash` as echoed by the buyer, if any.
pub(crate) fn echoed_quote_hash(req: &Request) -> Option<String> {
    req.headers()
        .get(headers::QUOTE_HASH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn call_inner(
    inner: BoxCloneSyncService<Request, Response, Infallible>,
    req: Request,
) -> Response {
    match inner.oneshot(req).instrument(tracing::info_span!("inner")).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    }
}

fn attach_settlement(response: &mut Response, settlement: &SettledPayment) {
    match settlement.to_header() {
        Ok(header) => insert_header(response, headers::PAYMENT_RESPONSE, &header),
        Err(e) => tracing::error!(error = %e, "Failed to encode PAYMENT-RESPONSE"),
    }
}
