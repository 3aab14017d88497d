//! Client-side x402 payment handling for reqwest.
//!
//! [`X402Client`] holds the registered [`ChainAdapter`]s and the payment
//! policy (preferred network, spend cap, access-pass purchases) and runs the
//! request → 402 → pay → retry loop as a [`reqwest_middleware::Middleware`].

use alloy_primitives::U256;
use http::header::AUTHORIZATION;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;
use x402_types::adapter::ChainAdapter;
use x402_types::chain::ChainId;
use x402_types::headers;
use x402_types::proto::{PaymentPayload, PaymentRequired, PaymentRequirements};
use x402_types::timestamp::UnixTimestamp;

use crate::access_pass_cache::AccessPassCache;
use crate::error::X402Error;

const SOLANA_NAMESPACE: &str = "solana";

/// Which access pass to buy when a server offers them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PassPurchase {
    /// Whatever the server quotes without a tier or duration query.
    #[default]
    ServerDefault,
    /// A listed tier id, sent as `?tier=`.
    Tier(String),
    /// Seconds, sent as `?duration=`.
    Duration(u64),
}

/// The x402 payment client.
///
/// ```rust,no_run
/// use alloy_primitives::U256;
/// use x402_reqwest::{PassPurchase, X402Client};
/// # fn adapter() -> std::sync::Arc<dyn x402_types::adapter::ChainAdapter> { unimplemented!() }
///
/// let client = X402Client::new()
///     .register(adapter())
///     .with_preferred_network("eip155:8453")
///     .with_spend_cap(U256::from(1_000_000u64))
///     .with_access_passes(PassPurchase::Tier("24h".into()));
/// ```
#[derive(Clone, Default)]
pub struct X402Client {
    adapters: Vec<Arc<dyn ChainAdapter>>,
    preferred_network: Option<String>,
    spend_cap: Option<U256>,
    access_passes: Option<PassPurchase>,
    pass_cache: AccessPassCache,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let namespaces: Vec<&str> = self.adapters.iter().map(|a| a.namespace()).collect();
        f.debug_struct("X402Client")
            .field("adapters", &namespaces)
            .field("preferred_network", &self.preferred_network)
            .field("spend_cap", &self.spend_cap)
            .field("access_passes", &self.access_passes)
            .finish()
    }
}

impl X402Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a chain adapter. The first registered adapter that can
    /// handle a network serves it.
    pub fn register<A>(mut self, adapter: A) -> Self
    where
        A: ChainAdapter + 'static,
    {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Network to pick when a server offers several payable ones. CAIP-2 id
    /// or alias.
    pub fn with_preferred_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    /// Largest single payment, in atomic token units.
    pub fn with_spend_cap(mut self, cap: U256) -> Self {
        self.spend_cap = Some(cap);
        self
    }

    /// Buys access passes from servers that advertise them, and reuses them
    /// until they expire.
    pub fn with_access_passes(mut self, purchase: PassPurchase) -> Self {
        self.access_passes = Some(purchase);
        self
    }

    pub fn with_access_pass_cache(mut self, cache: AccessPassCache) -> Self {
        self.pass_cache = cache;
        self
    }

    pub fn access_pass_cache(&self) -> &AccessPassCache {
        &self.pass_cache
    }

    /// Picks the option to pay: among options with a registered, connected
    /// adapter, the preferred network if offered, else the first in server order.
    pub fn select<'a>(
        &'a self,
        required: &'a PaymentRequired,
    ) -> Result<(&'a PaymentRequirements, &'a Arc<dyn ChainAdapter>), X402Error> {
        let candidates: Vec<_> = required
            .accepts
            .iter()
            .filter_map(|option| {
                self.adapters
                    .iter()
                    .find(|adapter| adapter.can_handle(&option.network) && adapter.is_connected())
                    .map(|adapter| (option, adapter))
            })
            .collect();

        let preferred = self.preferred_network.as_deref().and_then(|preferred| {
            candidates
                .iter()
                .find(|(option, _)| same_network(&option.network, preferred))
        });
        let selected = preferred
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| X402Error::NoMatchingPaymentOption {
                networks: required.networks(),
            })?;
        debug!(
            network = %selected.0.network,
            adapter = selected.1.namespace(),
            "Selected payment option"
        );
        Ok(selected)
    }

    /// Checks everything that can be checked without touching the chain and
    /// returns the amount to pay.
    pub fn validate(
        &self,
        option: &PaymentRequirements,
        adapter: &dyn ChainAdapter,
    ) -> Result<U256, X402Error> {
        let chain_id = option.chain_id().ok_or_else(|| {
            X402Error::TransactionBuildFailed(format!("Unrecognized network {}", option.network))
        })?;

        if chain_id.namespace == SOLANA_NAMESPACE && option.fee_payer().is_none() {
            return Err(X402Error::MissingFeePayer {
                network: option.network.clone(),
            });
        }

        let hint = adapter.token_decimals_hint(&chain_id, &option.asset);
        match (option.extra.decimals, hint) {
            (Some(advertised), Some(known)) if advertised != known => warn!(
                network = %option.network,
                asset = %option.asset,
                advertised,
                known,
                "Advertised decimals differ from the known token"
            ),
            (None, None) => {
                return Err(X402Error::MissingDecimals {
                    network: option.network.clone(),
                    asset: option.asset.clone(),
                });
            }
            _ => {}
        }

        let amount = option
            .amount
            .as_deref()
            .and_then(|amount| U256::from_str_radix(amount, 10).ok())
            .ok_or_else(|| X402Error::MissingAmount {
                network: option.network.clone(),
            })?;

        if let Some(cap) = self.spend_cap
            && amount > cap
        {
            return Err(X402Error::SpendCapExceeded { amount, cap });
        }
        Ok(amount)
    }

    /// Selects, validates, checks the balance and signs; returns the
    /// `PAYMENT-SIGNATURE` value.
    #[instrument(name = "x402.reqwest.make_payment_header", skip_all, err)]
    pub async fn make_payment_header(
        &self,
        required: &PaymentRequired,
        request_url: &Url,
    ) -> Result<String, X402Error> {
        let (option, adapter) = self.select(required)?;
        let amount = self.validate(option, adapter.as_ref())?;

        if let Some(chain_id) = option.chain_id() {
            let balance = adapter.get_balance(&chain_id, &option.asset).await;
            if balance < amount {
                return Err(X402Error::InsufficientBalance {
                    network: option.network.clone(),
                    balance,
                    required: amount,
                });
            }
        }

        let payload = adapter.build_transaction(option).await?;
        let mut resource = required.resource.clone();
        if Url::parse(&resource.url).is_err() {
            resource.url = request_url.to_string();
        }
        let payment = PaymentPayload {
            x402_version: required.x402_version,
            resource: Some(resource),
            accepted: option.clone(),
            payload,
        };
        payment
            .to_header()
            .map_err(|e| X402Error::TransactionBuildFailed(e.to_string()))
    }

    /// Pays for `template` against `required` and sends it once more.
    async fn pay_and_retry(
        &self,
        template: &Request,
        required: &PaymentRequired,
        quote_headers: &HeaderMap,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let header = self.make_payment_header(required, template.url()).await?;
        let mut retry = template.try_clone().ok_or(X402Error::RequestNotCloneable)?;
        set_header(&mut retry, headers::PAYMENT_SIGNATURE, &header)?;
        if let Some(quote_hash) = quote_headers.get(headers::QUOTE_HASH) {
            if let Ok(name) = HeaderName::from_bytes(headers::QUOTE_HASH.as_bytes()) {
                retry.headers_mut().insert(name, quote_hash.clone());
            }
        }

        trace!(url = %retry.url(), "Retrying request with payment");
        let response = next.run(retry, extensions).await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            let reason = rejection_reason(response).await;
            return Err(X402Error::PaymentRejected { reason }.into());
        }
        Ok(response)
    }

    /// Buys a pass for the host of `template`, caches it and returns the
    /// purchase response.
    #[instrument(name = "x402.reqwest.purchase_access_pass", skip_all, err)]
    async fn purchase_access_pass(
        &self,
        purchase: &PassPurchase,
        template: &Request,
        required: &PaymentRequired,
        quote_headers: &HeaderMap,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let key = AccessPassCache::key(template.url())
            .ok_or_else(|| X402Error::InvalidRequestUrl(template.url().to_string()))?;
        let mut purchase_request = template.try_clone().ok_or(X402Error::RequestNotCloneable)?;
        let tier_query = match purchase {
            PassPurchase::ServerDefault => None,
            PassPurchase::Tier(tier) => Some(("tier", tier.clone())),
            PassPurchase::Duration(seconds) => Some(("duration", seconds.to_string())),
        };

        let response = match tier_query {
            None => {
                self.pay_and_retry(&purchase_request, required, quote_headers, extensions, next)
                    .await?
            }
            Some((name, value)) => {
                set_query_param(purchase_request.url_mut(), name, &value);
                let quote_request = purchase_request
                    .try_clone()
                    .ok_or(X402Error::RequestNotCloneable)?;
                let quote = next.clone().run(quote_request, extensions).await?;
                if quote.status() != StatusCode::PAYMENT_REQUIRED {
                    return Err(X402Error::MissingPaymentRequired(format!(
                        "pass quote answered with {}",
                        quote.status()
                    ))
                    .into());
                }
                let tier_required = decode_payment_required(quote.headers())?;
                self.pay_and_retry(
                    &purchase_request,
                    &tier_required,
                    quote.headers(),
                    extensions,
                    next,
                )
                .await?
            }
        };

        let token = response
            .headers()
            .get(headers::ACCESS_PASS)
            .and_then(|value| value.to_str().ok())
            .ok_or(X402Error::MissingAccessPass)?;
        if !self.pass_cache.insert_token(key.clone(), token) {
            warn!(host = %key, "Purchased access pass has unreadable claims, not caching it");
        } else {
            info!(host = %key, "Access pass purchased");
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for X402Client {
    /// Handles a request, paying for it when the server asks to.
    #[instrument(name = "x402.reqwest.handle", skip_all, fields(url = %req.url()), err)]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let pass_key = self
            .access_passes
            .as_ref()
            .and_then(|_| AccessPassCache::key(req.url()));

        if let Some(key) = pass_key.as_deref()
            && let Some(token) = self.pass_cache.get(key, UnixTimestamp::now())
        {
            let Some(mut with_pass) = req.try_clone() else {
                let mut req = req;
                set_header(&mut req, AUTHORIZATION.as_str(), &format!("Bearer {token}"))?;
                return next.run(req, extensions).await;
            };
            set_header(&mut with_pass, AUTHORIZATION.as_str(), &format!("Bearer {token}"))?;
            let response = next.clone().run(with_pass, extensions).await?;
            if !matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED
            ) {
                trace!(host = key, "Request served with cached access pass");
                return Ok(response);
            }
            debug!(host = key, status = %response.status(), "Cached access pass refused");
            self.pass_cache.invalidate(key);
        }

        let template = req.try_clone();
        let response = next.clone().run(req, extensions).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            trace!(status = ?response.status(), "No payment required, returning response");
            return Ok(response);
        }

        info!(url = %response.url(), "Received 402 Payment Required, processing payment");
        let quote_headers = response.headers().clone();
        let required = decode_payment_required(&quote_headers)?;
        let template = template.ok_or(X402Error::RequestNotCloneable)?;

        if let Some(purchase) = &self.access_passes
            && quote_headers.contains_key(headers::ACCESS_PASS_TIERS)
        {
            match self
                .purchase_access_pass(
                    purchase,
                    &template,
                    &required,
                    &quote_headers,
                    extensions,
                    next.clone(),
                )
                .await
            {
                Ok(response) => return Ok(response),
                Err(rqm::Error::Middleware(e))
                    if matches!(e.downcast_ref::<X402Error>(), Some(X402Error::MissingAccessPass)) =>
                {
                    warn!("Pass purchase settled without a pass, not paying again");
                    return Err(rqm::Error::Middleware(e));
                }
                Err(e) => debug!(error = %e, "Access pass purchase failed, paying per request"),
            }
        }

        self.pay_and_retry(&template, &required, &quote_headers, extensions, next)
            .await
    }
}

fn decode_payment_required(headers: &HeaderMap) -> Result<PaymentRequired, X402Error> {
    let header = headers
        .get(headers::PAYMENT_REQUIRED)
        .ok_or_else(|| X402Error::MissingPaymentRequired("header absent".to_string()))?;
    PaymentRequired::from_header(header.as_bytes())
        .map_err(|e| X402Error::MissingPaymentRequired(e.to_string()))
}

/// Reason of a refused payment: the `error` of a fresh `PAYMENT-REQUIRED`,
/// else the `error` field of a JSON body.
async fn rejection_reason(response: Response) -> Option<String> {
    let from_header = decode_payment_required(response.headers())
        .ok()
        .and_then(|required| required.error);
    if from_header.is_some() {
        return from_header;
    }
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("error")
        .and_then(|error| error.as_str())
        .map(str::to_string)
}

fn set_header(req: &mut Request, name: &str, value: &str) -> Result<(), X402Error> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| X402Error::TransactionBuildFailed(e.to_string()))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| X402Error::TransactionBuildFailed(e.to_string()))?;
    req.headers_mut().insert(name, value);
    Ok(())
}

/// Sets `name=value` in the query of `url`, dropping any tier selector already there.
fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "tier" && key != "duration")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(name, value);
}

fn same_network(offered: &str, preferred: &str) -> bool {
    if offered == preferred {
        return true;
    }
    match (ChainId::resolve(offered), ChainId::resolve(preferred)) {
        (Some(offered), Some(preferred)) => offered == preferred,
        _ => false,
    }
}
