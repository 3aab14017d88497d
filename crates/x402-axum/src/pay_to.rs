//! Who receives a payment.
//!
//! Most sellers pay into one fixed address ([`PayTo::Static`]). Some derive a
//! fresh deposit address per quote ([`PayTo::Dynamic`]); those must be able
//! to find the same address again when the signed payment comes back, or the
//! quote and the settlement would drift apart. [`PayToContext`] tells the
//! resolver which of the two situations it is in.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use url::Url;
use x402_types::proto::PaymentPayload;

/// What the resolver knows when it is asked for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayToContext {
    /// A new quote is being issued.
    Issue {
        amount_atomic: String,
        resource_url: String,
    },
    /// A signed payment is being verified and settled.
    Settle {
        /// Raw `PAYMENT-SIGNATURE` header value.
        payment_header: String,
    },
}

impl PayToContext {
    /// The `payTo` the buyer actually signed, when settling.
    ///
    /// This value is chosen by the buyer. A resolver must check it against
    /// the deposit addresses it actually issued before returning it, or a
    /// buyer can sign a payment to themselves and have it accepted.
    pub fn signed_pay_to(&self) -> Option<String> {
        match self {
            PayToContext::Issue { .. } => None,
            PayToContext::Settle { payment_header } => {
                PaymentPayload::from_header(payment_header.as_bytes())
                    .ok()
                    .map(|payload| payload.accepted.pay_to)
            }
        }
    }
}

/// Settings a resolver brings along, used when the server configuration leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverDefaults {
    pub network: Option<String>,
    pub facilitator_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to resolve pay-to address: {0}")]
pub struct PayToError(pub String);

/// Source of per-quote payee addresses.
///
/// On [`PayToContext::Settle`] the resolver answers with the address the
/// payment must go to. Returning [`PayToContext::signed_pay_to`] unchecked
/// lets the buyer pick the payee.
#[async_trait]
pub trait PayToResolver: Send + Sync {
    async fn resolve(&self, context: &PayToContext) -> Result<String, PayToError>;

    fn defaults(&self) -> ResolverDefaults {
        ResolverDefaults::default()
    }
}

#[derive(Clone)]
pub enum PayTo {
    Static(String),
    Dynamic(Arc<dyn PayToResolver>),
}

impl PayTo {
    pub fn dynamic<R: PayToResolver + 'static>(resolver: R) -> Self {
        PayTo::Dynamic(Arc::new(resolver))
    }

    pub async fn resolve(&self, context: &PayToContext) -> Result<String, PayToError> {
        match self {
            PayTo::Static(address) => Ok(address.clone()),
            PayTo::Dynamic(resolver) => resolver.resolve(context).await,
        }
    }

    pub fn defaults(&self) -> ResolverDefaults {
        match self {
            PayTo::Static(_) => ResolverDefaults::default(),
            PayTo::Dynamic(resolver) => resolver.defaults(),
        }
    }
}

impl fmt::Debug for PayTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayTo::Static(address) => f.debug_tuple("Static").field(address).finish(),
            PayTo::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for PayTo {
    fn from(address: &str) -> Self {
        PayTo::Static(address.to_string())
    }
}

impl From<String> for PayTo {
    fn from(address: String) -> Self {
        PayTo::Static(address)
    }
}
