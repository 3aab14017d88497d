use alloy_primitives::U256;
use reqwest_middleware as rqm;
use serde_json::{Value, json};
use x402_types::adapter::AdapterError;

/// Why the client could not pay for a request.
///
/// Surfaced through [`reqwest_middleware::Error::Middleware`]; recover it with
/// `anyhow::Error::downcast_ref::<X402Error>()`.
#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    #[error("402 response without a usable PAYMENT-REQUIRED header: {0}")]
    MissingPaymentRequired(String),
    #[error("No registered, connected adapter for any advertised network ({})", networks.join(", "))]
    NoMatchingPaymentOption { networks: Vec<String> },
    #[error("Payment option on {network} has no fee payer")]
    MissingFeePayer { network: String },
    #[error("Decimals of {asset} on {network} are neither advertised nor known")]
    MissingDecimals { network: String, asset: String },
    #[error("Payment option on {network} has no valid amount")]
    MissingAmount { network: String },
    #[error("Payment of {amount} exceeds the spend cap of {cap}")]
    SpendCapExceeded { amount: U256, cap: U256 },
    #[error("Balance {balance} on {network} is below the required {required}")]
    InsufficientBalance {
        network: String,
        balance: U256,
        required: U256,
    },
    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),
    #[error("Failed to build the payment transaction: {0}")]
    TransactionBuildFailed(String),
    #[error("Server rejected the payment{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    PaymentRejected { reason: Option<String> },
    #[error("Request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
    #[error("Request URL {0} has no host")]
    InvalidRequestUrl(String),
    #[error("Settled pass purchase returned no ACCESS-PASS header")]
    MissingAccessPass,
}

impl X402Error {
    pub fn code(&self) -> &'static str {
        match self {
            X402Error::MissingPaymentRequired(_) => "missing_payment_required",
            X402Error::NoMatchingPaymentOption { .. } => "no_matching_payment_option",
            X402Error::MissingFeePayer { .. } => "missing_fee_payer",
            X402Error::MissingDecimals { .. } => "missing_decimals",
            X402Error::MissingAmount { .. } => "missing_amount",
            X402Error::SpendCapExceeded { .. } => "spend_cap_exceeded",
            X402Error::InsufficientBalance { .. } => "insufficient_balance",
            X402Error::WalletUnavailable(_) => "wallet_unavailable",
            X402Error::TransactionBuildFailed(_) => "transaction_build_failed",
            X402Error::PaymentRejected { .. } => "payment_rejected",
            X402Error::RequestNotCloneable => "request_not_cloneable",
            X402Error::InvalidRequestUrl(_) => "invalid_request_url",
            X402Error::MissingAccessPass => "missing_access_pass",
        }
    }

    /// Structured detail for callers that show or log the failure.
    pub fn details(&self) -> Option<Value> {
        match self {
            X402Error::NoMatchingPaymentOption { networks } => Some(json!({ "networks": networks })),
            X402Error::MissingFeePayer { network } | X402Error::MissingAmount { network } => {
                Some(json!({ "network": network }))
            }
            X402Error::MissingDecimals { network, asset } => {
                Some(json!({ "network": network, "asset": asset }))
            }
            X402Error::SpendCapExceeded { amount, cap } => Some(json!({
                "amount": amount.to_string(),
                "cap": cap.to_string(),
            })),
            X402Error::InsufficientBalance {
                network,
                balance,
                required,
            } => Some(json!({
                "network": network,
                "balance": balance.to_string(),
                "required": required.to_string(),
            })),
            X402Error::PaymentRejected { reason } => {
                reason.as_ref().map(|reason| json!({ "reason": reason }))
            }
            X402Error::InvalidRequestUrl(url) => Some(json!({ "url": url })),
            X402Error::MissingPaymentRequired(_)
            | X402Error::MissingAccessPass
            | X402Error::WalletUnavailable(_)
            | X402Error::TransactionBuildFailed(_)
            | X402Error::RequestNotCloneable => None,
        }
    }
}

impl From<AdapterError> for X402Error {
    fn from(error: AdapterError) -> Self {
        match error {
            AdapterError::WalletUnavailable(_) | AdapterError::Signing(_) => {
                X402Error::WalletUnavailable(error.to_string())
            }
            AdapterError::MissingFeePayer(network) => X402Error::MissingFeePayer { network },
            AdapterError::UnsupportedNetwork(_)
            | AdapterError::InvalidRequirements(_)
            | AdapterError::TransactionBuild(_) => X402Error::TransactionBuildFailed(error.to_string()),
        }
    }
}

impl From<X402Error> for rqm::Error {
    fn from(error: X402Error) -> Self {
        rqm::Error::Middleware(error.into())
    }
}
