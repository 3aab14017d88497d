//! The buyer-side chain capability interface.
//!
//! A [`ChainAdapter`] turns one [`PaymentRequirements`] into the chain-native
//! `payload` of a [`PaymentPayload`](crate::proto::PaymentPayload): a partially
//! signed Solana transaction, or an EIP-712 signed ERC-3009 authorization on EVM.
//! Chain crates provide the implementations; the payment client holds a list of
//! them and asks each whether it [`can_handle`](ChainAdapter::can_handle) an
//! advertised network, first match wins.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::chain::ChainId;
use crate::proto::PaymentRequirements;

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// CAIP-2 namespace served by this adapter, e.g. `"solana"`.
    fn namespace(&self) -> &str;

    /// True for a CAIP-2 id, legacy alias or bare namespace this adapter serves.
    fn can_handle(&self, network: &str) -> bool;

    /// Payer address, if a wallet is attached.
    fn address(&self) -> Option<String>;

    /// Whether a wallet is attached and able to sign.
    fn is_connected(&self) -> bool;

    /// Public RPC endpoint used when no explicit one is configured.
    fn default_rpc_url(&self, chain_id: &ChainId) -> Option<Url>;

    /// Decimals of a well-known stablecoin deployment. Pure lookup, no I/O.
    fn token_decimals_hint(&self, chain_id: &ChainId, asset: &str) -> Option<u8> {
        let _ = (chain_id, asset);
        None
    }

    /// Payer's balance of `asset`. Advisory only: any failure reads as zero.
    async fn get_balance(&self, chain_id: &ChainId, asset: &str) -> U256;

    /// Builds and signs the chain-specific payment payload.
    async fn build_transaction(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, AdapterError>;
}

#[async_trait]
impl<T: ChainAdapter + ?Sized> ChainAdapter for Arc<T> {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn can_handle(&self, network: &str) -> bool {
        (**self).can_handle(network)
    }

    fn address(&self) -> Option<String> {
        (**self).address()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn default_rpc_url(&self, chain_id: &ChainId) -> Option<Url> {
        (**self).default_rpc_url(chain_id)
    }

    fn token_decimals_hint(&self, chain_id: &ChainId, asset: &str) -> Option<u8> {
        (**self).token_decimals_hint(chain_id, asset)
    }

    async fn get_balance(&self, chain_id: &ChainId, asset: &str) -> U256 {
        (**self).get_balance(chain_id, asset).await
    }

    async fn build_transaction(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, AdapterError> {
        (**self).build_transaction(requirements).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("No wallet is connected for {0}")]
    WalletUnavailable(String),
    #[error("Unsupported network {0}")]
    UnsupportedNetwork(String),
    #[error("Payment option on {0} has no fee payer")]
    MissingFeePayer(String),
    #[error("Invalid payment option: {0}")]
    InvalidRequirements(String),
    #[error("Failed to build transaction: {0}")]
    TransactionBuild(String),
    #[error("Wallet refused to sign: {0}")]
    Signing(String),
}

impl AdapterError {
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::WalletUnavailable(_) | AdapterError::Signing(_) => "wallet_unavailable",
            AdapterError::UnsupportedNetwork(_) => "unsupported_network",
            AdapterError::MissingFeePayer(_) => "missing_fee_payer",
            AdapterError::InvalidRequirements(_) | AdapterError::TransactionBuild(_) => {
                "transaction_build_failed"
            }
        }
    }
}
