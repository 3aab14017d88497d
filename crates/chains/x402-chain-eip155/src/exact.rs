//! ERC-3009 `transferWithAuthorization` payloads for the `exact` scheme.
//!
//! The buyer signs an EIP-712 `TransferWithAuthorization` message over the
//! token contract's domain. The facilitator later submits it on-chain and pays
//! the gas. The signed message is carried as [`ExactEvmPayload`]:
//!
//! ```json
//! {
//!   "signature": "0x…",
//!   "authorization": {
//!     "from": "0x…", "to": "0x…", "value": "10000",
//!     "validAfter": "1740672089", "validBefore": "1740672389",
//!     "nonce": "0x…"
//!   }
//! }
//! ```

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain, sol};
use async_trait::async_trait;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use x402_types::timestamp::UnixTimestamp;

use crate::chain::{ChecksummedAddress, decimal_u256};

/// How far in the past `validAfter` is placed, absorbing clock skew.
pub const VALID_AFTER_SKEW_SECONDS: u64 = 10 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmPayloadAuthorization,
}

/// Who may move how many tokens, and when.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: ChecksummedAddress,
    pub to: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

sol!(
    /// EIP-712 typed data of an ERC-3009 transfer authorization.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&ExactEvmPayloadAuthorization> for TransferWithAuthorization {
    fn from(authorization: &ExactEvmPayloadAuthorization) -> Self {
        TransferWithAuthorization {
            from: authorization.from.0,
            to: authorization.to.0,
            value: authorization.value,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
    }
}

/// Inputs of one ERC-3009 authorization.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// Numeric EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract, the EIP-712 verifying contract.
    pub asset_address: Address,
    pub pay_to: Address,
    pub amount: U256,
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name of the token.
    pub name: String,
    /// EIP-712 domain version of the token.
    pub version: String,
}

impl Eip3009SigningParams {
    /// EIP-712 signing hash of `authorization` under these parameters' domain.
    pub fn signing_hash(&self, authorization: &ExactEvmPayloadAuthorization) -> B256 {
        let domain = eip712_domain! {
            name: self.name.clone(),
            version: self.version.clone(),
            chain_id: self.chain_id,
            verifying_contract: self.asset_address,
        };
        TransferWithAuthorization::from(authorization).eip712_signing_hash(&domain)
    }
}

/// Signs an ERC-3009 `TransferWithAuthorization` valid from ten minutes ago
/// until `max_timeout_seconds` from now, with a random 32-byte nonce.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync + ?Sized>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, alloy_signer::Error> {
    let now = UnixTimestamp::now();
    let valid_after = now - VALID_AFTER_SKEW_SECONDS;
    let valid_before = now + params.max_timeout_seconds;
    let nonce: [u8; 32] = rng().random();

    let authorization = ExactEvmPayloadAuthorization {
        from: signer.address().into(),
        to: params.pay_to.into(),
        value: params.amount,
        valid_after,
        valid_before,
        nonce: FixedBytes(nonce),
    };

    // The facilitator rebuilds the typed data from `authorization`, so the
    // signed struct must be derived from it and nothing else.
    let hash = params.signing_hash(&authorization);
    let signature = signer.sign_hash(&hash).await?;

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Signing seam over alloy signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is not `Clone`; this lets an adapter hold either.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync + ?Sized> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}
