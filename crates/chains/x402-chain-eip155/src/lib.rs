//! EIP-155 (EVM) chain support for x402 payments.
//!
//! [`Eip155Adapter`] implements [`x402_types::adapter::ChainAdapter`] for the
//! `eip155` CAIP-2 namespace. It pays an `exact` payment option by signing an
//! ERC-3009 `transferWithAuthorization` over the token's EIP-712 domain; the
//! facilitator submits it and pays the gas.
//!
//! - [`adapter`] - the adapter
//! - [`exact`] - authorization payloads, EIP-712 signing and the [`exact::SignerLike`] seam
//! - [`chain`] - chain references, token deployments and `balanceOf`
//!
//! ```no_run
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_chain_eip155::Eip155Adapter;
//! use x402_types::adapter::ChainAdapter;
//!
//! let adapter = Eip155Adapter::new(PrivateKeySigner::random());
//! assert!(adapter.can_handle("base-sepolia"));
//! ```

pub mod adapter;
pub mod chain;
pub mod exact;

mod networks;
pub use networks::*;

pub use adapter::Eip155Adapter;
