#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana chain support for x402 payments.
//!
//! [`SolanaAdapter`] implements [`x402_types::adapter::ChainAdapter`] for the
//! `solana` CAIP-2 namespace. It pays an `exact` payment option with an SPL
//! `transferChecked` instruction, signed by the buyer only; the facilitator
//! named in `extra.feePayer` co-signs and submits it during settlement.
//!
//! - [`adapter`] - the adapter, mint lookup and partial signing
//! - [`chain`] - chain references, addresses and the [`chain::RpcClientLike`] seam
//!
//! ```no_run
//! use solana_keypair::Keypair;
//! use x402_chain_solana::SolanaAdapter;
//! use x402_types::adapter::ChainAdapter;
//!
//! let adapter = SolanaAdapter::new(Keypair::new());
//! assert!(adapter.can_handle("solana-devnet"));
//! ```

pub mod adapter;
pub mod chain;

mod networks;
pub use networks::*;

pub use adapter::SolanaAdapter;
