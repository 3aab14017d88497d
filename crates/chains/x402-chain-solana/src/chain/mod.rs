//! Solana chain types and RPC access.
//!
//! - [`SolanaChainReference`] - a 32-character genesis hash prefix identifying a network
//! - [`SolanaTokenDeployment`] - mint address and decimals of a token on one network
//! - [`Address`] - a base58 public key
//! - [`RpcClientLike`] - the RPC calls the adapter makes

pub mod rpc;
pub mod types;

pub use rpc::RpcClientLike;
pub use types::*;
