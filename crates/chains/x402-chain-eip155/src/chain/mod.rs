//! EVM chain types and contract bindings.
//!
//! - [`Eip155ChainReference`] - a numeric chain id such as `8453` for Base
//! - [`Eip155TokenDeployment`] - token address, decimals and EIP-712 domain
//! - [`ChecksummedAddress`] - an address serialized with its EIP-55 checksum
//! - [`erc20`] - `balanceOf` over an alloy provider

pub mod erc20;
pub mod types;

pub use erc20::Erc20BalanceReader;
pub use types::*;
