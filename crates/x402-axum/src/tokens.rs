//! Well-known stablecoin metadata for payment options.

use std::str::FromStr;
use x402_chain_eip155::chain::{Eip155ChainReference, TokenDeploymentEip712};
use x402_chain_solana::chain::SolanaChainReference;
use x402_types::chain::ChainId;

/// What the seller can state about a token without asking anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownToken {
    pub decimals: u8,
    /// EIP-712 domain, EVM only.
    pub eip712: Option<TokenDeploymentEip712>,
}

/// Looks `asset` up among the known USDC deployments on `chain_id`.
pub fn known_token(chain_id: &ChainId, asset: &str) -> Option<KnownToken> {
    if let Ok(reference) = Eip155ChainReference::try_from(chain_id) {
        let asset = alloy_primitives::Address::from_str(asset).ok()?;
        return x402_chain_eip155::known_usdc_deployments()
            .into_iter()
            .find(|d| d.chain_reference == reference && d.address == asset)
            .map(|d| KnownToken {
                decimals: d.decimals,
                eip712: d.eip712,
            });
    }
    if let Ok(reference) = SolanaChainReference::try_from(chain_id) {
        let asset = x402_chain_solana::chain::Address::from_str(asset).ok()?;
        return x402_chain_solana::known_usdc_deployments()
            .into_iter()
            .find(|d| d.chain_reference == reference && d.address == asset)
            .map(|d| KnownToken {
                decimals: d.decimals,
                eip712: None,
            });
    }
    None
}
