use solana_pubkey::pubkey;
use x402_types::chain::ChainId;
use x402_types::networks::USDC;

use crate::chain::{SolanaChainReference, SolanaTokenDeployment};

/// Per-network instances for the well-known Solana clusters.
///
/// ```
/// use x402_types::chain::ChainId;
/// use x402_chain_solana::KnownNetworkSolana;
///
/// let devnet = ChainId::solana_devnet();
/// assert_eq!(devnet.to_string(), "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
/// ```
pub trait KnownNetworkSolana<A> {
    /// solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp
    fn solana() -> A;
    /// solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1
    fn solana_devnet() -> A;
}

impl KnownNetworkSolana<ChainId> for ChainId {
    fn solana() -> ChainId {
        SolanaChainReference::solana().into()
    }

    fn solana_devnet() -> ChainId {
        SolanaChainReference::solana_devnet().into()
    }
}

impl KnownNetworkSolana<SolanaTokenDeployment> for USDC {
    fn solana() -> SolanaTokenDeployment {
        let address = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        SolanaTokenDeployment::new(SolanaChainReference::solana(), address.into(), 6)
    }

    fn solana_devnet() -> SolanaTokenDeployment {
        let address = pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");
        SolanaTokenDeployment::new(SolanaChainReference::solana_devnet(), address.into(), 6)
    }
}

/// Known USDC mints, used for decimals hints.
pub fn known_usdc_deployments() -> [SolanaTokenDeployment; 2] {
    [USDC::solana(), USDC::solana_devnet()]
}
