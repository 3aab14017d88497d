//! Well-known networks: legacy aliases, CAIP-2 ids and public RPC endpoints.
//!
//! Payment options carry CAIP-2 ids, but older servers and most configuration
//! files still say `"base"` or `"solana-devnet"`. [`KNOWN_NETWORKS`] maps those
//! aliases to chain ids and gives adapters a default public RPC endpoint.
//!
//! ```
//! use x402_types::chain::ChainId;
//! use x402_types::networks::chain_id_by_network_name;
//!
//! let polygon = chain_id_by_network_name("polygon").unwrap();
//! assert_eq!(polygon.to_string(), "eip155:137");
//!
//! let chain_id = ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
//! assert_eq!(chain_id.as_network_name(), Some("solana"));
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Legacy alias, e.g. `"base-sepolia"`.
    pub name: &'static str,
    pub namespace: &'static str,
    pub reference: &'static str,
    /// Public RPC endpoint, good enough for balance pre-flight checks.
    pub rpc_url: &'static str,
}

impl NetworkInfo {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
        rpc_url: "https://mainnet.base.org",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
        rpc_url: "https://sepolia.base.org",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
        rpc_url: "https://polygon-rpc.com",
    },
    NetworkInfo {
        name: "polygon-amoy",
        namespace: "eip155",
        reference: "80002",
        rpc_url: "https://rpc-amoy.polygon.technology",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
        rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    },
    NetworkInfo {
        name: "avalanche-fuji",
        namespace: "eip155",
        reference: "43113",
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
    },
    NetworkInfo {
        name: "sei",
        namespace: "eip155",
        reference: "1329",
        rpc_url: "https://evm-rpc.sei-apis.com",
    },
    NetworkInfo {
        name: "sei-testnet",
        namespace: "eip155",
        reference: "1328",
        rpc_url: "https://evm-rpc-testnet.sei-apis.com",
    },
    NetworkInfo {
        name: "celo",
        namespace: "eip155",
        reference: "42220",
        rpc_url: "https://forno.celo.org",
    },
    NetworkInfo {
        name: "celo-sepolia",
        namespace: "eip155",
        reference: "11142220",
        rpc_url: "https://forno.celo-sepolia.celo-testnet.org",
    },
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        rpc_url: "https://api.mainnet-beta.solana.com",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        rpc_url: "https://api.devnet.solana.com",
    },
];

static NAME_TO_NETWORK: LazyLock<HashMap<&'static str, &'static NetworkInfo>> =
    LazyLock::new(|| KNOWN_NETWORKS.iter().map(|n| (n.name, n)).collect());

static CHAIN_ID_TO_NETWORK: LazyLock<HashMap<ChainId, &'static NetworkInfo>> =
    LazyLock::new(|| KNOWN_NETWORKS.iter().map(|n| (n.chain_id(), n)).collect());

static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, ChainId>> =
    LazyLock::new(|| KNOWN_NETWORKS.iter().map(|n| (n.name, n.chain_id())).collect());

/// Case-sensitive alias lookup.
pub fn chain_id_by_network_name(name: &str) -> Option<&'static ChainId> {
    NAME_TO_CHAIN_ID.get(name)
}

pub fn network_name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    CHAIN_ID_TO_NETWORK.get(chain_id).map(|n| n.name)
}

pub fn network_by_name(name: &str) -> Option<&'static NetworkInfo> {
    NAME_TO_NETWORK.get(name).copied()
}

pub fn network_by_chain_id(chain_id: &ChainId) -> Option<&'static NetworkInfo> {
    CHAIN_ID_TO_NETWORK.get(chain_id).copied()
}

/// Marker for per-network USDC deployments, implemented by the chain crates.
#[allow(clippy::upper_case_acronyms)]
pub struct USDC;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookups_are_symmetric() {
        for network in KNOWN_NETWORKS {
            let chain_id = chain_id_by_network_name(network.name).unwrap();
            assert_eq!(network_name_by_chain_id(chain_id), Some(network.name));
        }
    }

    #[test]
    fn test_known_chain_ids() {
        assert_eq!(
            chain_id_by_network_name("base-sepolia").unwrap().to_string(),
            "eip155:84532"
        );
        assert_eq!(
            chain_id_by_network_name("solana").unwrap().to_string(),
            "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"
        );
        assert!(chain_id_by_network_name("unknown").is_none());
    }

    #[test]
    fn test_rpc_url_by_chain_id() {
        let devnet = ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
        assert_eq!(
            network_by_chain_id(&devnet).unwrap().rpc_url,
            "https://api.devnet.solana.com"
        );
        assert!(network_by_chain_id(&ChainId::new("eip155", "999999")).is_none());
    }
}
