use alloy_primitives::address;
use x402_types::chain::ChainId;
use x402_types::networks::USDC;

use crate::chain::{
    EIP155_NAMESPACE, Eip155ChainReference, Eip155TokenDeployment, TokenDeploymentEip712,
};

/// Per-network instances for the well-known EVM chains.
///
/// Implemented for [`ChainId`] and for the [`USDC`] deployment table.
///
/// ```
/// use x402_types::chain::ChainId;
/// use x402_types::networks::USDC;
/// use x402_chain_eip155::KnownNetworkEip155;
/// use x402_chain_eip155::chain::Eip155TokenDeployment;
///
/// assert_eq!(ChainId::base_sepolia().to_string(), "eip155:84532");
/// let usdc: Eip155TokenDeployment = USDC::base_sepolia();
/// assert_eq!(usdc.decimals, 6);
/// ```
pub trait KnownNetworkEip155<A> {
    /// Base mainnet (eip155:8453)
    fn base() -> A;
    /// Base Sepolia testnet (eip155:84532)
    fn base_sepolia() -> A;
    /// Polygon mainnet (eip155:137)
    fn polygon() -> A;
    /// Polygon Amoy testnet (eip155:80002)
    fn polygon_amoy() -> A;
    /// Avalanche C-Chain mainnet (eip155:43114)
    fn avalanche() -> A;
    /// Avalanche Fuji testnet (eip155:43113)
    fn avalanche_fuji() -> A;
    /// Sei mainnet (eip155:1329)
    fn sei() -> A;
    /// Sei testnet (eip155:1328)
    fn sei_testnet() -> A;
    /// Celo mainnet (eip155:42220)
    fn celo() -> A;
    /// Celo Sepolia testnet (eip155:11142220)
    fn celo_sepolia() -> A;
}

impl KnownNetworkEip155<ChainId> for ChainId {
    fn base() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "8453")
    }

    fn base_sepolia() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "84532")
    }

    fn polygon() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "137")
    }

    fn polygon_amoy() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "80002")
    }

    fn avalanche() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "43114")
    }

    fn avalanche_fuji() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "43113")
    }

    fn sei() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "1329")
    }

    fn sei_testnet() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "1328")
    }

    fn celo() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "42220")
    }

    fn celo_sepolia() -> ChainId {
        ChainId::new(EIP155_NAMESPACE, "11142220")
    }
}

impl KnownNetworkEip155<Eip155TokenDeployment> for USDC {
    fn base() -> Eip155TokenDeployment {
        usdc(8453, address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), "USD Coin")
    }

    fn base_sepolia() -> Eip155TokenDeployment {
        usdc(84532, address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"), "USDC")
    }

    fn polygon() -> Eip155TokenDeployment {
        usdc(137, address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"), "USDC")
    }

    fn polygon_amoy() -> Eip155TokenDeployment {
        usdc(80002, address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"), "USDC")
    }

    fn avalanche() -> Eip155TokenDeployment {
        usdc(43114, address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"), "USD Coin")
    }

    fn avalanche_fuji() -> Eip155TokenDeployment {
        usdc(43113, address!("0x5425890298aed601595a70AB815c96711a31Bc65"), "USD Coin")
    }

    fn sei() -> Eip155TokenDeployment {
        usdc(1329, address!("0xe15fC38F6D8c56aF07bbCBe3BAf5708A2Bf42392"), "USDC")
    }

    fn sei_testnet() -> Eip155TokenDeployment {
        usdc(1328, address!("0x4fCF1784B31630811181f670Aea7A7bEF803eaED"), "USDC")
    }

    fn celo() -> Eip155TokenDeployment {
        usdc(42220, address!("0xcebA9300f2b948710d2653dD7B07f33A8B32118C"), "USDC")
    }

    fn celo_sepolia() -> Eip155TokenDeployment {
        usdc(11142220, address!("0x01C5C0122039549AD1493B8220cABEdD739BC44E"), "USDC")
    }
}

fn usdc(chain_id: u64, address: alloy_primitives::Address, name: &str) -> Eip155TokenDeployment {
    Eip155TokenDeployment {
        chain_reference: Eip155ChainReference::new(chain_id),
        address,
        decimals: 6,
        eip712: Some(TokenDeploymentEip712 {
            name: name.into(),
            version: "2".into(),
        }),
    }
}

/// Known USDC deployments, used for decimals hints.
pub fn known_usdc_deployments() -> Vec<Eip155TokenDeployment> {
    vec![
        USDC::base(),
        USDC::base_sepolia(),
        USDC::polygon(),
        USDC::polygon_amoy(),
        USDC::avalanche(),
        USDC::avalanche_fuji(),
        USDC::sei(),
        USDC::sei_testnet(),
        USDC::celo(),
        USDC::celo_sepolia(),
    ]
}
