//! [`Eip155Adapter`]: pays x402 options on EVM chains with an ERC-3009
//! authorization signed over the token's EIP-712 domain.
//!
//! No transaction is sent by the buyer: the facilitator submits
//! `transferWithAuthorization` during settlement. RPC providers are only used
//! for the `balanceOf` pre-flight check.

use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;
use x402_types::adapter::{AdapterError, ChainAdapter};
use x402_types::chain::{ChainId, ChainIdPattern};
use x402_types::networks::{KNOWN_NETWORKS, network_by_chain_id};
use x402_types::proto::PaymentRequirements;

use crate::chain::{EIP155_NAMESPACE, Eip155ChainReference, Erc20BalanceReader};
use crate::exact::{Eip3009SigningParams, SignerLike, sign_erc3009_authorization};
use crate::networks::known_usdc_deployments;

/// EVM [`ChainAdapter`].
///
/// Holds an optional signer and one provider per network for balance reads.
/// Signing works on any `eip155` chain; balances need a provider for the chain.
pub struct Eip155Adapter<S = PrivateKeySigner, P = DynProvider> {
    signer: Option<S>,
    providers: HashMap<ChainId, P>,
    networks: ChainIdPattern,
}

impl Eip155Adapter<PrivateKeySigner, DynProvider> {
    /// Adapter signing with `signer`, reading balances over public RPC endpoints.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self::with_public_rpc(Some(signer))
    }

    /// Adapter with no wallet.
    pub fn read_only() -> Self {
        Self::with_public_rpc(None)
    }

    fn with_public_rpc(signer: Option<PrivateKeySigner>) -> Self {
        let providers = KNOWN_NETWORKS
            .iter()
            .filter(|network| network.namespace == EIP155_NAMESPACE)
            .filter_map(|network| {
                let url = Url::parse(network.rpc_url).ok()?;
                Some((network.chain_id(), connect(url)))
            })
            .collect();
        Self {
            signer,
            providers,
            networks: ChainIdPattern::wildcard(EIP155_NAMESPACE),
        }
    }

    pub fn with_rpc_url(self, chain_id: ChainId, rpc_url: Url) -> Self {
        self.with_provider(chain_id, connect(rpc_url))
    }
}

fn connect(url: Url) -> DynProvider {
    ProviderBuilder::new().connect_http(url).erased()
}

impl<S, P> Eip155Adapter<S, P> {
    /// Adapter without providers; add them with [`Self::with_provider`].
    pub fn from_signer(signer: Option<S>) -> Self {
        Self {
            signer,
            providers: HashMap::new(),
            networks: ChainIdPattern::wildcard(EIP155_NAMESPACE),
        }
    }

    pub fn with_provider(mut self, chain_id: ChainId, provider: P) -> Self {
        self.providers.insert(chain_id, provider);
        self
    }

    /// Narrows the networks this adapter claims.
    pub fn with_networks(mut self, networks: ChainIdPattern) -> Self {
        self.networks = networks;
        self
    }
}

impl<S: SignerLike + Sync, P> Eip155Adapter<S, P> {
    fn signing_params(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<Eip3009SigningParams, AdapterError> {
        let chain_id = requirements
            .chain_id()
            .filter(|chain_id| self.networks.matches(chain_id))
            .ok_or_else(|| AdapterError::UnsupportedNetwork(requirements.network.clone()))?;
        let chain_reference = Eip155ChainReference::try_from(&chain_id)
            .map_err(|e| AdapterError::UnsupportedNetwork(e.to_string()))?;
        let (name, version) = match (&requirements.extra.name, &requirements.extra.version) {
            (Some(name), Some(version)) => (name.clone(), version.clone()),
            _ => {
                return Err(AdapterError::TransactionBuild(format!(
                    "payment option on {chain_id} lacks the EIP-712 name and version of {}",
                    requirements.asset
                )));
            }
        };
        let asset_address = parse_address("asset", &requirements.asset)?;
        let pay_to = parse_address("payTo", &requirements.pay_to)?;
        let amount = requirements
            .amount
            .as_deref()
            .ok_or_else(|| AdapterError::InvalidRequirements("missing amount".into()))?;
        let amount = U256::from_str_radix(amount, 10)
            .map_err(|e| AdapterError::InvalidRequirements(format!("invalid amount: {e}")))?;
        Ok(Eip3009SigningParams {
            chain_id: chain_reference.inner(),
            asset_address,
            pay_to,
            amount,
            max_timeout_seconds: requirements.max_timeout_seconds,
            name,
            version,
        })
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, AdapterError> {
    Address::from_str(value)
        .map_err(|_| AdapterError::InvalidRequirements(format!("{field} is not an EVM address")))
}

#[async_trait]
impl<S, P> ChainAdapter for Eip155Adapter<S, P>
where
    S: SignerLike + Send + Sync,
    P: Erc20BalanceReader + Send + Sync,
{
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn can_handle(&self, network: &str) -> bool {
        self.networks.matches_network(network)
    }

    fn address(&self) -> Option<String> {
        self.signer
            .as_ref()
            .map(|signer| signer.address().to_checksum(None))
    }

    fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    fn default_rpc_url(&self, chain_id: &ChainId) -> Option<Url> {
        if chain_id.namespace != EIP155_NAMESPACE {
            return None;
        }
        network_by_chain_id(chain_id).and_then(|network| Url::parse(network.rpc_url).ok())
    }

    fn token_decimals_hint(&self, chain_id: &ChainId, asset: &str) -> Option<u8> {
        let reference = Eip155ChainReference::try_from(chain_id).ok()?;
        let asset = Address::from_str(asset).ok()?;
        known_usdc_deployments()
            .into_iter()
            .find(|d| d.chain_reference == reference && d.address == asset)
            .map(|d| d.decimals)
    }

    async fn get_balance(&self, chain_id: &ChainId, asset: &str) -> U256 {
        let (Some(signer), Some(provider)) = (self.signer.as_ref(), self.providers.get(chain_id))
        else {
            tracing::debug!(%chain_id, "No wallet or provider, reporting zero balance");
            return U256::ZERO;
        };
        let Ok(token) = Address::from_str(asset) else {
            return U256::ZERO;
        };
        match provider.token_balance(token, signer.address()).await {
            Ok(balance) => balance,
            Err(error) => {
                tracing::debug!(%chain_id, asset, %error, "Balance lookup failed, reporting zero");
                U256::ZERO
            }
        }
    }

    #[tracing::instrument(skip_all, fields(network = %requirements.network))]
    async fn build_transaction(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, AdapterError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AdapterError::WalletUnavailable(requirements.network.clone()))?;
        let params = self.signing_params(requirements)?;
        let payload = sign_erc3009_authorization(signer, &params)
            .await
            .map_err(|e| AdapterError::TransactionBuild(format!("signing failed: {e}")))?;
        serde_json::to_value(payload).map_err(|e| AdapterError::TransactionBuild(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnownNetworkEip155;
    use crate::exact::ExactEvmPayload;
    use alloy_primitives::{Signature, address};
    use x402_types::networks::USDC;
    use x402_types::proto::PaymentRequirementsExtra;

    struct FakeBalances(Result<U256, String>);

    #[async_trait]
    impl Erc20BalanceReader for FakeBalances {
        async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256, String> {
            self.0.clone()
        }
    }

    fn requirements() -> PaymentRequirements {
        let usdc: crate::chain::Eip155TokenDeployment = USDC::base_sepolia();
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: Some("10000".into()),
            asset: usdc.address.to_checksum(None),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            max_timeout_seconds: 300,
            extra: PaymentRequirementsExtra {
                name: Some("USDC".into()),
                version: Some("2".into()),
                ..Default::default()
            },
        }
    }

    fn adapter(balance: Result<U256, String>) -> Eip155Adapter<PrivateKeySigner, FakeBalances> {
        Eip155Adapter::from_signer(Some(PrivateKeySigner::random()))
            .with_provider(ChainId::base_sepolia(), FakeBalances(balance))
    }

    #[tokio::test]
    async fn test_builds_recoverable_authorization() {
        let adapter = adapter(Ok(U256::ZERO));
        let requirements = requirements();
        let value = adapter.build_transaction(&requirements).await.unwrap();
        let payload: ExactEvmPayload = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(value["authorization"]["value"], "10000");
        assert_eq!(
            payload.authorization.to.0,
            address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C")
        );
        let params = adapter.signing_params(&requirements).unwrap();
        let signature = Signature::try_from(payload.signature.as_ref()).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&params.signing_hash(&payload.authorization))
            .unwrap();
        assert_eq!(Some(recovered.to_checksum(None)), adapter.address());
    }

    #[tokio::test]
    async fn test_accepts_legacy_network_alias() {
        let adapter = adapter(Ok(U256::ZERO));
        let mut requirements = requirements();
        requirements.network = "base-sepolia".into();
        assert!(adapter.can_handle("base-sepolia"));
        assert!(adapter.build_transaction(&requirements).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_eip712_domain_fails() {
        let adapter = adapter(Ok(U256::ZERO));
        let mut requirements = requirements();
        requirements.extra.name = None;
        let err = adapter.build_transaction(&requirements).await.unwrap_err();
        assert_eq!(err.code(), "transaction_build_failed");
    }

    #[tokio::test]
    async fn test_without_signer_reports_wallet_unavailable() {
        let adapter: Eip155Adapter<PrivateKeySigner, FakeBalances> =
            Eip155Adapter::from_signer(None);
        assert!(!adapter.is_connected());
        let err = adapter.build_transaction(&requirements()).await.unwrap_err();
        assert_eq!(err.code(), "wallet_unavailable");
    }

    #[tokio::test]
    async fn test_balance_is_zero_on_error() {
        let asset = requirements().asset;
        let ok = adapter(Ok(U256::from(5_000_000u64)));
        assert_eq!(
            ok.get_balance(&ChainId::base_sepolia(), &asset).await,
            U256::from(5_000_000u64)
        );
        let failing = adapter(Err("rpc down".into()));
        assert_eq!(
            failing.get_balance(&ChainId::base_sepolia(), &asset).await,
            U256::ZERO
        );
        assert_eq!(ok.get_balance(&ChainId::base(), &asset).await, U256::ZERO);
    }

    #[test]
    fn test_can_handle_and_hints() {
        let adapter = adapter(Ok(U256::ZERO));
        assert!(adapter.can_handle("eip155"));
        assert!(adapter.can_handle("eip155:137"));
        assert!(adapter.can_handle("base"));
        assert!(!adapter.can_handle("solana-devnet"));

        let asset = requirements().asset;
        assert_eq!(
            adapter.token_decimals_hint(&ChainId::base_sepolia(), &asset),
            Some(6)
        );
        assert_eq!(adapter.token_decimals_hint(&ChainId::base(), &asset), None);
        assert_eq!(
            adapter
                .default_rpc_url(&ChainId::base_sepolia())
                .unwrap()
                .as_str(),
            "https://sepolia.base.org/"
        );
    }
}
