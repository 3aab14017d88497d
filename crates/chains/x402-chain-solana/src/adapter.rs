//! [`SolanaAdapter`]: pays x402 options on Solana with a partially signed
//! SPL `transferChecked`.
//!
//! The transaction has three instructions, in order: a compute unit limit of
//! [`COMPUTE_UNIT_LIMIT`], a compute unit price of [`COMPUTE_UNIT_PRICE`]
//! micro-lamports, and the transfer from the payer's associated token account
//! to the payee's. The facilitator named in `extra.feePayer` is the fee payer
//! and adds its signature when it settles; the adapter only signs at the
//! payer's key index.

use alloy_primitives::U256;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_keypair::Keypair;
use solana_message::v0::Message as MessageV0;
use solana_message::VersionedMessage;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Instruction;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;
use x402_types::adapter::{AdapterError, ChainAdapter};
use x402_types::chain::{ChainId, ChainIdPattern};
use x402_types::networks::{KNOWN_NETWORKS, network_by_chain_id};
use x402_types::proto::PaymentRequirements;
use x402_types::util::Base64Bytes;

use crate::chain::{Address, RpcClientLike, SOLANA_NAMESPACE, SolanaChainReference};
use crate::networks::known_usdc_deployments;

pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

pub const COMPUTE_UNIT_LIMIT: u32 = 12_000;

/// Micro-lamports per compute unit.
pub const COMPUTE_UNIT_PRICE: u64 = 1;

/// Mint information for SPL tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mint {
    Token { decimals: u8 },
    Token2022 { decimals: u8 },
}

impl Mint {
    pub fn token_program(&self) -> Pubkey {
        match self {
            Mint::Token { .. } => spl_token::id(),
            Mint::Token2022 { .. } => spl_token_2022::id(),
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Mint::Token { decimals } | Mint::Token2022 { decimals } => *decimals,
        }
    }
}

/// Reads the mint account; its owner decides between SPL Token and Token-2022.
pub async fn fetch_mint<R: RpcClientLike>(mint: &Pubkey, rpc_client: &R) -> Result<Mint, String> {
    let account = rpc_client
        .get_account(mint)
        .await
        .map_err(|e| format!("failed to fetch mint {mint}: {e}"))?;
    if account.owner == spl_token::id() {
        let state = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| format!("failed to unpack mint {mint}: {e}"))?;
        Ok(Mint::Token {
            decimals: state.decimals,
        })
    } else if account.owner == spl_token_2022::id() {
        let base = account
            .data
            .get(..spl_token_2022::state::Mint::LEN)
            .ok_or_else(|| format!("failed to unpack mint {mint}: account too short"))?;
        let state = spl_token_2022::state::Mint::unpack_from_slice(base)
            .map_err(|e| format!("failed to unpack mint {mint}: {e}"))?;
        Ok(Mint::Token2022 {
            decimals: state.decimals,
        })
    } else {
        Err(format!(
            "failed to unpack mint {mint}: unknown owner {}",
            account.owner
        ))
    }
}

/// Associated token account of `owner` for `mint` under `token_program`.
pub fn associated_token_address(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Places `signer`'s signature at its position among the required signers,
/// leaving every other slot as the default signature.
pub fn sign_partial<S: Signer + ?Sized>(
    mut tx: VersionedTransaction,
    signer: &S,
) -> Result<VersionedTransaction, AdapterError> {
    let msg_bytes = tx.message.serialize();
    let signature = signer
        .try_sign_message(msg_bytes.as_slice())
        .map_err(|e| AdapterError::Signing(e.to_string()))?;

    let num_required = tx.message.header().num_required_signatures as usize;
    let pos = tx
        .message
        .static_account_keys()
        .iter()
        .take(num_required)
        .position(|k| *k == signer.pubkey())
        .ok_or_else(|| AdapterError::Signing("signer not found in required signers".into()))?;

    if tx.signatures.len() < num_required {
        tx.signatures.resize(num_required, Signature::default());
    }
    tx.signatures[pos] = signature;
    Ok(tx)
}

/// Solana [`ChainAdapter`].
///
/// Holds an optional wallet and one RPC client per served network.
/// [`SolanaAdapter::new`] wires public endpoints for mainnet and devnet;
/// use [`SolanaAdapter::with_rpc_client`] to point at your own.
pub struct SolanaAdapter<S = Keypair, R = Arc<RpcClient>> {
    signer: Option<S>,
    rpc_clients: HashMap<ChainId, R>,
    networks: ChainIdPattern,
}

impl SolanaAdapter<Keypair, Arc<RpcClient>> {
    /// Adapter paying from `keypair` over the public RPC endpoints.
    pub fn new(keypair: Keypair) -> Self {
        Self::with_public_rpc(Some(keypair))
    }

    /// Adapter with no wallet: it can read balances but never signs.
    pub fn read_only() -> Self {
        Self::with_public_rpc(None)
    }

    fn with_public_rpc(signer: Option<Keypair>) -> Self {
        let rpc_clients = KNOWN_NETWORKS
            .iter()
            .filter(|network| network.namespace == SOLANA_NAMESPACE)
            .map(|network| {
                let rpc = RpcClient::new_with_commitment(
                    network.rpc_url.to_string(),
                    CommitmentConfig::confirmed(),
                );
                (network.chain_id(), Arc::new(rpc))
            })
            .collect();
        Self {
            signer,
            rpc_clients,
            networks: ChainIdPattern::wildcard(SOLANA_NAMESPACE),
        }
    }

    pub fn with_rpc_url(self, chain_id: ChainId, rpc_url: &Url) -> Self {
        let rpc =
            RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());
        self.with_rpc_client(chain_id, Arc::new(rpc))
    }
}

impl<S, R> SolanaAdapter<S, R> {
    /// Adapter without any RPC client; add them with [`Self::with_rpc_client`].
    pub fn from_signer(signer: Option<S>) -> Self {
        Self {
            signer,
            rpc_clients: HashMap::new(),
            networks: ChainIdPattern::wildcard(SOLANA_NAMESPACE),
        }
    }

    pub fn with_rpc_client(mut self, chain_id: ChainId, rpc_client: R) -> Self {
        self.rpc_clients.insert(chain_id, rpc_client);
        self
    }

    /// Narrows the networks this adapter claims, e.g. to devnet only.
    pub fn with_networks(mut self, networks: ChainIdPattern) -> Self {
        self.networks = networks;
        self
    }

    pub fn signer(&self) -> Option<&S> {
        self.signer.as_ref()
    }
}

impl<S: Signer, R: RpcClientLike> SolanaAdapter<S, R> {
    fn rpc_for(&self, chain_id: &ChainId) -> Result<&R, AdapterError> {
        if !self.networks.matches(chain_id) {
            return Err(AdapterError::UnsupportedNetwork(chain_id.to_string()));
        }
        self.rpc_clients
            .get(chain_id)
            .ok_or_else(|| AdapterError::UnsupportedNetwork(chain_id.to_string()))
    }

    async fn build_transfer(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<VersionedTransaction, AdapterError> {
        let chain_id = requirements
            .chain_id()
            .ok_or_else(|| AdapterError::UnsupportedNetwork(requirements.network.clone()))?;
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AdapterError::WalletUnavailable(chain_id.to_string()))?;
        let fee_payer = requirements
            .fee_payer()
            .ok_or_else(|| AdapterError::MissingFeePayer(chain_id.to_string()))?;
        let fee_payer = parse_pubkey("extra.feePayer", fee_payer)?;
        let pay_to = parse_pubkey("payTo", &requirements.pay_to)?;
        let mint_address = parse_pubkey("asset", &requirements.asset)?;
        let amount = requirements
            .amount
            .as_deref()
            .ok_or_else(|| AdapterError::InvalidRequirements("missing amount".into()))?
            .parse::<u64>()
            .map_err(|e| AdapterError::InvalidRequirements(format!("invalid amount: {e}")))?;
        let rpc_client = self.rpc_for(&chain_id)?;

        let mint = fetch_mint(&mint_address, rpc_client)
            .await
            .map_err(AdapterError::TransactionBuild)?;
        if let Some(advertised) = requirements.extra.decimals
            && advertised != mint.decimals()
        {
            tracing::warn!(
                mint = %mint_address,
                advertised,
                on_chain = mint.decimals(),
                "Payment option decimals differ from the mint, using on-chain value"
            );
        }

        let token_program = mint.token_program();
        let payer = signer.pubkey();
        let source_ata = associated_token_address(&payer, &token_program, &mint_address);
        let destination_ata = associated_token_address(&pay_to, &token_program, &mint_address);
        self.require_account(rpc_client, &source_ata, "payer").await?;
        self.require_account(rpc_client, &destination_ata, "payee")
            .await?;

        let transfer = match mint {
            Mint::Token { decimals } => spl_token::instruction::transfer_checked(
                &token_program,
                &source_ata,
                &mint_address,
                &destination_ata,
                &payer,
                &[],
                amount,
                decimals,
            ),
            Mint::Token2022 { decimals } => spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source_ata,
                &mint_address,
                &destination_ata,
                &payer,
                &[],
                amount,
                decimals,
            ),
        }
        .map_err(|e| AdapterError::TransactionBuild(e.to_string()))?;

        let instructions: [Instruction; 3] = [
            ComputeBudgetInstruction::set_compute_unit_limit(COMPUTE_UNIT_LIMIT),
            ComputeBudgetInstruction::set_compute_unit_price(COMPUTE_UNIT_PRICE),
            transfer,
        ];
        let recent_blockhash = rpc_client
            .get_latest_blockhash()
            .await
            .map_err(|e| AdapterError::TransactionBuild(format!("latest blockhash: {e}")))?;
        let message = MessageV0::try_compile(&fee_payer, &instructions, &[], recent_blockhash)
            .map_err(|e| AdapterError::TransactionBuild(format!("{e:?}")))?;
        let tx = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::V0(message),
        };
        sign_partial(tx, signer)
    }

    async fn require_account(
        &self,
        rpc_client: &R,
        ata: &Pubkey,
        owner: &str,
    ) -> Result<(), AdapterError> {
        match rpc_client.get_account_if_exists(ata).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AdapterError::TransactionBuild(format!(
                "{owner} token account {ata} does not exist"
            ))),
            Err(e) => Err(AdapterError::TransactionBuild(format!(
                "failed to fetch {owner} token account {ata}: {e}"
            ))),
        }
    }

    async fn token_balance(&self, chain_id: &ChainId, asset: &str) -> Result<U256, String> {
        let signer = self.signer.as_ref().ok_or("no wallet")?;
        let rpc_client = self.rpc_for(chain_id).map_err(|e| e.to_string())?;
        let mint_address = Pubkey::from_str(asset).map_err(|e| e.to_string())?;
        let mint = fetch_mint(&mint_address, rpc_client).await?;
        let ata = associated_token_address(&signer.pubkey(), &mint.token_program(), &mint_address);
        let amount = rpc_client
            .get_token_account_balance(&ata)
            .await
            .map_err(|e| e.to_string())?;
        U256::from_str(&amount).map_err(|e| e.to_string())
    }
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, AdapterError> {
    Pubkey::from_str(value)
        .map_err(|_| AdapterError::InvalidRequirements(format!("{field} is not a Solana address")))
}

#[async_trait]
impl<S, R> ChainAdapter for SolanaAdapter<S, R>
where
    S: Signer + Send + Sync,
    R: RpcClientLike + Send + Sync,
{
    fn namespace(&self) -> &str {
        SOLANA_NAMESPACE
    }

    fn can_handle(&self, network: &str) -> bool {
        self.networks.matches_network(network)
    }

    fn address(&self) -> Option<String> {
        self.signer.as_ref().map(|s| s.pubkey().to_string())
    }

    fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    fn default_rpc_url(&self, chain_id: &ChainId) -> Option<Url> {
        if chain_id.namespace != SOLANA_NAMESPACE {
            return None;
        }
        network_by_chain_id(chain_id).and_then(|network| Url::parse(network.rpc_url).ok())
    }

    fn token_decimals_hint(&self, chain_id: &ChainId, asset: &str) -> Option<u8> {
        let reference = SolanaChainReference::try_from(chain_id).ok()?;
        let asset = Address::from_str(asset).ok()?;
        known_usdc_deployments()
            .into_iter()
            .find(|d| d.chain_reference == reference && d.address == asset)
            .map(|d| d.decimals)
    }

    async fn get_balance(&self, chain_id: &ChainId, asset: &str) -> U256 {
        match self.token_balance(chain_id, asset).await {
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
        let tx = self.build_transfer(requirements).await?;
        let bytes =
            bincode::serialize(&tx).map_err(|e| AdapterError::TransactionBuild(e.to_string()))?;
        let transaction = Base64Bytes::encode(bytes).to_string();
        Ok(serde_json::json!({ "transaction": transaction }))
    }
}
