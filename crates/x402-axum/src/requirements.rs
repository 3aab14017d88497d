//! Server-side payment requirements.
//!
//! A [`PaymentRequirementBuilder`] knows what a seller accepts (one token on
//! one network, paid to a [`PayTo`]) and turns that into a fresh
//! [`PaymentRequired`] for every 402. Facts the seller does not hold itself
//! come from the facilitator's `/supported` answer: the Solana fee payer and,
//! when advertised, token decimals. The same builder later checks a signed
//! payment against the requirements it would have issued and runs it through
//! verify and settle.
//!
//! ```rust,no_run
//! use x402_axum::facilitator_client::FacilitatorClient;
//! use x402_axum::requirements::PaymentRequirementBuilder;
//! use x402_types::chain::ChainId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let facilitator = FacilitatorClient::try_from("https://facilitator.x402.rs")?;
//! let builder = PaymentRequirementBuilder::new(
//!     facilitator,
//!     ChainId::new("eip155", "84532"),
//!     "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//! )
//! .with_description("Premium data");
//! let required = builder.build("https://api.example.com/data", "10000").await?;
//! # Ok(())
//! # }
//! ```

use sha2::{Digest, Sha256};
use tracing::instrument;
use x402_chain_eip155::chain::{EIP155_NAMESPACE, TokenDeploymentEip712};
use x402_chain_solana::chain::SOLANA_NAMESPACE;
use x402_types::chain::ChainId;
use x402_types::facilitator::Facilitator;
use x402_types::proto::{
    PaymentPayload, PaymentRequired, PaymentRequirements, PaymentRequirementsExtra, ResourceInfo,
    SettleResponse, VerifyRequest, VerifyResponse,
};

use crate::facilitator_client::{REASON_HTTP_ERROR, REASON_INVALID_RESPONSE, REASON_UNREACHABLE};
use crate::pay_to::{PayTo, PayToContext, PayToError};
use crate::tokens::known_token;

pub const EXACT_SCHEME: &str = "exact";
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum RequirementsError {
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
    #[error("Payment settlement failed: {0}")]
    SettlementFailed(String),
    #[error("Facilitator unavailable: {0}")]
    FacilitatorUnavailable(String),
    #[error("Facilitator does not support exact payments on {0}")]
    NetworkNotSupported(String),
    #[error("Invalid or malformed payment header: {0}")]
    InvalidPaymentHeader(String),
    #[error("Payment does not match the offered requirements")]
    NoMatchingRequirements,
    #[error("Echoed quote hash does not match the current quote")]
    QuoteMismatch,
    #[error(transparent)]
    PayTo(#[from] PayToError),
}

impl RequirementsError {
    pub fn code(&self) -> &'static str {
        match self {
            RequirementsError::VerificationFailed(_) => "verification_failed",
            RequirementsError::SettlementFailed(_) => "settlement_failed",
            RequirementsError::FacilitatorUnavailable(_) => "facilitator_unavailable",
            RequirementsError::NetworkNotSupported(_) => "network_not_supported",
            RequirementsError::InvalidPaymentHeader(_) => "invalid_payment_header",
            RequirementsError::NoMatchingRequirements => "no_matching_requirements",
            RequirementsError::QuoteMismatch => "quote_mismatch",
            RequirementsError::PayTo(_) => "pay_to_unresolved",
        }
    }

    /// Reason to put into the 402 answering this error.
    pub fn reason(&self) -> String {
        match self {
            RequirementsError::VerificationFailed(reason)
            | RequirementsError::SettlementFailed(reason) => reason.clone(),
            other => other.code().to_string(),
        }
    }

    fn is_facilitator_reason(reason: &str) -> bool {
        matches!(
            reason,
            REASON_UNREACHABLE | REASON_HTTP_ERROR | REASON_INVALID_RESPONSE
        )
    }

    fn rejected_by_verify(reason: String) -> Self {
        if Self::is_facilitator_reason(&reason) {
            RequirementsError::FacilitatorUnavailable(reason)
        } else {
            RequirementsError::VerificationFailed(reason)
        }
    }

    fn rejected_by_settle(reason: String) -> Self {
        if Self::is_facilitator_reason(&reason) {
            RequirementsError::FacilitatorUnavailable(reason)
        } else {
            RequirementsError::SettlementFailed(reason)
        }
    }
}

/// A payment that went through verify and settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledPayment {
    pub payer: String,
    pub transaction: String,
    pub network: String,
}

impl SettledPayment {
    pub fn to_settle_response(&self) -> SettleResponse {
        SettleResponse::Success {
            payer: self.payer.clone(),
            transaction: self.transaction.clone(),
            network: self.network.clone(),
        }
    }

    /// Value of the `PAYMENT-RESPONSE` header.
    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        self.to_settle_response().to_header()
    }
}

/// A payment the facilitator accepted but has not settled yet.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    request: VerifyRequest,
    pub payer: String,
}

#[derive(Debug, Clone)]
pub struct PaymentRequirementBuilder<F> {
    facilitator: F,
    pay_to: PayTo,
    network: ChainId,
    asset: String,
    max_timeout_seconds: u64,
    description: Option<String>,
    mime_type: Option<String>,
    decimals: Option<u8>,
    eip712: Option<TokenDeploymentEip712>,
}

impl<F> PaymentRequirementBuilder<F> {
    pub fn new(
        facilitator: F,
        network: ChainId,
        asset: impl Into<String>,
        pay_to: impl Into<PayTo>,
    ) -> Self {
        Self {
            facilitator,
            pay_to: pay_to.into(),
            network,
            asset: asset.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            description: None,
            mime_type: None,
            decimals: None,
            eip712: None,
        }
    }

    /// Like [`new`](Self::new), but a missing `network` is taken from the
    /// [`PayTo`] resolver's [`defaults`](PayTo::defaults).
    pub fn with_resolver_defaults(
        facilitator: F,
        network: Option<ChainId>,
        asset: impl Into<String>,
        pay_to: impl Into<PayTo>,
    ) -> Result<Self, RequirementsError> {
        let pay_to = pay_to.into();
        let network = match network {
            Some(network) => network,
            None => {
                let fallback = pay_to.defaults().network.ok_or_else(|| {
                    RequirementsError::NetworkNotSupported("no network configured".into())
                })?;
                ChainId::resolve(&fallback)
                    .ok_or(RequirementsError::NetworkNotSupported(fallback))?
            }
        };
        Ok(Self::new(facilitator, network, asset, pay_to))
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Overrides decimals advertised by the facilitator or known for the asset.
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// EIP-712 domain of an EVM token outside the known USDC deployments.
    pub fn with_eip712(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.eip712 = Some(TokenDeploymentEip712 {
            name: name.into(),
            version: version.into(),
        });
        self
    }

    pub fn facilitator(&self) -> &F {
        &self.facilitator
    }

    pub fn network(&self) -> &ChainId {
        &self.network
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn pay_to(&self) -> &PayTo {
        &self.pay_to
    }

    /// Decimals known without asking the facilitator: configured, else the
    /// known-stablecoin table.
    pub fn token_decimals(&self) -> Option<u8> {
        self.decimals
            .or_else(|| known_token(&self.network, &self.asset).map(|t| t.decimals))
    }

    fn resource_info(&self, resource_url: &str) -> ResourceInfo {
        ResourceInfo {
            url: resource_url.to_string(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl<F> PaymentRequirementBuilder<F>
where
    F: Facilitator + Sync,
{
    /// Builds the 402 body for `resource_url` priced at `amount_atomic`.
    #[instrument(
        name = "x402.requirements.build",
        skip_all,
        fields(network = %self.network, resource = resource_url, amount = amount_atomic),
        err
    )]
    pub async fn build(
        &self,
        resource_url: &str,
        amount_atomic: &str,
    ) -> Result<PaymentRequired, RequirementsError> {
        let context = PayToContext::Issue {
            amount_atomic: amount_atomic.to_string(),
            resource_url: resource_url.to_string(),
        };
        let pay_to = self.pay_to.resolve(&context).await?;
        let option = self.payment_option(pay_to, amount_atomic).await?;
        Ok(PaymentRequired::new(
            self.resource_info(resource_url),
            vec![option],
        ))
    }

    /// Checks the signed payment in `payment_header` against the requirements
    /// this builder issues for `amount_atomic`, then verifies and settles it.
    ///
    /// The payee is re-derived from the header, so a dynamic [`PayTo`] sees
    /// the address the buyer signed instead of minting a new one.
    #[instrument(
        name = "x402.requirements.verify_and_settle",
        skip_all,
        fields(network = %self.network, amount = amount_atomic),
        err
    )]
    pub async fn verify_and_settle(
        &self,
        payment_header: &str,
        amount_atomic: &str,
    ) -> Result<SettledPayment, RequirementsError> {
        let verified = self.verify(payment_header, amount_atomic).await?;
        self.settle(verified).await
    }

    /// First half of [`verify_and_settle`](Self::verify_and_settle): match
    /// and verify, without moving funds.
    pub async fn verify(
        &self,
        payment_header: &str,
        amount_atomic: &str,
    ) -> Result<VerifiedPayment, RequirementsError> {
        self.verify_quoted(payment_header, None, amount_atomic).await
    }

    /// Like [`verify`](Self::verify), but first compares an echoed
    /// `X-Quote-Hash` with the hash of the quote this builder would issue
    /// for the signed payee. A mismatch fails with
    /// [`RequirementsError::QuoteMismatch`] before the facilitator is called.
    ///
    /// The hash only catches a stale or hand-edited quote. Anyone can
    /// recompute it, so it deters casual replay and nothing more.
    pub async fn verify_quoted(
        &self,
        payment_header: &str,
        quote_hash: Option<&str>,
        amount_atomic: &str,
    ) -> Result<VerifiedPayment, RequirementsError> {
        let payload = PaymentPayload::from_header(payment_header.as_bytes())
            .map_err(|e| RequirementsError::InvalidPaymentHeader(e.to_string()))?;
        let context = PayToContext::Settle {
            payment_header: payment_header.to_string(),
        };
        let pay_to = self.pay_to.resolve(&context).await?;
        let expected = self.payment_option(pay_to, amount_atomic).await?;
        if let Some(echoed) = quote_hash {
            let current = accepts_hash(std::slice::from_ref(&expected));
            if !echoed.trim().eq_ignore_ascii_case(&current) {
                tracing::debug!(%echoed, %current, "Echoed quote hash is stale");
                return Err(RequirementsError::QuoteMismatch);
            }
        }
        if !self.accepted_matches(&payload.accepted, &expected) {
            tracing::debug!(
                accepted = ?payload.accepted,
                expected = ?expected,
                "Signed payment does not match offered requirements"
            );
            return Err(RequirementsError::NoMatchingRequirements);
        }

        let request = VerifyRequest::new(payload, expected);
        let verified = self
            .facilitator
            .verify(&request)
            .await
            .map_err(|e| RequirementsError::FacilitatorUnavailable(e.to_string()))?;
        match verified {
            VerifyResponse::Valid { payer } => Ok(VerifiedPayment { request, payer }),
            VerifyResponse::Invalid { reason, .. } => {
                Err(RequirementsError::rejected_by_verify(reason))
            }
        }
    }

    /// Settles a payment returned by [`verify`](Self::verify).
    pub async fn settle(&self, verified: VerifiedPayment) -> Result<SettledPayment, RequirementsError> {
        let settled = self
            .facilitator
            .settle(&verified.request)
            .await
            .map_err(|e| RequirementsError::FacilitatorUnavailable(e.to_string()))?;
        match settled {
            SettleResponse::Success {
                payer,
                transaction,
                network,
            } => {
                tracing::info!(%payer, %transaction, %network, "Payment settled");
                Ok(SettledPayment {
                    payer,
                    transaction,
                    network,
                })
            }
            SettleResponse::Error { reason, .. } => {
                Err(RequirementsError::rejected_by_settle(reason))
            }
        }
    }

    async fn payment_option(
        &self,
        pay_to: String,
        amount_atomic: &str,
    ) -> Result<PaymentRequirements, RequirementsError> {
        let supported = self
            .facilitator
            .supported()
            .await
            .map_err(|e| RequirementsError::FacilitatorUnavailable(e.to_string()))?;
        if supported.kind(EXACT_SCHEME, &self.network).is_none() {
            return Err(RequirementsError::NetworkNotSupported(
                self.network.to_string(),
            ));
        }

        let known = known_token(&self.network, &self.asset);
        let mut extra = PaymentRequirementsExtra {
            decimals: self
                .decimals
                .or_else(|| supported.decimals(EXACT_SCHEME, &self.network))
                .or(known.as_ref().map(|t| t.decimals)),
            ..Default::default()
        };
        match self.network.namespace.as_str() {
            SOLANA_NAMESPACE => {
                let fee_payer = supported
                    .fee_payer(EXACT_SCHEME, &self.network)
                    .ok_or_else(|| {
                        RequirementsError::NetworkNotSupported(format!(
                            "{} (no fee payer advertised)",
                            self.network
                        ))
                    })?;
                extra.fee_payer = Some(fee_payer);
            }
            EIP155_NAMESPACE => {
                if let Some(eip712) = self.eip712.clone().or(known.and_then(|t| t.eip712)) {
                    extra.name = Some(eip712.name);
                    extra.version = Some(eip712.version);
                }
            }
            _ => {}
        }

        Ok(PaymentRequirements {
            scheme: EXACT_SCHEME.to_string(),
            network: self.network.to_string(),
            amount: Some(amount_atomic.to_string()),
            asset: self.asset.clone(),
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            extra,
        })
    }

    fn accepted_matches(&self, accepted: &PaymentRequirements, expected: &PaymentRequirements) -> bool {
        let same_address = |a: &str, b: &str| {
            if self.network.namespace == EIP155_NAMESPACE {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        accepted.scheme == expected.scheme
            && accepted.chain_id().as_ref() == Some(&self.network)
            && accepted.amount == expected.amount
            && same_address(&accepted.asset, &expected.asset)
            && same_address(&accepted.pay_to, &expected.pay_to)
    }

    pub fn quote_hash(&self, required: &PaymentRequired) -> String {
        quote_hash(required)
    }
}

/// Lowercase hex SHA-256 of the JSON of `required.accepts`, sent as
/// `X-Quote-Hash`. It lets a server notice a quote edited in transit; it is
/// not a signature.
pub fn quote_hash(required: &PaymentRequired) -> String {
    accepts_hash(&required.accepts)
}

fn accepts_hash(accepts: &[PaymentRequirements]) -> String {
    let canonical = serde_json::to_vec(accepts).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pay_to::{PayToResolver, ResolverDefaults};
    use crate::test_support::*;
    use async_trait::async_trait;

    fn evm_builder(facilitator: FakeFacilitator) -> PaymentRequirementBuilder<FakeFacilitator> {
        PaymentRequirementBuilder::new(
            facilitator,
            ChainId::new("eip155", "84532"),
            BASE_SEPOLIA_USDC,
            EVM_PAY_TO,
        )
        .with_description("Premium data")
    }

    #[tokio::test]
    async fn test_build_evm_requirements() {
        let builder = evm_builder(FakeFacilitator::new());
        let required = builder
            .build("https://api.example.com/data", "10000")
            .await
            .unwrap();

        assert_eq!(required.x402_version, 2);
        assert_eq!(required.resource.url, "https://api.example.com/data");
        assert_eq!(required.resource.description.as_deref(), Some("Premium data"));
        let option = &required.accepts[0];
        assert_eq!(option.network, BASE_SEPOLIA);
        assert_eq!(option.amount.as_deref(), Some("10000"));
        assert_eq!(option.pay_to, EVM_PAY_TO);
        assert_eq!(option.max_timeout_seconds, DEFAULT_MAX_TIMEOUT_SECONDS);
        assert_eq!(option.extra.decimals, Some(6));
        assert_eq!(option.extra.name.as_deref(), Some("USDC"));
        assert_eq!(option.extra.version.as_deref(), Some("2"));
        assert!(option.extra.fee_payer.is_none());
    }

    #[tokio::test]
    async fn test_build_solana_requirements_carry_fee_payer() {
        let builder = PaymentRequirementBuilder::new(
            FakeFacilitator::new(),
            ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"),
            SOLANA_DEVNET_USDC,
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
        );
        let required = builder.build("/data", "500").await.unwrap();
        let option = &required.accepts[0];
        assert_eq!(option.extra.fee_payer.as_deref(), Some(FEE_PAYER));
        assert_eq!(option.extra.decimals, Some(6));
        assert!(option.extra.name.is_none());
    }

    #[tokio::test]
    async fn test_fee_payer_falls_back_to_signers() {
        let mut facilitator = FakeFacilitator::new();
        facilitator.supported.kinds[1].extra = None;
        facilitator
            .supported
            .signers
            .insert(SOLANA_DEVNET.into(), vec!["SignerFeePayer".into()]);
        let builder = PaymentRequirementBuilder::new(
            facilitator,
            ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"),
            SOLANA_DEVNET_USDC,
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
        );
        let required = builder.build("/data", "500").await.unwrap();
        assert_eq!(
            required.accepts[0].extra.fee_payer.as_deref(),
            Some("SignerFeePayer")
        );
    }

    #[tokio::test]
    async fn test_unsupported_network_is_fatal() {
        let builder = PaymentRequirementBuilder::new(
            FakeFacilitator::new(),
            ChainId::new("eip155", "8453"),
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            EVM_PAY_TO,
        );
        let err = builder.build("/data", "1").await.unwrap_err();
        assert_eq!(err.code(), "network_not_supported");

        let mut facilitator = FakeFacilitator::new();
        facilitator.unavailable = true;
        let err = evm_builder(facilitator).build("/data", "1").await.unwrap_err();
        assert_eq!(err.code(), "facilitator_unavailable");
    }

    #[tokio::test]
    async fn test_verify_and_settle() {
        let facilitator = FakeFacilitator::new();
        let builder = evm_builder(facilitator.clone());
        let required = builder.build("/data", "10000").await.unwrap();
        let header = pay_first_option(&required);

        let settled = builder.verify_and_settle(&header, "10000").await.unwrap();
        assert_eq!(settled.transaction, "0xfeedface");
        assert_eq!(settled.payer, EVM_PAYER);
        assert_eq!(facilitator.verify_count(), 1);
        assert_eq!(facilitator.settle_count(), 1);

        let request = facilitator.verify_requests.lock().unwrap()[0].clone();
        assert_eq!(request.x402_version, 2);
        assert_eq!(request.payment_requirements, required.accepts[0]);

        let header = settled.to_header().unwrap();
        assert!(SettleResponse::from_header(header.as_bytes()).unwrap().is_success());
    }

    #[tokio::test]
    async fn test_verify_and_settle_rejects_other_amount() {
        let facilitator = FakeFacilitator::new();
        let builder = evm_builder(facilitator.clone());
        let required = builder.build("/data", "1").await.unwrap();
        let header = pay_first_option(&required);

        let err = builder.verify_and_settle(&header, "10000").await.unwrap_err();
        assert!(matches!(err, RequirementsError::NoMatchingRequirements));
        assert_eq!(facilitator.verify_count(), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_skips_settle() {
        let facilitator = FakeFacilitator::rejecting("insufficient_funds");
        let builder = evm_builder(facilitator.clone());
        let required = builder.build("/data", "10000").await.unwrap();
        let header = pay_first_option(&required);

        let err = builder.verify_and_settle(&header, "10000").await.unwrap_err();
        assert_eq!(err.code(), "verification_failed");
        assert_eq!(err.reason(), "insufficient_funds");
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_facilitator_reasons_map_to_unavailable() {
        let facilitator = FakeFacilitator::rejecting(REASON_UNREACHABLE);
        let builder = evm_builder(facilitator);
        let required = builder.build("/data", "10000").await.unwrap();
        let err = builder
            .verify_and_settle(&pay_first_option(&required), "10000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "facilitator_unavailable");
    }

    #[tokio::test]
    async fn test_settlement_failure() {
        let mut facilitator = FakeFacilitator::new();
        facilitator.settle = SettleResponse::Error {
            reason: "transaction_reverted".into(),
            network: BASE_SEPOLIA.into(),
        };
        let builder = evm_builder(facilitator);
        let required = builder.build("/data", "10000").await.unwrap();
        let err = builder
            .verify_and_settle(&pay_first_option(&required), "10000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "settlement_failed");
        assert_eq!(err.reason(), "transaction_reverted");
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let builder = evm_builder(FakeFacilitator::new());
        let err = builder.verify_and_settle("%%%", "1").await.unwrap_err();
        assert_eq!(err.code(), "invalid_payment_header");
    }

    struct PerQuoteAddress;

    #[async_trait]
    impl PayToResolver for PerQuoteAddress {
        async fn resolve(&self, context: &PayToContext) -> Result<String, PayToError> {
            match context {
                PayToContext::Issue { .. } => Ok(EVM_PAY_TO.to_lowercase()),
                PayToContext::Settle { .. } => context
                    .signed_pay_to()
                    .filter(|signed| signed.eq_ignore_ascii_case(EVM_PAY_TO))
                    .ok_or_else(|| PayToError("unknown payTo".into())),
            }
        }

        fn defaults(&self) -> ResolverDefaults {
            ResolverDefaults::default()
        }
    }

    struct SolanaDeposits;

    #[async_trait]
    impl PayToResolver for SolanaDeposits {
        async fn resolve(&self, _context: &PayToContext) -> Result<String, PayToError> {
            Ok("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into())
        }

        fn defaults(&self) -> ResolverDefaults {
            ResolverDefaults {
                network: Some("solana-devnet".into()),
                facilitator_url: None,
            }
        }
    }

    #[tokio::test]
    async fn test_resolver_defaults_choose_network() {
        let builder = PaymentRequirementBuilder::with_resolver_defaults(
            FakeFacilitator::new(),
            None,
            SOLANA_DEVNET_USDC,
            PayTo::dynamic(SolanaDeposits),
        )
        .unwrap();
        assert_eq!(builder.network().to_string(), SOLANA_DEVNET);
        let required = builder.build("/data", "500").await.unwrap();
        assert_eq!(required.accepts[0].network, SOLANA_DEVNET);
        assert_eq!(required.accepts[0].extra.fee_payer.as_deref(), Some(FEE_PAYER));

        let explicit = PaymentRequirementBuilder::with_resolver_defaults(
            FakeFacilitator::new(),
            Some(ChainId::new("eip155", "84532")),
            BASE_SEPOLIA_USDC,
            PayTo::dynamic(SolanaDeposits),
        )
        .unwrap();
        assert_eq!(explicit.network().to_string(), BASE_SEPOLIA);

        let err = PaymentRequirementBuilder::with_resolver_defaults(
            FakeFacilitator::new(),
            None,
            BASE_SEPOLIA_USDC,
            EVM_PAY_TO,
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), "network_not_supported");
    }

    #[tokio::test]
    async fn test_dynamic_pay_to_is_rederived_from_header() {
        let builder = PaymentRequirementBuilder::new(
            FakeFacilitator::new(),
            ChainId::new("eip155", "84532"),
            BASE_SEPOLIA_USDC,
            PayTo::dynamic(PerQuoteAddress),
        );
        let required = builder.build("/data", "10000").await.unwrap();
        assert_eq!(required.accepts[0].pay_to, EVM_PAY_TO.to_lowercase());
        builder
            .verify_and_settle(&pay_first_option(&required), "10000")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_quote_hash_rejected_before_verify() {
        let facilitator = FakeFacilitator::new();
        let builder = evm_builder(facilitator.clone());
        let required = builder.build("/data", "10000").await.unwrap();
        let header = pay_first_option(&required);

        let err = builder
            .verify_quoted(&header, Some("deadbeef"), "10000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "quote_mismatch");
        assert_eq!(err.reason(), "quote_mismatch");
        assert_eq!(facilitator.verify_count(), 0);

        let hash = quote_hash(&required).to_uppercase();
        builder
            .verify_quoted(&header, Some(&hash), "10000")
            .await
            .unwrap();
        assert_eq!(facilitator.verify_count(), 1);
    }

    #[tokio::test]
    async fn test_quote_hash_is_stable_sha256_hex() {
        let builder = evm_builder(FakeFacilitator::new());
        let first = builder.build("/data", "10000").await.unwrap();
        let second = builder.build("/data", "10000").await.unwrap();
        let other = builder.build("/data", "20000").await.unwrap();

        let hash = quote_hash(&first);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, builder.quote_hash(&second));
        assert_ne!(hash, quote_hash(&other));
    }
}
