//! Configuration for a server selling x402 access.
//!
//! Loaded from a JSON file after `.env` has been read, so any string value
//! can point at an environment variable (`"$VAR"` or `"${VAR}"`):
//!
//! ```json
//! {
//!   "facilitatorUrl": "$FACILITATOR_URL",
//!   "network": "base-sepolia",
//!   "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
//!   "payTo": "$PAY_TO_ADDRESS",
//!   "baseUrl": "https://api.example.com",
//!   "accessPass": {
//!     "secret": "${ACCESS_PASS_SECRET}",
//!     "issuer": "api.example.com",
//!     "ratePerHour": "$0.15",
//!     "tiers": [{ "id": "1h", "price": "$0.10" }, { "id": "24h", "price": "$2.00" }]
//!   }
//! }
//! ```
//!
//! With a dynamic [`PayTo`] resolver, `payTo` can be left out, and a missing
//! `network` or `facilitatorUrl` is taken from the resolver's defaults. See
//! [`ServerConfig::requirement_builder_with`].

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;
use x402_axum::access_pass::{AccessPassIssuer, AccessPassSigner, TierTable, TierTableError, TokenError};
use x402_axum::facilitator_client::{FacilitatorClient, FacilitatorClientError};
use x402_axum::pay_to::PayTo;
use x402_axum::requirements::{DEFAULT_MAX_TIMEOUT_SECONDS, PaymentRequirementBuilder};
use x402_types::chain::ChainId;
use x402_types::config::LiteralOrEnv;

/// Path used when `CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub facilitator_url: Option<LiteralOrEnv<Url>>,
    /// CAIP-2 id or alias such as `base-sepolia`.
    #[serde(default)]
    pub network: Option<LiteralOrEnv<String>>,
    pub asset: LiteralOrEnv<String>,
    #[serde(default)]
    pub pay_to: Option<LiteralOrEnv<String>>,
    /// Token decimals, when the asset is not a known USDC deployment.
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Public base of resource URLs in 402 answers.
    #[serde(default)]
    pub base_url: Option<LiteralOrEnv<Url>>,
    #[serde(default)]
    pub access_pass: Option<AccessPassConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPassConfig {
    pub secret: LiteralOrEnv<String>,
    pub issuer: String,
    #[serde(default)]
    pub rate_per_hour: Option<String>,
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub id: String,
    pub price: String,
}

fn default_max_timeout_seconds() -> u64 {
    DEFAULT_MAX_TIMEOUT_SECONDS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Unknown network {0:?}")]
    UnknownNetwork(String),
    #[error("No network configured and the pay-to resolver names none")]
    MissingNetwork,
    #[error("No facilitatorUrl configured and the pay-to resolver names none")]
    MissingFacilitator,
    #[error("No payTo configured")]
    MissingPayTo,
    #[error("Invalid facilitator: {0}")]
    Facilitator(#[from] FacilitatorClientError),
    #[error("No accessPass section configured")]
    MissingAccessPass,
    #[error("Decimals of {asset} on {network} are unknown; set \"decimals\"")]
    UnknownDecimals { network: String, asset: String },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Tiers(#[from] TierTableError),
}

impl ServerConfig {
    /// Reads `.env`, then the file named by `CONFIG` (default `config.json`).
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "Failed to read .env");
        }
        let path = std::env::var("CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Configured network, else the one `pay_to` defaults to.
    pub fn chain_id(&self, pay_to: &PayTo) -> Result<ChainId, ConfigError> {
        let network = match &self.network {
            Some(network) => network.inner().clone(),
            None => pay_to.defaults().network.ok_or(ConfigError::MissingNetwork)?,
        };
        ChainId::resolve(&network).ok_or(ConfigError::UnknownNetwork(network))
    }

    /// Configured facilitator, else the one `pay_to` defaults to.
    pub fn facilitator(&self, pay_to: &PayTo) -> Result<FacilitatorClient, ConfigError> {
        let url = match &self.facilitator_url {
            Some(url) => url.inner().clone(),
            None => pay_to
                .defaults()
                .facilitator_url
                .ok_or(ConfigError::MissingFacilitator)?,
        };
        Ok(FacilitatorClient::try_from(url.as_str())?)
    }

    /// Builder paying into the configured `payTo` address.
    pub fn requirement_builder(&self) -> Result<PaymentRequirementBuilder<FacilitatorClient>, ConfigError> {
        let pay_to = self.pay_to.as_ref().ok_or(ConfigError::MissingPayTo)?;
        self.requirement_builder_with(PayTo::from(pay_to.inner().as_str()))
    }

    /// Builder paying into `pay_to`, which also fills in a missing network
    /// or facilitator from its resolver defaults.
    pub fn requirement_builder_with(
        &self,
        pay_to: PayTo,
    ) -> Result<PaymentRequirementBuilder<FacilitatorClient>, ConfigError> {
        let mut builder = PaymentRequirementBuilder::new(
            self.facilitator(&pay_to)?,
            self.chain_id(&pay_to)?,
            self.asset.inner().clone(),
            pay_to,
        )
        .with_max_timeout_seconds(self.max_timeout_seconds);
        if let Some(decimals) = self.decimals {
            builder = builder.with_decimals(decimals);
        }
        if let Some(description) = &self.description {
            builder = builder.with_description(description);
        }
        if let Some(mime_type) = &self.mime_type {
            builder = builder.with_mime_type(mime_type);
        }
        Ok(builder)
    }

    /// Issuer for the `accessPass` section, pricing tiers in the configured token.
    pub fn access_pass_issuer(&self) -> Result<AccessPassIssuer<FacilitatorClient>, ConfigError> {
        self.access_pass_issuer_for(self.requirement_builder()?)
    }

    /// Issuer selling passes through `builder`.
    pub fn access_pass_issuer_for(
        &self,
        builder: PaymentRequirementBuilder<FacilitatorClient>,
    ) -> Result<AccessPassIssuer<FacilitatorClient>, ConfigError> {
        let pass = self.access_pass.as_ref().ok_or(ConfigError::MissingAccessPass)?;
        let decimals = builder
            .token_decimals()
            .ok_or_else(|| ConfigError::UnknownDecimals {
                network: builder.network().to_string(),
                asset: builder.asset().to_string(),
            })?;
        let tiers = TierTable::new(
            pass.tiers.iter().map(|tier| (&tier.id, &tier.price)),
            pass.rate_per_hour.as_deref(),
            decimals,
        )?;
        let signer = AccessPassSigner::new(pass.secret.inner(), pass.issuer.clone())?;
        let issuer = AccessPassIssuer::new(builder, signer, tiers);
        Ok(match &self.base_url {
            Some(base_url) => issuer.with_base_url(base_url.inner().clone()),
            None => issuer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_axum::pay_to::{PayToContext, PayToError, PayToResolver, ResolverDefaults};

    const CONFIG: &str = r#"{
        "facilitatorUrl": "https://facilitator.example.com/",
        "network": "base-sepolia",
        "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
        "description": "Market data",
        "baseUrl": "https://api.example.com",
        "accessPass": {
            "secret": "s3cret",
            "issuer": "api.example.com",
            "ratePerHour": "$0.15",
            "tiers": [{ "id": "1h", "price": "$0.10" }, { "id": "24h", "price": "$2.00" }]
        }
    }"#;

    #[test]
    fn test_requirement_builder_from_config() {
        let config = ServerConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.max_timeout_seconds, DEFAULT_MAX_TIMEOUT_SECONDS);
        let builder = config.requirement_builder().unwrap();
        assert_eq!(builder.network().to_string(), "eip155:84532");
        assert_eq!(builder.token_decimals(), Some(6));
        assert_eq!(
            builder.facilitator().base_url().as_str(),
            "https://facilitator.example.com/"
        );
    }

    #[test]
    fn test_access_pass_issuer_from_config() {
        let issuer = ServerConfig::from_json(CONFIG).unwrap().access_pass_issuer().unwrap();
        let ids: Vec<_> = issuer.tiers().tiers().iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["1h", "24h"]);
        assert_eq!(issuer.tiers().rate_per_hour(), Some("$0.15"));
        assert_eq!(issuer.signer().issuer(), "api.example.com");
    }

    #[test]
    fn test_env_indirection() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("X402_PASS_TEST_PAY_TO", "0x0000000000000000000000000000000000000042") };
        let config = CONFIG.replace(
            "\"0x209693Bc6afc0C5328bA36FaF03C514EF312287C\"",
            "\"$X402_PASS_TEST_PAY_TO\"",
        );
        let config = ServerConfig::from_json(&config).unwrap();
        assert_eq!(
            config.pay_to.unwrap().inner(),
            "0x0000000000000000000000000000000000000042"
        );
    }

    struct DepositWallet;

    #[async_trait::async_trait]
    impl PayToResolver for DepositWallet {
        async fn resolve(&self, _context: &PayToContext) -> Result<String, PayToError> {
            Ok("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into())
        }

        fn defaults(&self) -> ResolverDefaults {
            ResolverDefaults {
                network: Some("solana-devnet".into()),
                facilitator_url: Some(Url::parse("https://deposits.example.com/").unwrap()),
            }
        }
    }

    #[test]
    fn test_resolver_defaults_fill_missing_settings() {
        let config = ServerConfig::from_json(
            r#"{ "asset": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU" }"#,
        )
        .unwrap();
        assert!(matches!(
            config.requirement_builder(),
            Err(ConfigError::MissingPayTo)
        ));

        let builder = config
            .requirement_builder_with(PayTo::dynamic(DepositWallet))
            .unwrap();
        assert_eq!(
            builder.network().to_string(),
            "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1"
        );
        assert_eq!(
            builder.facilitator().base_url().as_str(),
            "https://deposits.example.com/"
        );
        assert_eq!(builder.token_decimals(), Some(6));

        let configured = ServerConfig::from_json(CONFIG)
            .unwrap()
            .requirement_builder_with(PayTo::dynamic(DepositWallet))
            .unwrap();
        assert_eq!(configured.network().to_string(), "eip155:84532");
        assert_eq!(
            configured.facilitator().base_url().as_str(),
            "https://facilitator.example.com/"
        );

        let static_pay_to = config.requirement_builder_with(PayTo::from("someone"));
        assert!(matches!(static_pay_to, Err(ConfigError::MissingFacilitator)));
    }

    #[test]
    fn test_config_errors() {
        let unknown = CONFIG.replace("base-sepolia", "atlantis");
        assert!(matches!(
            ServerConfig::from_json(&unknown).unwrap().requirement_builder(),
            Err(ConfigError::UnknownNetwork(_))
        ));

        let foreign_asset = CONFIG.replace(
            "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "0x0000000000000000000000000000000000000001",
        );
        assert!(matches!(
            ServerConfig::from_json(&foreign_asset).unwrap().access_pass_issuer(),
            Err(ConfigError::UnknownDecimals { .. })
        ));

        let empty_secret = CONFIG.replace("s3cret", "");
        assert!(matches!(
            ServerConfig::from_json(&empty_secret).unwrap().access_pass_issuer(),
            Err(ConfigError::Token(TokenError::EmptySecret))
        ));

        let missing = ServerConfig::load_from_path("/nonexistent/x402-pass.json");
        assert!(matches!(missing, Err(ConfigError::FileRead(..))));
    }
}
