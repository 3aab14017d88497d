//! x402 v2 payment messages.
//!
//! - [`PaymentRequired`] - body of the `PAYMENT-REQUIRED` header on a 402
//! - [`PaymentRequirements`] - one acceptable way to pay (a "payment option")
//! - [`PaymentPayload`] - signed payment sent back in `PAYMENT-SIGNATURE`
//! - [`ResourceInfo`] - what is being paid for
//!
//! Networks are CAIP-2 ids on the wire. Incoming `network` strings are kept
//! verbatim so older servers that still send aliases like `"base"` can be
//! resolved with [`PaymentRequirements::chain_id`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::ChainId;
use crate::util::{JsonHeaderError, decode_json, encode_json};

/// Current protocol version, emitted in every message this workspace builds.
pub const X402_VERSION: u8 = 2;

fn default_version() -> u8 {
    X402_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// Scheme-specific hints attached to a payment option.
///
/// Known keys are typed; anything else is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsExtra {
    /// Solana only: the facilitator account that pays network fees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// EVM only: EIP-712 domain name of the token contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// EVM only: EIP-712 domain version of the token contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl PaymentRequirementsExtra {
    pub fn is_empty(&self) -> bool {
        self.fee_payer.is_none()
            && self.decimals.is_none()
            && self.name.is_none()
            && self.version.is_none()
            && self.other.is_empty()
    }
}

/// One payment option in a 402 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Atomic units as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub asset: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "PaymentRequirementsExtra::is_empty")]
    pub extra: PaymentRequirementsExtra,
}

impl PaymentRequirements {
    /// The CAIP-2 id of [`Self::network`], resolving legacy aliases.
    pub fn chain_id(&self) -> Option<ChainId> {
        ChainId::resolve(&self.network)
    }

    pub fn fee_payer(&self) -> Option<&str> {
        self.extra.fee_payer.as_deref()
    }
}

/// Body of the `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    #[serde(default = "default_version")]
    pub x402_version: u8,
    pub resource: ResourceInfo,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    pub fn new(resource: ResourceInfo, accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402_VERSION,
            resource,
            accepts,
            error: None,
        }
    }

    pub fn with_error<S: Into<String>>(mut self, error: S) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Networks of every option, in server order.
    pub fn networks(&self) -> Vec<String> {
        self.accepts.iter().map(|a| a.network.clone()).collect()
    }

    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        encode_json(self)
    }

    pub fn from_header(header: &[u8]) -> Result<Self, JsonHeaderError> {
        decode_json(header)
    }
}

/// Body of the `PAYMENT-SIGNATURE` header.
///
/// `payload` is chain-specific: `{"transaction": "<base64>"}` on Solana,
/// `{"signature": "0x..", "authorization": {..}}` on EVM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default = "default_version")]
    pub x402_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    pub accepted: PaymentRequirements,
    pub payload: Value,
}

impl PaymentPayload {
    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        encode_json(self)
    }

    pub fn from_header(header: &[u8]) -> Result<Self, JsonHeaderError> {
        decode_json(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn solana_option() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1".into(),
            amount: Some("10000".into()),
            asset: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".into(),
            pay_to: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into(),
            max_timeout_seconds: 60,
            extra: PaymentRequirementsExtra {
                fee_payer: Some("2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4".into()),
                decimals: Some(6),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_payment_required_header_round_trip() {
        let mut evm = solana_option();
        evm.network = "eip155:84532".into();
        evm.extra = PaymentRequirementsExtra {
            name: Some("USDC".into()),
            version: Some("2".into()),
            ..Default::default()
        };
        evm.extra.other.insert("assetTransferMethod".into(), json!("eip3009"));

        let required = PaymentRequired::new(
            ResourceInfo {
                url: "https://api.example.com/premium".into(),
                description: Some("Premium data".into()),
                mime_type: Some("application/json".into()),
            },
            vec![solana_option(), evm],
        )
        .with_error("payment required");

        let header = required.to_header().unwrap();
        let decoded = PaymentRequired::from_header(header.as_bytes()).unwrap();
        assert_eq!(decoded, required);
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(solana_option()).unwrap();
        assert_eq!(value["payTo"], "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
        assert_eq!(value["maxTimeoutSeconds"], 60);
        assert_eq!(
            value["extra"]["feePayer"],
            "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4"
        );
        let required = PaymentRequired::new(ResourceInfo::new("/x"), vec![]);
        let value = serde_json::to_value(required).unwrap();
        assert_eq!(value["x402Version"], 2);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_missing_amount_and_extra_are_tolerated() {
        let option: PaymentRequirements = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "base",
            "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            "payTo": "0x0000000000000000000000000000000000000001",
            "maxTimeoutSeconds": 300
        }))
        .unwrap();
        assert!(option.amount.is_none());
        assert!(option.extra.is_empty());
        assert_eq!(option.chain_id().unwrap().to_string(), "eip155:8453");
    }
}
