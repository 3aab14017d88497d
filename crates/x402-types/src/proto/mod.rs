//! Wire types exchanged between buyers, sellers and facilitators.
//!
//! Payment messages live in [`v2`] and are re-exported here. This module adds
//! the facilitator surface: [`VerifyRequest`], [`VerifyResponse`],
//! [`SettleResponse`] and [`SupportedResponse`].
//!
//! All types serialize to JSON with camelCase field names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;

use crate::chain::ChainId;
use crate::util::{JsonHeaderError, decode_json, encode_json};

pub mod v2;

pub use v2::*;

/// Body of `POST /verify` and `POST /settle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub x402_version: u8,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    pub fn new(payment_payload: PaymentPayload, payment_requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: payment_payload.x402_version,
            payment_payload,
            payment_requirements,
        }
    }
}

/// Outcome of `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    Valid {
        payer: String,
    },
    Invalid {
        reason: String,
        payer: Option<String>,
    },
}

impl VerifyResponse {
    pub fn valid<S: Into<String>>(payer: S) -> Self {
        VerifyResponse::Valid {
            payer: payer.into(),
        }
    }

    pub fn invalid<S: Into<String>>(payer: Option<String>, reason: S) -> Self {
        VerifyResponse::Invalid {
            reason: reason.into(),
            payer,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(VerifyResponse::Valid { payer })
        } else {
            Ok(VerifyResponse::Invalid {
                reason: wire
                    .invalid_reason
                    .unwrap_or_else(|| "verification_failed".to_string()),
                payer: wire.payer,
            })
        }
    }
}

/// Outcome of `POST /settle`. The success variant doubles as the body of the
/// `PAYMENT-RESPONSE` header: `{success, transaction, network, payer}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    Success {
        payer: String,
        transaction: String,
        network: String,
    },
    Error {
        reason: String,
        network: String,
    },
}

impl SettleResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SettleResponse::Success { .. })
    }

    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        encode_json(self)
    }

    pub fn from_header(header: &[u8]) -> Result<Self, JsonHeaderError> {
        decode_json(header)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default)]
    network: String,
}

impl Serialize for SettleResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            SettleResponse::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                payer: Some(payer.clone()),
                transaction: Some(transaction.clone()),
                network: network.clone(),
            },
            SettleResponse::Error { reason, network } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                payer: None,
                transaction: None,
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(SettleResponse::Success {
                payer: wire.payer.unwrap_or_default(),
                transaction,
                network: wire.network,
            })
        } else {
            Ok(SettleResponse::Error {
                reason: wire
                    .error_reason
                    .unwrap_or_else(|| "settlement_failed".to_string()),
                network: wire.network,
            })
        }
    }
}

/// One `(version, scheme, network)` combination a facilitator accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Body of `GET /supported`.
///
/// ```json
/// {
///   "kinds": [
///     { "x402Version": 2, "scheme": "exact", "network": "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
///       "extra": { "feePayer": "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4" } }
///   ],
///   "extensions": [],
///   "signers": { "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1": ["2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4"] }
/// }
/// ```
#[serde_as]
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

impl SupportedResponse {
    /// Finds the kind advertised for `scheme` on `chain_id`. Kinds that still
    /// use a legacy alias for their network are matched too.
    pub fn kind(&self, scheme: &str, chain_id: &ChainId) -> Option<&SupportedPaymentKind> {
        self.kinds.iter().find(|kind| {
            kind.scheme == scheme && ChainId::resolve(&kind.network).as_ref() == Some(chain_id)
        })
    }

    /// Fee payer for `chain_id`: `extra.feePayer` of the kind, else the first
    /// advertised signer for the chain.
    pub fn fee_payer(&self, scheme: &str, chain_id: &ChainId) -> Option<String> {
        let from_kind = self
            .kind(scheme, chain_id)
            .and_then(|kind| kind.extra.as_ref())
            .and_then(|extra| extra.get("feePayer"))
            .and_then(|fee_payer| fee_payer.as_str())
            .map(str::to_string);
        from_kind.or_else(|| {
            self.signers
                .get(&chain_id.to_string())
                .and_then(|signers| signers.first().cloned())
        })
    }

    /// Token decimals advertised in the kind's `extra.decimals`, if any.
    pub fn decimals(&self, scheme: &str, chain_id: &ChainId) -> Option<u8> {
        self.kind(scheme, chain_id)
            .and_then(|kind| kind.extra.as_ref())
            .and_then(|extra| extra.get("decimals"))
            .and_then(|decimals| decimals.as_u64())
            .and_then(|decimals| u8::try_from(decimals).ok())
    }
}
