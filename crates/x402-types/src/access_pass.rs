//! Access passes: one payment buys a time-limited bearer token.
//!
//! The issuing side lives in `x402-axum`; this module holds what both sides
//! need to agree on:
//!
//! - [`AccessPassClaims`] - claims carried inside an issued token
//! - [`TierId`] - `<integer><unit>` duration ids such as `"24h"` or `"1w"`
//! - [`TierAdvertisement`] - body of the `X-ACCESS-PASS-TIERS` header
//!
//! Tokens use the compact `header.claims.signature` layout with unpadded
//! base64url segments. [`AccessPassClaims::peek`] reads the claims without
//! checking the signature; buyers use it to learn the expiry of a pass they
//! just bought. Only the issuer can verify a token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::timestamp::UnixTimestamp;
use crate::util::{JsonHeaderError, decode_json, encode_json};

/// Fixed `sub` of every access-pass token.
pub const ACCESS_PASS_SUBJECT: &str = "access-pass";

/// Claims of an issued access pass. `exp = iat + duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPassClaims {
    pub sub: String,
    pub tier: String,
    /// Seconds.
    pub duration: u64,
    pub iat: u64,
    pub exp: u64,
    pub payer: String,
    pub network: String,
    pub iss: String,
}

impl AccessPassClaims {
    pub fn new(
        tier: impl Into<String>,
        duration: u64,
        issued_at: UnixTimestamp,
        payer: impl Into<String>,
        network: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        let iat = issued_at.as_secs();
        Self {
            sub: ACCESS_PASS_SUBJECT.to_string(),
            tier: tier.into(),
            duration,
            iat,
            exp: iat.saturating_add(duration),
            payer: payer.into(),
            network: network.into(),
            iss: issuer.into(),
        }
    }

    pub fn issued_at(&self) -> UnixTimestamp {
        UnixTimestamp::from_secs(self.iat)
    }

    pub fn expires_at(&self) -> UnixTimestamp {
        UnixTimestamp::from_secs(self.exp)
    }

    pub fn is_expired_at(&self, now: UnixTimestamp) -> bool {
        now.as_secs() >= self.exp
    }

    /// Decodes the claims segment of a token without verifying it.
    pub fn peek(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (_header, claims, _signature) = (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(claims).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

static TIER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(m|h|d|w)$").expect("valid tier id pattern"));

/// A duration tier id: digits followed by `m`, `h`, `d` or `w`.
///
/// ```
/// use x402_types::access_pass::TierId;
///
/// assert_eq!("24h".parse::<TierId>().unwrap().seconds(), 86_400);
/// assert_eq!("1w".parse::<TierId>().unwrap().seconds(), 604_800);
/// assert!("forever".parse::<TierId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TierId {
    id: String,
    count: u64,
    unit: TierUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TierUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl TierUnit {
    fn seconds(self) -> u64 {
        match self {
            TierUnit::Minute => 60,
            TierUnit::Hour => 60 * 60,
            TierUnit::Day => 24 * 60 * 60,
            TierUnit::Week => 7 * 24 * 60 * 60,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            TierUnit::Minute => "minute",
            TierUnit::Hour => "hour",
            TierUnit::Day => "day",
            TierUnit::Week => "week",
        }
    }
}

impl TierId {
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn seconds(&self) -> u64 {
        self.count.saturating_mul(self.unit.seconds())
    }

    /// `"24h"` reads as `"24 hours"`, `"1w"` as `"1 week"`.
    pub fn label(&self) -> String {
        let plural = if self.count == 1 { "" } else { "s" };
        format!("{} {}{}", self.count, self.unit.noun(), plural)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid tier id {0:?}, expected <integer><m|h|d|w>")]
pub struct TierIdFormatError(String);

impl FromStr for TierId {
    type Err = TierIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = TIER_ID_PATTERN
            .captures(s)
            .ok_or_else(|| TierIdFormatError(s.to_string()))?;
        let count = captures[1]
            .parse::<u64>()
            .map_err(|_| TierIdFormatError(s.to_string()))?;
        let unit = match &captures[2] {
            "m" => TierUnit::Minute,
            "h" => TierUnit::Hour,
            "d" => TierUnit::Day,
            _ => TierUnit::Week,
        };
        Ok(TierId {
            id: s.to_string(),
            count,
            unit,
        })
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One purchasable tier as advertised to buyers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierOffer {
    pub id: String,
    pub label: String,
    pub seconds: u64,
    /// Human-readable price, e.g. `"$2.00"`.
    pub price: String,
    pub price_atomic: String,
}

/// Body of the `X-ACCESS-PASS-TIERS` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAdvertisement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<TierOffer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_per_hour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl TierAdvertisement {
    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        encode_json(self)
    }

    pub fn from_header(header: &[u8]) -> Result<Self, JsonHeaderError> {
        decode_json(header)
    }

    /// Tier with the given id, if advertised.
    pub fn tier(&self, id: &str) -> Option<&TierOffer> {
        self.tiers.as_ref()?.iter().find(|tier| tier.id == id)
    }
}
