//! Tier table and per-purchase tier resolution.

use alloy_primitives::U256;
use x402_types::access_pass::{TierAdvertisement, TierId, TierOffer};
use x402_types::util::money_amount::{MoneyAmount, MoneyAmountParseError};

const SECONDS_PER_HOUR: u64 = 60 * 60;

/// A configured tier with its price in atomic token units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub id: TierId,
    /// As configured, e.g. `"$2.00"`.
    pub price: String,
    pub price_atomic: U256,
}

impl Tier {
    pub fn offer(&self) -> TierOffer {
        TierOffer {
            id: self.id.to_string(),
            label: self.id.label(),
            seconds: self.id.seconds(),
            price: self.price.clone(),
            price_atomic: self.price_atomic.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rate {
    price: String,
    atomic: U256,
}

/// What a buyer asked for via `?tier=` or `?duration=`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierQuery {
    pub tier: Option<String>,
    /// Raw `duration` value, seconds.
    pub duration: Option<String>,
}

impl TierQuery {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut result = TierQuery::default();
        let Some(query) = query else {
            return result;
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "tier" => result.tier = Some(value.into_owned()),
                "duration" => result.duration = Some(value.into_owned()),
                _ => {}
            }
        }
        result
    }
}

/// The tier a purchase is priced at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTier {
    pub id: String,
    pub label: String,
    pub seconds: u64,
    pub price_atomic: U256,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TierError {
    #[error("Unknown tier {0:?}")]
    UnknownTier(String),
    #[error("Invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("No rate per hour configured for custom durations")]
    NoRate,
}

impl TierError {
    pub fn code(&self) -> &'static str {
        match self {
            TierError::UnknownTier(_) => "unknown_tier",
            TierError::InvalidDuration(_) => "invalid_duration",
            TierError::NoRate => "duration_not_offered",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TierTableError {
    #[error("Invalid rate per hour {price:?}: {source}")]
    InvalidRate {
        price: String,
        #[source]
        source: MoneyAmountParseError,
    },
    #[error("No tiers and no rate per hour configured")]
    Empty,
}

/// Configured tiers plus the optional per-hour rate, priced for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<Tier>,
    rate: Option<Rate>,
}

impl TierTable {
    /// Builds the table from `(id, price)` pairs.
    ///
    /// Malformed ids and unparsable prices are dropped with a warning. An
    /// unparsable rate is an error, as is a table with neither tiers nor rate.
    pub fn new<I, K, V>(
        tiers: I,
        rate_per_hour: Option<&str>,
        decimals: u8,
    ) -> Result<Self, TierTableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = Vec::new();
        for (id, price) in tiers {
            let (id, price) = (id.as_ref(), price.as_ref());
            let tier_id = match id.parse::<TierId>() {
                Ok(tier_id) => tier_id,
                Err(e) => {
                    tracing::warn!(tier = id, error = %e, "Dropping access-pass tier");
                    continue;
                }
            };
            let price_atomic = match MoneyAmount::parse(price).and_then(|m| m.to_atomic(decimals)) {
                Ok(atomic) => atomic,
                Err(e) => {
                    tracing::warn!(tier = id, price, error = %e, "Dropping access-pass tier");
                    continue;
                }
            };
            table.push(Tier {
                id: tier_id,
                price: price.to_string(),
                price_atomic,
            });
        }

        let rate = rate_per_hour
            .map(|price| {
                MoneyAmount::parse(price)
                    .and_then(|m| m.to_atomic(decimals))
                    .map(|atomic| Rate {
                        price: price.to_string(),
                        atomic,
                    })
                    .map_err(|source| TierTableError::InvalidRate {
                        price: price.to_string(),
                        source,
                    })
            })
            .transpose()?;

        if table.is_empty() && rate.is_none() {
            return Err(TierTableError::Empty);
        }
        Ok(Self { tiers: table, rate })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier(&self, id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|tier| tier.id.as_str() == id)
    }

    pub fn rate_per_hour(&self) -> Option<&str> {
        self.rate.as_ref().map(|rate| rate.price.as_str())
    }

    pub fn advertisement(&self, issuer: &str) -> TierAdvertisement {
        TierAdvertisement {
            tiers: (!self.tiers.is_empty()).then(|| self.tiers.iter().map(Tier::offer).collect()),
            rate_per_hour: self.rate_per_hour().map(str::to_string),
            issuer: Some(issuer.to_string()),
        }
    }

    /// Explicit tier, else a duration priced at the hourly rate, else the
    /// cheapest tier, else one hour at the hourly rate.
    pub fn resolve(&self, query: &TierQuery) -> Result<ResolvedTier, TierError> {
        if let Some(id) = &query.tier {
            let tier = self
                .tier(id)
                .ok_or_else(|| TierError::UnknownTier(id.clone()))?;
            return Ok(resolved(tier));
        }
        if let Some(duration) = &query.duration {
            let seconds = duration
                .parse::<u64>()
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or_else(|| TierError::InvalidDuration(duration.clone()))?;
            return self.priced_by_rate(seconds);
        }
        if let Some(cheapest) = self.tiers.iter().min_by_key(|tier| tier.price_atomic) {
            return Ok(resolved(cheapest));
        }
        self.priced_by_rate(SECONDS_PER_HOUR)
    }

    fn priced_by_rate(&self, seconds: u64) -> Result<ResolvedTier, TierError> {
        let rate = self.rate.as_ref().ok_or(TierError::NoRate)?;
        let hour = U256::from(SECONDS_PER_HOUR);
        let price_atomic = (rate.atomic * U256::from(seconds) + hour - U256::from(1u8)) / hour;
        let (id, label) = duration_id(seconds);
        Ok(ResolvedTier {
            id,
            label,
            seconds,
            price_atomic,
        })
    }
}

fn resolved(tier: &Tier) -> ResolvedTier {
    ResolvedTier {
        id: tier.id.to_string(),
        label: tier.id.label(),
        seconds: tier.id.seconds(),
        price_atomic: tier.price_atomic,
    }
}

/// Tier id for an ad-hoc duration, in the largest whole unit.
///
/// Ids stay within `<integer><m|h|d|w>`, so a duration that is not a whole
/// number of minutes gets the next minute up as its id. The pass itself keeps
/// the exact seconds in its `duration` claim.
fn duration_id(seconds: u64) -> (String, String) {
    let id = if seconds % SECONDS_PER_HOUR == 0 {
        format!("{}h", seconds / SECONDS_PER_HOUR)
    } else {
        format!("{}m", seconds.div_ceil(60))
    };
    let label = if seconds % 60 == 0 {
        id.parse::<TierId>()
            .map(|tier_id| tier_id.label())
            .unwrap_or_else(|_| id.clone())
    } else {
        let plural = if seconds == 1 { "" } else { "s" };
        format!("{seconds} second{plural}")
    };
    (id, label)
}
