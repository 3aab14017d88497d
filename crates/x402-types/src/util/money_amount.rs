//! Human-readable prices.
//!
//! Tier prices and per-hour rates are configured as strings like `"$2.00"` or
//! `"1,000.50"`. [`MoneyAmount`] parses them into an exact decimal and converts
//! to atomic token units for a given number of decimals.
//!
//! ```rust
//! use x402_types::util::money_amount::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("$2.00").unwrap();
//! assert_eq!(amount.scale(), 2);
//! assert_eq!(amount.mantissa(), 200);
//! assert_eq!(amount.to_atomic(6).unwrap().to_string(), "2000000");
//! ```

use alloy_primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A non-negative decimal amount that keeps the precision it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    /// Number of decimal places in the input, `"10.50"` has scale 2.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value without its decimal point, `"10.50"` gives 1050.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts to atomic units of a token with `decimals` places.
    ///
    /// Fails when the amount is written with more precision than the token has.
    pub fn to_atomic(&self, decimals: u8) -> Result<U256, MoneyAmountParseError> {
        let scale = self.scale();
        let token = u32::from(decimals);
        if scale > token {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token,
            });
        }
        let multiplier = U256::from(10u8).pow(U256::from(token - scale));
        Ok(U256::from(self.mantissa()) * multiplier)
    }

    /// Parses a price string. Currency symbols, thousand separators and
    /// whitespace are ignored.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned: String = input
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        Self::checked(parsed)
    }

    fn checked(value: Decimal) -> Result<Self, MoneyAmountParseError> {
        if value.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if value < *constants::MIN || value > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(MoneyAmount(value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        constants::MIN_STR,
        constants::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

mod constants {
    use rust_decimal::Decimal;
    use std::sync::LazyLock;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> = LazyLock::new(|| Decimal::new(1, 9));
    pub static MAX: LazyLock<Decimal> = LazyLock::new(|| Decimal::new(999_999_999, 0));
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<f64> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value).ok_or(MoneyAmountParseError::OutOfRange)?;
        Self::checked(decimal)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_symbols_and_separators() {
        let amount = MoneyAmount::parse("$1,000.50").unwrap();
        assert_eq!(amount.mantissa(), 100050);
        assert_eq!(amount.scale(), 2);
    }

    #[test]
    fn test_two_dollars_at_six_decimals() {
        let amount = MoneyAmount::parse("$2.00").unwrap();
        assert_eq!(amount.to_atomic(6).unwrap(), U256::from(2_000_000u64));
    }

    #[test]
    fn test_sub_cent_price() {
        let amount = MoneyAmount::parse("0.001").unwrap();
        assert_eq!(amount.to_atomic(6).unwrap(), U256::from(1_000u64));
    }

    #[test]
    fn test_too_precise_for_token() {
        let amount = MoneyAmount::parse("0.0000001").unwrap();
        assert!(matches!(
            amount.to_atomic(6),
            Err(MoneyAmountParseError::WrongPrecision { money: 7, token: 6 })
        ));
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(matches!(
            MoneyAmount::parse("-1"),
            Err(MoneyAmountParseError::Negative)
        ));
        assert!(matches!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        ));
        assert!(matches!(
            MoneyAmount::parse("0"),
            Err(MoneyAmountParseError::OutOfRange)
        ));
    }
}
