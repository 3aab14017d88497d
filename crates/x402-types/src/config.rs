//! Environment variable indirection for configuration values.
//!
//! Access-pass signing secrets, facilitator URLs and payee addresses usually
//! come from the environment rather than from a checked-in file:
//!
//! ```json
//! {
//!   "facilitatorUrl": "https://facilitator.example.com",
//!   "payTo": "$PAY_TO_ADDRESS",
//!   "accessPass": { "secret": "${ACCESS_PASS_SECRET}" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"https://facilitator.example.com"`
/// - Simple env var: `"$FACILITATOR_URL"`
/// - Braced env var: `"${FACILITATOR_URL}"`
///
/// The wrapper implements `Deref` to provide transparent access to the inner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name for `$VAR` and `${VAR}`.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
            return (!braced.is_empty()).then_some(braced);
        }
        let bare = s.strip_prefix('$')?;
        let valid = !bare.is_empty() && bare.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then_some(bare)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = if let Some(var_name) = Self::env_var_name(&s) {
            std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?
        } else {
            s
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> serde::Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name_forms() {
        assert_eq!(LiteralOrEnv::<String>::env_var_name("$SECRET"), Some("SECRET"));
        assert_eq!(LiteralOrEnv::<String>::env_var_name("${A_B}"), Some("A_B"));
        assert_eq!(LiteralOrEnv::<String>::env_var_name("$not-a-var"), None);
        assert_eq!(LiteralOrEnv::<String>::env_var_name("literal"), None);
        assert_eq!(LiteralOrEnv::<String>::env_var_name("${}"), None);
    }

    #[test]
    fn test_literal_value_is_parsed() {
        let value: LiteralOrEnv<u64> = serde_json::from_str("\"3600\"").unwrap();
        assert_eq!(*value, 3600);
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_str("\"$X402_PASS_SURELY_UNSET_VARIABLE\"");
        assert!(result.is_err());
    }
}
