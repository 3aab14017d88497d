//! Base64 helpers for x402 headers.
//!
//! Every structured x402 header is standard-alphabet base64 over a JSON
//! document. [`encode_json`] and [`decode_json`] do both steps at once.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt::Display;

/// Base64-encoded bytes, borrowed or owned.
///
/// ```rust
/// use x402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
/// assert_eq!(encoded.decode().unwrap(), b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonHeaderError {
    #[error("header is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("header is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes `value` to JSON and base64-encodes it.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Reverses [`encode_json`]. Surrounding whitespace is ignored.
pub fn decode_json<T: DeserializeOwned>(header: &[u8]) -> Result<T, JsonHeaderError> {
    let trimmed = header.trim_ascii();
    let bytes = Base64Bytes::from(trimmed).decode()?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_rejects_garbage() {
        let err = decode_json::<serde_json::Value>(b"!!not-base64!!").unwrap_err();
        assert!(matches!(err, JsonHeaderError::Base64(_)));

        let not_json = Base64Bytes::encode(b"not json").to_string();
        let err = decode_json::<serde_json::Value>(not_json.as_bytes()).unwrap_err();
        assert!(matches!(err, JsonHeaderError::Json(_)));
    }

    #[test]
    fn test_json_header_tolerates_whitespace() {
        let header = format!(" {} ", encode_json(&json!({"a": 1})).unwrap());
        let value: serde_json::Value = decode_json(header.as_bytes()).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }
}
