//! HS256 access-pass tokens in compact JWT layout.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x402_types::access_pass::{ACCESS_PASS_SUBJECT, AccessPassClaims};
use x402_types::timestamp::UnixTimestamp;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

const ALG: &str = "HS256";
const TYP: &str = "JWT";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Access-pass secret must not be empty")]
    EmptySecret,
    #[error("Invalid access-pass secret")]
    InvalidSecret(#[from] hmac::digest::InvalidLength),
    #[error("Failed to encode access-pass claims: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Mints and checks access-pass tokens with one shared secret.
#[derive(Clone)]
pub struct AccessPassSigner {
    mac: HmacSha256,
    issuer: String,
}

impl std::fmt::Debug for AccessPassSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPassSigner")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl AccessPassSigner {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            issuer: issuer.into(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn mint(&self, claims: &AccessPassClaims) -> Result<String, TokenError> {
        let header = TokenHeader {
            alg: ALG.into(),
            typ: TYP.into(),
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{claims}");
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Claims of `token` if it is well-formed, signed with this secret, names
    /// this issuer and the access-pass subject, and has not expired at `now`.
    pub fn verify(&self, token: &str, now: UnixTimestamp) -> Option<AccessPassClaims> {
        let (signing_input, signature) = token.rsplit_once('.')?;
        let (header, claims) = signing_input.split_once('.')?;

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let header: TokenHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).ok()?).ok()?;
        if header.alg != ALG {
            return None;
        }
        let claims: AccessPassClaims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims).ok()?).ok()?;
        if claims.sub != ACCESS_PASS_SUBJECT || claims.iss != self.issuer {
            return None;
        }
        if claims.is_expired_at(now) {
            return None;
        }
        Some(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(issuer: &str) -> AccessPassClaims {
        AccessPassClaims::new(
            "1h",
            3_600,
            UnixTimestamp::from_secs(1_000),
            "payer",
            "eip155:84532",
            issuer,
        )
    }

    #[test]
    fn test_mint_then_verify() {
        let signer = AccessPassSigner::new("secret", "api.example.com").unwrap();
        let token = signer.mint(&claims("api.example.com")).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = signer.verify(&token, UnixTimestamp::from_secs(2_000)).unwrap();
        assert_eq!(verified, claims("api.example.com"));
        assert_eq!(AccessPassClaims::peek(&token), Some(verified));
    }

    #[test]
    fn test_expired_token_is_absent() {
        let signer = AccessPassSigner::new("secret", "api.example.com").unwrap();
        let token = signer.mint(&claims("api.example.com")).unwrap();
        assert!(signer.verify(&token, UnixTimestamp::from_secs(4_600)).is_none());
    }

    #[test]
    fn test_tampered_token_is_absent() {
        let signer = AccessPassSigner::new("secret", "api.example.com").unwrap();
        let token = signer.mint(&claims("api.example.com")).unwrap();
        let now = UnixTimestamp::from_secs(2_000);

        let other = AccessPassSigner::new("other-secret", "api.example.com").unwrap();
        assert!(other.verify(&token, now).is_none());

        let mut forged = claims("api.example.com");
        forged.exp = u64::MAX;
        let forged_segment = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let parts: Vec<&str> = token.split('.').collect();
        let forged_token = format!("{}.{}.{}", parts[0], forged_segment, parts[2]);
        assert!(signer.verify(&forged_token, now).is_none());

        assert!(signer.verify("not-a-token", now).is_none());
        assert!(signer.verify("a.b.c", now).is_none());
    }

    #[test]
    fn test_foreign_issuer_and_subject_are_absent() {
        let signer = AccessPassSigner::new("secret", "api.example.com").unwrap();
        let now = UnixTimestamp::from_secs(2_000);

        let token = signer.mint(&claims("elsewhere.example.com")).unwrap();
        assert!(signer.verify(&token, now).is_none());

        let mut wrong_subject = claims("api.example.com");
        wrong_subject.sub = "session".into();
        let token = signer.mint(&wrong_subject).unwrap();
        assert!(signer.verify(&token, now).is_none());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(
            AccessPassSigner::new("", "issuer"),
            Err(TokenError::EmptySecret)
        ));
    }
}
