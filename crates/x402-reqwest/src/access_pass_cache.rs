//! Host-keyed store of purchased access passes.

use dashmap::DashMap;
use std::sync::Arc;
use url::Url;
use x402_types::access_pass::AccessPassClaims;
use x402_types::timestamp::UnixTimestamp;

/// Seconds before `exp` at which a cached pass stops being used.
pub const EXPIRY_SKEW_SECONDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPass {
    pub token: String,
    pub expires_at: u64,
}

impl CachedPass {
    /// Usable at `now` with at least [`EXPIRY_SKEW_SECONDS`] to spare.
    pub fn is_usable_at(&self, now: UnixTimestamp) -> bool {
        now.as_secs().saturating_add(EXPIRY_SKEW_SECONDS) < self.expires_at
    }
}

/// Access passes by host, shared between clones.
///
/// Concurrent purchases for one host overwrite each other; the last one wins.
#[derive(Debug, Clone, Default)]
pub struct AccessPassCache {
    passes: Arc<DashMap<String, CachedPass>>,
}

impl AccessPassCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `host[:port]` of `url`, the key passes are stored under.
    pub fn key(url: &Url) -> Option<String> {
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Token for `key` unless it expires within the skew window at `now`.
    /// Expired entries are dropped.
    pub fn get(&self, key: &str, now: UnixTimestamp) -> Option<String> {
        let usable = {
            let pass = self.passes.get(key)?;
            pass.is_usable_at(now).then(|| pass.token.clone())
        };
        if usable.is_none() {
            self.evict_expired(key, now);
        }
        usable
    }

    /// Drops the entry for `key` only if it is still expired, so a fresh
    /// pass stored in the meantime survives.
    fn evict_expired(&self, key: &str, now: UnixTimestamp) {
        self.passes.remove_if(key, |_, pass| !pass.is_usable_at(now));
    }

    pub fn insert(&self, key: impl Into<String>, pass: CachedPass) {
        self.passes.insert(key.into(), pass);
    }

    /// Stores `token` under `key`, reading the expiry from its claims.
    /// Returns `false` for tokens whose claims cannot be read.
    pub fn insert_token(&self, key: impl Into<String>, token: &str) -> bool {
        match AccessPassClaims::peek(token) {
            Some(claims) => {
                self.insert(
                    key,
                    CachedPass {
                        token: token.to_string(),
                        expires_at: claims.exp,
                    },
                );
                true
            }
            None => false,
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.passes.remove(key);
    }

    pub fn clear(&self) {
        self.passes.clear();
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
