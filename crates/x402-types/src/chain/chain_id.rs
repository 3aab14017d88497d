use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::networks;

/// A CAIP-2 blockchain identifier, `namespace:reference`.
///
/// Serializes to and from the colon-separated string form, e.g. `"eip155:8453"`
/// or `"solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"`.
///
/// ```
/// use x402_types::chain::ChainId;
///
/// let base: ChainId = "eip155:8453".parse().unwrap();
/// assert_eq!(base.namespace(), "eip155");
/// assert_eq!(base.reference(), "8453");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    pub namespace: String,
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Looks a legacy network alias (`"base-sepolia"`, `"solana"`) up in
    /// [`networks::KNOWN_NETWORKS`].
    pub fn from_network_name(network_name: &str) -> Option<Self> {
        networks::chain_id_by_network_name(network_name).cloned()
    }

    /// Returns the legacy alias for this chain, if it has one.
    pub fn as_network_name(&self) -> Option<&'static str> {
        networks::network_name_by_chain_id(self)
    }

    /// Resolves whatever a server put into a payment option's `network` field.
    ///
    /// Accepts a CAIP-2 id as-is and maps known aliases to their CAIP-2 id.
    /// Returns `None` for anything else.
    ///
    /// ```
    /// use x402_types::chain::ChainId;
    ///
    /// assert_eq!(ChainId::resolve("base").unwrap().to_string(), "eip155:8453");
    /// assert_eq!(ChainId::resolve("eip155:137").unwrap().to_string(), "eip155:137");
    /// assert!(ChainId::resolve("unknown").is_none());
    /// ```
    pub fn resolve(network: &str) -> Option<Self> {
        if let Some(chain_id) = Self::from_network_name(network) {
            return Some(chain_id);
        }
        match ChainId::from_str(network) {
            Ok(chain_id) if !chain_id.namespace.is_empty() && !chain_id.reference.is_empty() => {
                Some(chain_id)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        Ok(ChainId::new(namespace, reference))
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

/// Matches chain ids: `eip155:*`, `eip155:8453` or `eip155:{1,8453,137}`.
#[derive(Debug, Clone)]
pub enum ChainIdPattern {
    Wildcard {
        namespace: String,
    },
    Exact {
        namespace: String,
        reference: String,
    },
    Set {
        namespace: String,
        references: HashSet<String>,
    },
}

impl ChainIdPattern {
    pub fn wildcard<S: Into<String>>(namespace: S) -> Self {
        Self::Wildcard {
            namespace: namespace.into(),
        }
    }

    pub fn exact<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self::Exact {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn set<N: Into<String>>(namespace: N, references: HashSet<String>) -> Self {
        Self::Set {
            namespace: namespace.into(),
            references,
        }
    }

    pub fn matches(&self, chain_id: &ChainId) -> bool {
        match self {
            ChainIdPattern::Wildcard { namespace } => chain_id.namespace == *namespace,
            ChainIdPattern::Exact {
                namespace,
                reference,
            } => chain_id.namespace == *namespace && chain_id.reference == *reference,
            ChainIdPattern::Set {
                namespace,
                references,
            } => chain_id.namespace == *namespace && references.contains(&chain_id.reference),
        }
    }

    /// Matches a raw `network` string the way adapters need it: a CAIP-2 id,
    /// a legacy alias, or a bare namespace prefix (`"solana"` matches `solana:*`).
    pub fn matches_network(&self, network: &str) -> bool {
        if let Some(chain_id) = ChainId::resolve(network) {
            return self.matches(&chain_id);
        }
        network == self.namespace()
    }

    pub fn namespace(&self) -> &str {
        match self {
            ChainIdPattern::Wildcard { namespace } => namespace,
            ChainIdPattern::Exact { namespace, .. } => namespace,
            ChainIdPattern::Set { namespace, .. } => namespace,
        }
    }
}

impl fmt::Display for ChainIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIdPattern::Wildcard { namespace } => write!(f, "{namespace}:*"),
            ChainIdPattern::Exact {
                namespace,
                reference,
            } => write!(f, "{namespace}:{reference}"),
            ChainIdPattern::Set {
                namespace,
                references,
            } => {
                let mut refs: Vec<&str> = references.iter().map(String::as_str).collect();
                refs.sort_unstable();
                write!(f, "{}:{{{}}}", namespace, refs.join(","))
            }
        }
    }
}

impl FromStr for ChainIdPattern {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || rest.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        if rest == "*" {
            return Ok(ChainIdPattern::wildcard(namespace));
        }
        if let Some(inner) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let references = inner
                .split(',')
                .map(str::trim)
                .map(|item| {
                    if item.is_empty() {
                        Err(ChainIdFormatError(s.into()))
                    } else {
                        Ok(item.to_string())
                    }
                })
                .collect::<Result<HashSet<_>, _>>()?;
            return Ok(ChainIdPattern::set(namespace, references));
        }
        Ok(ChainIdPattern::exact(namespace, rest))
    }
}

impl From<ChainId> for ChainIdPattern {
    fn from(chain_id: ChainId) -> Self {
        ChainIdPattern::exact(chain_id.namespace, chain_id.reference)
    }
}
