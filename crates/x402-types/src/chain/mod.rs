//! CAIP-2 chain identifiers.
//!
//! - [`ChainId`] - a concrete network such as `eip155:8453`
//! - [`ChainIdPattern`] - a wildcard, exact or set match over chain ids, used by
//!   chain adapters to declare which networks they handle

mod chain_id;

pub use chain_id::*;
