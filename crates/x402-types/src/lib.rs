#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for x402 pay-per-request flows.
//!
//! This crate holds everything the buyer and the seller side agree on without
//! depending on each other: the v2 wire format, CAIP-2 chain identifiers, the
//! [`adapter::ChainAdapter`] capability trait implemented by chain crates, the
//! [`facilitator::Facilitator`] trait, and the claims carried by access passes.
//!
//! # Modules
//!
//! - [`access_pass`] - Access-pass claims, tier ids and the tier advertisement header
//! - [`adapter`] - Chain adapter trait that turns a payment option into a signed payload
//! - [`chain`] - CAIP-2 chain ids and patterns
//! - [`config`] - Environment variable indirection for configuration values
//! - [`facilitator`] - Verify/settle/supported interface of a settlement service
//! - [`headers`] - HTTP header names used by the protocol
//! - [`networks`] - Well-known network aliases (`base`, `solana-devnet`, ...)
//! - [`proto`] - Wire types and base64 JSON header codecs
//! - [`timestamp`] - Unix timestamps for authorization windows and pass expiry
//! - [`util`] - Base64 and money amount helpers

pub mod access_pass;
pub mod adapter;
pub mod chain;
pub mod config;
pub mod facilitator;
pub mod headers;
pub mod networks;
pub mod proto;
pub mod timestamp;
pub mod util;
