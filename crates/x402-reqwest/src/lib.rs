//! Reqwest middleware for automatic [x402](https://www.x402.org) payment handling.
//!
//! This crate provides an [`X402Client`] that can be used as a `reqwest` middleware
//! to automatically handle `402 Payment Required` responses. When a request receives
//! a 402 response, the middleware decodes the `PAYMENT-REQUIRED` header, picks an
//! option it can pay, has the matching chain adapter sign a payment, and retries the
//! request with the `PAYMENT-SIGNATURE` header.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//! use x402_chain_eip155::Eip155Adapter;
//! use alloy_signer_local::PrivateKeySigner;
//! use reqwest::Client;
//!
//! let signer: PrivateKeySigner = "PRIVATE_KEY".parse()?;
//! let x402_client = X402Client::new().register(Eip155Adapter::new(signer));
//!
//! let http_client = Client::new().with_payments(x402_client).build();
//!
//! let response = http_client
//!     .get("https://api.example.com/protected")
//!     .send()
//!     .await?;
//! ```
//!
//! ## Chain Adapters
//!
//! Payments are signed by [`ChainAdapter`](x402_types::adapter::ChainAdapter)s,
//! one per chain family. Register one for each family you want to pay on; the
//! first registered adapter that handles a network and has a connected wallet
//! serves it.
//!
//! ## Payment Policy
//!
//! - [`X402Client::with_preferred_network`] picks among several payable options.
//! - [`X402Client::with_spend_cap`] refuses any single payment above a limit,
//!   before any balance lookup or signing.
//! - [`X402Client::with_access_passes`] buys a time-boxed access pass when the
//!   server sells them, and sends it as a bearer token until it expires.
//!
//! Failures surface as [`reqwest_middleware::Error::Middleware`] wrapping an
//! [`X402Error`] with a stable [`code`](X402Error::code).

mod access_pass_cache;
mod builder;
mod client;
mod error;

pub use access_pass_cache::*;
pub use builder::*;
pub use client::*;
pub use error::*;
