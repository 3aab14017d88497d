//! Pay-per-request and access passes over [x402](https://www.x402.org).
//!
//! This crate bundles the workspace into one dependency for services and
//! clients that trade over HTTP `402 Payment Required`:
//!
//! - [`x402_types`] - protocol types, headers, CAIP-2 chain ids, access-pass claims
//!   and the [`ChainAdapter`](x402_types::adapter::ChainAdapter) trait.
//! - [`x402_axum`] - the seller side: payment requirements, the per-route
//!   [`X402Middleware`](x402_axum::X402Middleware), the
//!   [`AccessPassIssuer`](x402_axum::AccessPassIssuer) and the facilitator client.
//! - [`x402_reqwest`] - the buyer side: [`X402Client`](x402_reqwest::X402Client)
//!   pays 402 answers and reuses purchased passes.
//! - [`x402_chain_eip155`] and [`x402_chain_solana`] - chain adapters that sign payments.
//!
//! On top of these, [`config`] reads a seller configuration from JSON with
//! `$ENV` indirection, and [`telemetry`] installs tracing with optional
//! OpenTelemetry export.
//!
//! ```no_run
//! use x402_pass::config::ServerConfig;
//! use x402_pass::telemetry::Telemetry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let _telemetry = Telemetry::new();
//! let config = ServerConfig::load()?;
//! let paygate = x402_pass::x402_axum::X402Middleware::new(config.requirement_builder()?);
//! let issuer = config.access_pass_issuer()?;
//! # let _ = (paygate, issuer);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod telemetry;

pub use x402_axum;
pub use x402_chain_eip155;
pub use x402_chain_solana;
pub use x402_reqwest;
pub use x402_types;
