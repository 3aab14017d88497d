//! Axum middleware and helpers for selling access over [x402](https://www.x402.org).
//!
//! The crate has two ways of charging:
//!
//! - [`X402Middleware`] charges for every call to a route: verify, run the handler, settle.
//! - [`AccessPassIssuer`](access_pass::AccessPassIssuer) sells time-boxed passes; a
//!   valid pass lets requests through without paying again.
//!
//! Both are built on a [`PaymentRequirementBuilder`](requirements::PaymentRequirementBuilder),
//! which quotes prices and talks to the facilitator, usually through a
//! [`FacilitatorClient`](facilitator_client::FacilitatorClient).
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, Json};
//! use axum::response::IntoResponse;
//! use http::StatusCode;
//! use serde_json::json;
//! use x402_axum::X402Middleware;
//! use x402_axum::facilitator_client::FacilitatorClient;
//! use x402_axum::requirements::PaymentRequirementBuilder;
//! use x402_types::chain::ChainId;
//!
//! let facilitator = FacilitatorClient::try_from("https://facilitator.example.com/").unwrap();
//! // Known USDC on Base Sepolia, so decimals and EIP-712 data are filled in.
//! let builder = PaymentRequirementBuilder::new(
//!     facilitator,
//!     ChainId::new("eip155", "84532"),
//!     "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
//!     "0xADDRESS",
//! )
//! .with_description("Premium Content");
//! let x402 = X402Middleware::new(builder);
//!
//! let app: Router = Router::new().route(
//!     "/paywall",
//!     get(my_handler).layer(x402.with_money_price("$0.025").unwrap()),
//! );
//!
//! async fn my_handler() -> impl IntoResponse {
//!     (StatusCode::OK, Json(json!({ "hello": "world" })))
//! }
//! ```

pub mod access_pass;
pub mod facilitator_client;
pub mod layer;
pub mod paygate;
pub mod pay_to;
pub mod requirements;
pub mod tokens;

mod responses;
#[cfg(test)]
mod test_support;

pub use access_pass::AccessPassIssuer;
pub use facilitator_client::FacilitatorClient;
pub use layer::X402Middleware;
pub use pay_to::{PayTo, PayToResolver};
pub use requirements::PaymentRequirementBuilder;
