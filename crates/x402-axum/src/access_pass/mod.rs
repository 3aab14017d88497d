//! Time-boxed access passes sold over x402.
//!
//! A buyer pays once for a tier (`1h`, `24h`, `1w`, ...) and receives an
//! HS256 token. Until it expires, presenting the token as a bearer credential
//! reaches the protected service without another payment.

mod issuer;
mod tiers;
mod token;

pub use issuer::*;
pub use tiers::*;
pub use token::*;
