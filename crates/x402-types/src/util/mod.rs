//! Helper types shared across the workspace.
//!
//! - [`b64`] - base64 bytes and base64 JSON header codecs
//! - [`money_amount`] - human-readable prices (`"$2.00"`) to atomic token units

pub mod b64;
pub mod money_amount;

pub use b64::*;
