//! HTTP header names used by the x402 v2 transport and the access-pass extension.

/// 402 response: base64 JSON [`PaymentRequired`](crate::proto::PaymentRequired).
pub const PAYMENT_REQUIRED: &str = "PAYMENT-REQUIRED";
/// Retry request: base64 JSON [`PaymentPayload`](crate::proto::PaymentPayload).
pub const PAYMENT_SIGNATURE: &str = "PAYMENT-SIGNATURE";
/// Success response: base64 JSON [`SettleResponse`](crate::proto::SettleResponse).
pub const PAYMENT_RESPONSE: &str = "PAYMENT-RESPONSE";
/// 402 response: base64 JSON [`TierAdvertisement`](crate::access_pass::TierAdvertisement).
pub const ACCESS_PASS_TIERS: &str = "X-ACCESS-PASS-TIERS";
/// Pass purchase response: the issued bearer token.
pub const ACCESS_PASS: &str = "ACCESS-PASS";
/// Echoed unchanged by the client on retry.
pub const QUOTE_HASH: &str = "X-Quote-Hash";
