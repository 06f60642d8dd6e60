//! Token lifecycle primitives: claims, codec, issuance and verification.
//!
//! Tokens are JWT-shaped (`header.payload.signature`) but the signature
//! segment is a placeholder. Nothing in this module authenticates a token;
//! validity is purely a function of the `exp` claim.

pub mod claims;
pub mod codec;
pub mod issuer;
pub mod verifier;

pub use claims::{Header, TokenKind, TokenPair, TokenPayload};
pub use issuer::TokenIssuer;
pub use verifier::{is_valid, remaining_seconds};

/// Access token lifetime.
pub const ACCESS_TTL_SECS: i64 = 30;
/// Refresh token lifetime.
pub const REFRESH_TTL_SECS: i64 = 60;
/// The periodic checker refreshes once the access token has less than this left.
pub const REFRESH_THRESHOLD_SECS: i64 = 10;
/// How often the periodic checker runs.
pub const PERIODIC_CHECK_INTERVAL_SECS: u64 = 15;
