//! Expiry-only token verification.
//!
//! Decode failures never escape this module: [`is_valid`] fails closed and
//! [`remaining_seconds`] fails soft to zero.

use tracing::debug;

use super::codec::decode_payload;

/// Whether `token` decodes and has not expired at `now`.
///
/// A token is still valid at exactly `exp`; it expires once `exp < now`.
/// Signature, issuer and `iat` are not checked.
pub fn is_valid(token: &str, now: i64) -> bool {
    match decode_payload(token) {
        Ok(payload) if payload.exp < now => {
            debug!(exp = payload.exp, now, "Token expired");
            false
        }
        Ok(payload) => {
            debug!(expires_in = payload.exp.saturating_sub(now), "Token valid");
            true
        }
        Err(e) => {
            debug!(error = %e, "Invalid token format");
            false
        }
    }
}

/// Seconds until `token` expires, never negative; 0 if it does not decode.
pub fn remaining_seconds(token: &str, now: i64) -> i64 {
    decode_payload(token).map_or(0, |payload| payload.exp.saturating_sub(now).max(0))
}
