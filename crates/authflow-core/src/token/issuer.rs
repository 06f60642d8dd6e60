//! Access/refresh token pair issuance.

use tracing::info;

use super::claims::{Header, TokenKind, TokenPair, TokenPayload};
use super::codec::{assemble, encode_segment};
use super::{ACCESS_TTL_SECS, REFRESH_TTL_SECS};
use crate::config::TokenPolicy;
use crate::error::Result;
use crate::identity::Identity;

/// Marker mixed into the placeholder signature of access tokens.
const ACCESS_SIGNATURE_MARKER: &str = "test-secret-key";
/// Marker mixed into the placeholder signature of refresh tokens.
const REFRESH_SIGNATURE_MARKER: &str = "test-refresh-secret-key";

/// Issues token pairs with a fixed expiry policy.
///
/// INSECURE: the signature segment is the encoded concatenation of a marker
/// string and the first two segments. Anyone can forge it and nothing
/// verifies it. Do not reuse this outside the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenIssuer {
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new(ACCESS_TTL_SECS, REFRESH_TTL_SECS)
    }
}

impl TokenIssuer {
    pub const fn new(access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub const fn from_policy(policy: &TokenPolicy) -> Self {
        Self::new(policy.access_ttl_secs, policy.refresh_ttl_secs)
    }

    /// Issue a fresh pair for `identity`, both tokens issued at `now`.
    pub fn issue(&self, identity: &Identity, now: i64) -> Result<TokenPair> {
        let access_token = self.issue_token(identity, now, TokenKind::Access)?;
        let refresh_token = self.issue_token(identity, now, TokenKind::Refresh)?;

        info!(
            sub = %identity.id,
            access_expires_in = self.access_ttl_secs,
            refresh_expires_in = self.refresh_ttl_secs,
            "Generated new token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn issue_token(&self, identity: &Identity, now: i64, kind: TokenKind) -> Result<String> {
        let (ttl, marker) = match kind {
            TokenKind::Access => (self.access_ttl_secs, ACCESS_SIGNATURE_MARKER),
            TokenKind::Refresh => (self.refresh_ttl_secs, REFRESH_SIGNATURE_MARKER),
        };

        let header = encode_segment(&Header::default())?;
        let payload = encode_segment(&TokenPayload::for_identity(identity, now, ttl))?;
        let signature = encode_segment(&format!("{marker}{header}{payload}"))?;
        Ok(assemble(&header, &payload, &signature))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::token::codec::{decode_payload, decode_segment, split};

    #[test]
    fn pair_shares_iat_with_independent_expiry() {
        let pair = TokenIssuer::default()
            .issue(&Identity::test_user(), 1_000)
            .unwrap();
        let access = decode_payload(&pair.access_token).unwrap();
        let refresh = decode_payload(&pair.refresh_token).unwrap();

        assert_eq!(access.iat, 1_000);
        assert_eq!(refresh.iat, 1_000);
        assert_eq!(access.exp, 1_030);
        assert_eq!(refresh.exp, 1_060);
        assert!(access.exp < refresh.exp);
    }

    #[test]
    fn access_expires_before_refresh_for_any_issue_time() {
        let issuer = TokenIssuer::default();
        for now in [0, 1, 59, 1_700_000_000, i64::from(i32::MAX)] {
            let pair = issuer.issue(&Identity::test_user(), now).unwrap();
            let access = decode_payload(&pair.access_token).unwrap();
            let refresh = decode_payload(&pair.refresh_token).unwrap();
            assert!(access.exp > access.iat);
            assert!(access.exp < refresh.exp, "now = {now}");
        }
    }

    #[test]
    fn payload_carries_identity_claims() {
        let pair = TokenIssuer::default()
            .issue(&Identity::test_user(), 0)
            .unwrap();
        let claims = decode_payload(&pair.access_token).unwrap();
        assert_eq!(claims.identity(), Identity::test_user());
    }

    #[test]
    fn signature_is_marker_plus_preceding_segments() {
        let pair = TokenIssuer::default()
            .issue(&Identity::test_user(), 0)
            .unwrap();

        let [header, payload, signature] = split(&pair.access_token).unwrap();
        let decoded: String = decode_segment(signature).unwrap();
        assert_eq!(decoded, format!("test-secret-key{header}{payload}"));

        let [header, payload, signature] = split(&pair.refresh_token).unwrap();
        let decoded: String = decode_segment(signature).unwrap();
        assert_eq!(decoded, format!("test-refresh-secret-key{header}{payload}"));
    }

    #[test]
    fn custom_policy_changes_lifetimes() {
        let issuer = TokenIssuer::from_policy(&TokenPolicy {
            access_ttl_secs: 5,
            refresh_ttl_secs: 7,
            ..TokenPolicy::default()
        });
        let pair = issuer.issue(&Identity::test_user(), 10).unwrap();
        assert_eq!(decode_payload(&pair.access_token).unwrap().exp, 15);
        assert_eq!(decode_payload(&pair.refresh_token).unwrap().exp, 17);
    }
}
