//! Segment codec for three-part tokens.
//!
//! A segment is the canonical JSON of a value, base64-encoded with the
//! standard alphabet, then made URL-safe by stripping `=` padding and
//! substituting `+`/`/` with `-`/`_`. Decoding undoes the substitutions and
//! restores padding before decoding. No semantic validation happens here.

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::claims::TokenPayload;
use crate::error::{AuthError, Result};

/// Encode `value` as a URL-safe, padding-free segment.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::MalformedToken(format!("unserializable segment: {e}")))?;
    Ok(general_purpose::STANDARD
        .encode(json)
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_"))
}

/// Decode a segment produced by [`encode_segment`].
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let mut standard = segment.replace('-', "+").replace('_', "/");
    let pad = standard.len() % 4;
    if pad != 0 {
        standard.push_str(&"=".repeat(4 - pad));
    }

    let bytes = general_purpose::STANDARD
        .decode(standard.as_bytes())
        .map_err(|e| AuthError::MalformedToken(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("invalid JSON: {e}")))
}

/// Join the three encoded segments into a token string.
pub fn assemble(header: &str, payload: &str, signature: &str) -> String {
    format!("{header}.{payload}.{signature}")
}

/// Split a token into its header, payload and signature segments.
pub fn split(token: &str) -> Result<[&str; 3]> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        &[header, payload, signature] => Ok([header, payload, signature]),
        _ => Err(AuthError::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        ))),
    }
}

/// Decode the claims segment of a token.
pub fn decode_payload(token: &str) -> Result<TokenPayload> {
    let [_, payload, _] = split(token)?;
    decode_segment(payload)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::token::claims::Header;

    #[test]
    fn header_encodes_like_a_jwt() {
        // Standard JWT header for {"alg":"HS256","typ":"JWT"}.
        let segment = encode_segment(&Header::default()).unwrap();
        assert_eq!(segment, "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
    }

    #[test]
    fn segments_never_carry_padding_or_unsafe_chars() {
        // Standard encodings of these contain '=', '/' and '+'.
        for s in ["?", "??", "???", "~~~~", ">>>?"] {
            let segment = encode_segment(s).unwrap();
            assert!(!segment.contains('='), "{segment}");
            assert!(!segment.contains('+'), "{segment}");
            assert!(!segment.contains('/'), "{segment}");
            let back: String = decode_segment(&segment).unwrap();
            assert_eq!(back, s);
        }
    }

    #[test]
    fn payload_survives_encoding() {
        let payload = TokenPayload::for_identity(&Identity::test_user(), 1_700_000_000, 30);
        let segment = encode_segment(&payload).unwrap();
        let decoded: TokenPayload = decode_segment(&segment).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn garbage_segment_is_malformed() {
        let err = decode_segment::<TokenPayload>("!!not base64!!").unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[test]
    fn valid_base64_of_wrong_shape_is_malformed() {
        let segment = encode_segment(&serde_json::json!({"sub": "1"})).unwrap();
        let err = decode_segment::<TokenPayload>(&segment).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(msg) if msg.contains("JSON")));
    }

    #[test]
    fn split_requires_three_segments() {
        assert!(split("abc").is_err());
        assert!(split("a.b").is_err());
        assert!(split("a.b.c.d").is_err());
        assert_eq!(split("a.b.c").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn decode_payload_reads_middle_segment() {
        let payload = TokenPayload::for_identity(&Identity::test_user(), 0, 60);
        let token = assemble("h", &encode_segment(&payload).unwrap(), "s");
        assert_eq!(decode_payload(&token).unwrap(), payload);
    }
}
