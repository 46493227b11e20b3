//! Continuation tokens
//!
//! Outbound tokens are the store-native cursor, UTF-8 encoded and wrapped in
//! standard base64. Callers treat them as opaque and hand them back verbatim.
//! An exhausted query yields the empty token.

use base64::{engine::general_purpose, Engine as _};
use docrepo_core::{RepoError, RepoResult};

/// Wrap a native cursor into an outbound token
pub fn encode(cursor: Option<&str>) -> String {
    match cursor {
        Some(cursor) if !cursor.is_empty() => general_purpose::STANDARD.encode(cursor.as_bytes()),
        _ => String::new(),
    }
}

/// Recover the native cursor from an inbound token
///
/// The empty token means "start from the beginning" and decodes to `None`.
pub fn decode(token: &str) -> RepoResult<Option<String>> {
    if token.is_empty() {
        return Ok(None);
    }
    let bytes = general_purpose::STANDARD
        .decode(token)
        .map_err(|e| RepoError::InvalidContinuationToken(e.to_string()))?;
    let cursor =
        String::from_utf8(bytes).map_err(|e| RepoError::InvalidContinuationToken(e.to_string()))?;
    Ok(Some(cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exhausted_cursor_is_empty_token() {
        assert_eq!(encode(None), "");
        assert_eq!(encode(Some("")), "");
        assert_eq!(decode("").unwrap(), None);
    }

    #[test]
    fn test_token_is_standard_base64() {
        assert_eq!(encode(Some("{\"pos\":50}")), "eyJwb3MiOjUwfQ==");
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            decode("not base64!"),
            Err(RepoError::InvalidContinuationToken(_))
        ));
    }

    #[test]
    fn test_non_utf8_payload_rejected() {
        let token = general_purpose::STANDARD.encode([0xff, 0xfe]);
        assert!(matches!(
            decode(&token),
            Err(RepoError::InvalidContinuationToken(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_cursor(cursor in ".+") {
            let token = encode(Some(&cursor));
            prop_assert!(!token.is_empty());
            prop_assert_eq!(decode(&token).unwrap(), Some(cursor));
        }
    }
}
