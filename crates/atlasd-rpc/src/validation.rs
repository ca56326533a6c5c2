//! Transport-level request admission (spec §6, §7 "Protocol misuse"):
//! body size cap and `Content-Encoding` rejection happen before any
//! envelope is constructed, so violations short-circuit straight to an
//! HTTP status code.

use atlasd_types::limits::RPC_MAX_REQUEST_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    TooLarge,
    UnsupportedEncoding,
}

/// Checks a request before it's parsed. `content_encoding` is the raw
/// header value, if present; only `identity` (or absent) is accepted.
pub fn admit(body_len: usize, content_encoding: Option<&str>) -> Result<(), AdmissionError> {
    if body_len > RPC_MAX_REQUEST_SIZE {
        return Err(AdmissionError::TooLarge);
    }
    if let Some(enc) = content_encoding {
        if !enc.eq_ignore_ascii_case("identity") {
            return Err(AdmissionError::UnsupportedEncoding);
        }
    }
    Ok(())
}

/// Whether the response body should be gzip-compressed: client accepts it
/// and the payload crosses the implementation threshold (spec §6).
pub const GZIP_THRESHOLD_BYTES: usize = 4096;

pub fn should_gzip(accept_encoding: Option<&str>, body_len: usize) -> bool {
    body_len > GZIP_THRESHOLD_BYTES
        && accept_encoding
            .map(|h| h.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("gzip")))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_identity_encoded_small_body() {
        assert!(admit(128, Some("identity")).is_ok());
        assert!(admit(128, None).is_ok());
    }

    #[test]
    fn rejects_oversized_body() {
        assert_eq!(admit(RPC_MAX_REQUEST_SIZE + 1, None), Err(AdmissionError::TooLarge));
    }

    #[test]
    fn rejects_non_identity_encoding() {
        assert_eq!(admit(10, Some("gzip")), Err(AdmissionError::UnsupportedEncoding));
    }

    #[test]
    fn gzip_only_above_threshold_and_when_accepted() {
        assert!(!should_gzip(Some("gzip"), 100));
        assert!(should_gzip(Some("gzip, deflate"), 5000));
        assert!(!should_gzip(None, 5000));
    }
}
