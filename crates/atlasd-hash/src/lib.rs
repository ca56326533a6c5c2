//! Hash helpers shared by the naming-protocol data model and storage layer.
//!
//! The core protocol only needs one primitive: a SHA-256 digest, truncated
//! to the widths the protocol defines for consensus hashes (16 bytes) and
//! zone-file value hashes (20 bytes). Kept as its own small crate, separate
//! from the higher-level data model that consumes it.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("wrong length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, HashError>;

/// Full 32-byte SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    hash
}

/// Truncate a digest to `len` bytes. Used to derive the protocol's
/// fixed-width consensus hash (16 bytes) and value hash (20 bytes) from a
/// full SHA-256 digest.
pub fn truncated_sha256(data: &[u8], len: usize) -> Vec<u8> {
    let full = sha256(data);
    full[..len].to_vec()
}

/// Parse a hex string into exactly `len` bytes, rejecting any other length.
pub fn parse_hex_exact(s: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
    if bytes.len() != len {
        return Err(HashError::WrongLength {
            expected: len,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_32_bytes() {
        assert_eq!(sha256(b"hello").len(), 32);
    }

    #[test]
    fn truncated_sha256_respects_len() {
        assert_eq!(truncated_sha256(b"hello", 16).len(), 16);
        assert_eq!(truncated_sha256(b"hello", 20).len(), 20);
    }

    #[test]
    fn parse_hex_exact_rejects_wrong_length() {
        let hex20 = hex::encode([0u8; 20]);
        assert!(parse_hex_exact(&hex20, 20).is_ok());
        assert!(parse_hex_exact(&hex20, 16).is_err());
    }

    #[test]
    fn parse_hex_exact_rejects_bad_hex() {
        assert!(parse_hex_exact("not-hex!!", 4).is_err());
    }
}
