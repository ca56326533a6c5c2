//! Argument validators for the RPC surface (§4.3 table): one function per
//! argument kind, each returning a typed error convertible into the
//! transport-level error used by `atlasd-rpc`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TypesError;
use crate::limits::{CONSENSUS_HASH_LEN, FIRST_BLOCK_MAINNET, MAX_BLOCK_ID, VALUE_HASH_LEN};

lazy_static! {
    /// `<label>.<namespace_id>`, lowercase alphanumerics/hyphen/underscore/plus,
    /// label 1-37 chars, namespace 1-19 chars — matching the shape used by
    /// the original protocol's naming regex.
    static ref NAME_RE: Regex =
        Regex::new(r"^[a-z0-9\-_+]{1,37}\.[a-z0-9\-_+]{1,19}$").unwrap();
    static ref NAMESPACE_RE: Regex = Regex::new(r"^[a-z0-9\-_+]{1,19}$").unwrap();
    /// Base58check-style address: 26-35 alphanumeric characters.
    static ref ADDRESS_RE: Regex = Regex::new(r"^[a-km-zA-HJ-NP-Z1-9]{26,35}$").unwrap();
}

pub fn validate_name(s: &str) -> Result<(), TypesError> {
    if NAME_RE.is_match(s) {
        Ok(())
    } else {
        Err(TypesError::InvalidName(s.to_string()))
    }
}

pub fn validate_namespace_id(s: &str) -> Result<(), TypesError> {
    if NAMESPACE_RE.is_match(s) {
        Ok(())
    } else {
        Err(TypesError::InvalidNamespaceId(s.to_string()))
    }
}

pub fn validate_address(s: &str) -> Result<(), TypesError> {
    if s.len() >= 26 && s.len() <= 35 && ADDRESS_RE.is_match(s) {
        Ok(())
    } else {
        Err(TypesError::InvalidAddress(s.to_string()))
    }
}

/// `FIRST_BLOCK_MAINNET <= b <= MAX_BLOCK_ID`, or `b > 0` in test mode.
pub fn validate_block_id(b: i64, test_mode: bool) -> Result<u64, TypesError> {
    if test_mode {
        if b > 0 {
            return Ok(b as u64);
        }
    } else if b >= FIRST_BLOCK_MAINNET as i64 && b <= MAX_BLOCK_ID as i64 {
        return Ok(b as u64);
    }
    Err(TypesError::InvalidName(format!("invalid block_id: {b}")))
}

pub fn validate_consensus_hash(s: &str) -> Result<Vec<u8>, TypesError> {
    Ok(atlasd_hash::parse_hex_exact(s, CONSENSUS_HASH_LEN)?)
}

pub fn validate_value_hash(s: &str) -> Result<Vec<u8>, TypesError> {
    Ok(atlasd_hash::parse_hex_exact(s, VALUE_HASH_LEN)?)
}

/// `offset`: any non-negative integer, optionally bounded by `max`.
pub fn validate_offset(offset: i64, max: Option<u64>) -> Result<u64, TypesError> {
    if offset < 0 {
        return Err(TypesError::InvalidName("offset must be non-negative".into()));
    }
    let offset = offset as u64;
    if let Some(max) = max {
        if offset > max {
            return Err(TypesError::InvalidName("offset exceeds maximum".into()));
        }
    }
    Ok(offset)
}

/// `count`: non-negative, `<= cap`.
pub fn validate_count(count: i64, cap: u32) -> Result<u32, TypesError> {
    if count < 0 || count as u64 > cap as u64 {
        return Err(TypesError::InvalidName("invalid count".into()));
    }
    Ok(count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_name() {
        assert!(validate_name("alice.id").is_ok());
    }

    #[test]
    fn rejects_name_without_namespace() {
        assert!(validate_name("alice").is_err());
    }

    #[test]
    fn block_id_outside_mainnet_range_rejected() {
        assert!(validate_block_id(100, false).is_err());
        assert!(validate_block_id(100, true).is_ok());
    }

    #[test]
    fn count_cap_enforced() {
        assert!(validate_count(10, 10).is_ok());
        assert!(validate_count(11, 10).is_err());
        assert!(validate_count(-1, 10).is_err());
    }

    #[test]
    fn value_hash_requires_exact_width() {
        let good = hex::encode([0u8; 20]);
        let bad = hex::encode([0u8; 16]);
        assert!(validate_value_hash(&good).is_ok());
        assert!(validate_value_hash(&bad).is_err());
    }
}
