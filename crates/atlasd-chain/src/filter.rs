//! The Transaction Filter (§4.1): a pure, side-effect-free predicate.
//!
//! Accept iff the transaction carries a non-null `nulldata` field whose raw
//! bytes, after hex decoding, begin with the ASCII bytes `id`. No other
//! criteria — this is intentionally the entire rule.

use crate::adapter::RawTransaction;

pub const PROTOCOL_TAG: &[u8] = b"id";

pub fn accept(tx: &RawTransaction) -> bool {
    let Some(hex_payload) = &tx.nulldata else {
        return false;
    };
    match hex::decode(hex_payload) {
        Ok(bytes) => bytes.starts_with(PROTOCOL_TAG),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(nulldata: Option<&str>) -> RawTransaction {
        RawTransaction {
            txid: "deadbeef".into(),
            block_height: 1,
            sender_address: "1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            nulldata: nulldata.map(str::to_string),
        }
    }

    #[test]
    fn accepts_tagged_payload() {
        let tagged = hex::encode(b"id:register:alice.id");
        assert!(accept(&tx(Some(&tagged))));
    }

    #[test]
    fn rejects_missing_nulldata() {
        assert!(!accept(&tx(None)));
    }

    #[test]
    fn rejects_untagged_payload() {
        let untagged = hex::encode(b"not-the-tag");
        assert!(!accept(&tx(Some(&untagged))));
    }

    #[test]
    fn rejects_invalid_hex() {
        assert!(!accept(&tx(Some("not-hex-zz"))));
    }
}
