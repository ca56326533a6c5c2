use serde::{Deserialize, Serialize};

use crate::limits::INFINITE_LIFETIME;
use crate::opcode::Opcode;

/// Lifetime of a namespace: either a fixed number of blocks, or infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceLifecycle {
    Blocks(u64),
    Infinite,
}

/// A name record, identified by its fully-qualified name `<label>.<namespace_id>`.
///
/// `expired` is never stored — it is a pure function of `renewal_deadline`
/// and the caller-supplied `lastblock` (invariant I1), computed by
/// [`NameRecord::expired`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub name: String,
    pub address: String,
    pub last_modified_block: u64,
    pub opcode: Opcode,
    /// `-1` if the owning namespace has infinite lifetime.
    pub expire_block: i64,
    /// `-1` if the owning namespace has infinite lifetime.
    pub renewal_deadline: i64,
}

impl NameRecord {
    /// Invariant I1: `expired == (renewal_deadline > 0 && renewal_deadline <= lastblock)`.
    pub fn expired(&self, lastblock: u64) -> bool {
        self.renewal_deadline > 0 && (self.renewal_deadline as u64) <= lastblock
    }

    pub fn has_infinite_lifetime(&self) -> bool {
        self.expire_block == INFINITE_LIFETIME && self.renewal_deadline == INFINITE_LIFETIME
    }
}

/// A namespace record, identified by `namespace_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub namespace_id: String,
    pub lifecycle: NamespaceLifecycle,
    /// Base price in satoshis for a name of length 1 in this namespace.
    pub base_price: u64,
    /// Price multiplier per additional character.
    pub price_decay: f64,
    /// True once the namespace has passed through preorder -> reveal -> ready.
    pub ready: bool,
    pub revealed_at_block: u64,
}

/// A zone-file entry, keyed by its content hash (hex, [`crate::limits::VALUE_HASH_LEN`] bytes).
///
/// The payload itself is opaque; only the hash participates in protocol
/// logic (invariant I2: a blob may only be stored if the Name DB records
/// at least one on-chain commitment to `hash(blob)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonefileEntry {
    pub value_hash: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(expire_block: i64, renewal_deadline: i64) -> NameRecord {
        NameRecord {
            name: "alice.id".into(),
            address: "1AAAA".into(),
            last_modified_block: 500,
            opcode: Opcode::NameRegistration,
            expire_block,
            renewal_deadline,
        }
    }

    #[test]
    fn expired_is_pure_function_of_deadline_and_lastblock() {
        let r = make_record(52560 + 500, 52560 + 500);
        assert!(!r.expired(600));
        assert!(r.expired(52560 + 500));
        assert!(r.expired(52560 + 600));
    }

    #[test]
    fn infinite_lifetime_never_expires() {
        let r = make_record(-1, -1);
        assert!(!r.expired(10_000_000));
        assert!(r.has_infinite_lifetime());
    }
}
