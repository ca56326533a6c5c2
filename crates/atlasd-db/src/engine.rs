//! RocksDB-backed Name DB.
//!
//! One column family per logical index, written atomically via
//! `WriteBatch`, looked up directly by key. The indexing supervisor is the
//! sole writer (§5); RPC handlers only read, through [`NameDbView`], a thin
//! read-only facade opened fresh per call.

use std::path::Path;
use std::sync::Arc;

use atlasd_types::record::{NameRecord, NamespaceRecord};
use atlasd_types::Opcode;
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

const CF_META: &str = "meta";
const CF_NAMES: &str = "names";
const CF_NAME_HISTORY: &str = "name_history";
const CF_OWNER_NAMES: &str = "owner_names";
const CF_OWNER_HISTORY: &str = "owner_history";
const CF_NAMESPACES: &str = "namespaces";
const CF_NAMEOPS_AT: &str = "nameops_at";
const CF_CONSENSUS_BY_BLOCK: &str = "consensus_by_block";
const CF_BLOCK_BY_CONSENSUS: &str = "block_by_consensus";
const CF_ZONEFILE_TXIDS: &str = "zonefile_txids";
const CF_NAME_ORDER: &str = "name_order";
const CF_NAME_ORDER_CUMULATIVE: &str = "name_order_cumulative";
const CF_NS_ORDER: &str = "namespace_order";

const KEY_LASTBLOCK: &[u8] = b"lastblock";
const KEY_INDEXING_FLAG: &[u8] = b"indexing_flag";
const KEY_NEXT_NAME_IDX: &[u8] = b"next_name_idx";
const KEY_NEXT_NAME_IDX_CUMULATIVE: &[u8] = b"next_name_idx_cumulative";
const KEY_NEXT_NS_IDX: &[u8] = b"next_ns_idx";

/// A single operation applied at a block, as surfaced by `get_nameops_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOpEntry {
    pub name: String,
    pub opcode: Opcode,
    pub block: u64,
    pub txid: String,
    pub address: String,
    pub value_hash: Option<String>,
}

fn all_cfs() -> Vec<ColumnFamilyDescriptor> {
    [
        CF_META,
        CF_NAMES,
        CF_NAME_HISTORY,
        CF_OWNER_NAMES,
        CF_OWNER_HISTORY,
        CF_NAMESPACES,
        CF_NAMEOPS_AT,
        CF_CONSENSUS_BY_BLOCK,
        CF_BLOCK_BY_CONSENSUS,
        CF_ZONEFILE_TXIDS,
        CF_NAME_ORDER,
        CF_NAME_ORDER_CUMULATIVE,
        CF_NS_ORDER,
    ]
    .iter()
    .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
    .collect()
}

/// The Name DB, opened once by the indexing supervisor for the process
/// lifetime and shared (read-only) with RPC handlers via [`NameDbView`].
pub struct NameDb {
    db: Arc<DB>,
}

fn be(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

impl NameDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let db = DB::open_cf_descriptors(&opts, path, all_cfs())?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn view(&self) -> NameDbView {
        NameDbView { db: self.db.clone() }
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or(DbError::MissingColumnFamily(name))
    }

    pub fn lastblock(&self) -> Result<u64> {
        self.view().lastblock()
    }

    pub fn set_lastblock(&self, block: u64) -> Result<()> {
        let cf = self.cf(CF_META)?;
        self.db.put_cf(cf, KEY_LASTBLOCK, be(block))?;
        Ok(())
    }

    pub fn set_indexing_flag(&self, indexing: bool) -> Result<()> {
        let cf = self.cf(CF_META)?;
        self.db.put_cf(cf, KEY_INDEXING_FLAG, [indexing as u8])?;
        Ok(())
    }

    /// Record one applied name operation: upserts the current record,
    /// appends to per-name history, updates the owner index, appends to
    /// the per-block op log, and (for register/import) assigns a stable
    /// pagination index.
    pub fn apply_name_op(&self, op: NameOpEntry, record: NameRecord) -> Result<()> {
        let mut batch = WriteBatch::default();

        let name_key = record.name.as_bytes();
        batch.put_cf(self.cf(CF_NAMES)?, name_key, bincode::serialize(&record)?);

        let mut hist_key = name_key.to_vec();
        hist_key.extend_from_slice(&be(op.block));
        batch.put_cf(self.cf(CF_NAME_HISTORY)?, &hist_key, bincode::serialize(&record)?);

        let mut owned = self.names_owned_by_address(&record.address).unwrap_or_default();
        if !owned.contains(&record.name) {
            owned.push(record.name.clone());
            batch.put_cf(
                self.cf(CF_OWNER_NAMES)?,
                record.address.as_bytes(),
                bincode::serialize(&owned)?,
            );
        }
        let mut owner_hist = self.historic_names_for_address(&record.address).unwrap_or_default();
        owner_hist.push((op.block, record.name.clone()));
        batch.put_cf(
            self.cf(CF_OWNER_HISTORY)?,
            record.address.as_bytes(),
            bincode::serialize(&owner_hist)?,
        );

        let mut ops_at_block = self.nameops_at(op.block).unwrap_or_default();
        ops_at_block.push(op.clone());
        batch.put_cf(
            self.cf(CF_NAMEOPS_AT)?,
            be(op.block),
            bincode::serialize(&ops_at_block)?,
        );

        if op.opcode.creates_name() {
            let next = self.next_counter(KEY_NEXT_NAME_IDX)?;
            batch.put_cf(self.cf(CF_NAME_ORDER)?, be(next), name_key);
            batch.put_cf(self.cf(CF_META)?, KEY_NEXT_NAME_IDX, be(next + 1));
        }
        let next_cumulative = self.next_counter(KEY_NEXT_NAME_IDX_CUMULATIVE)?;
        batch.put_cf(self.cf(CF_NAME_ORDER_CUMULATIVE)?, be(next_cumulative), name_key);
        batch.put_cf(
            self.cf(CF_META)?,
            KEY_NEXT_NAME_IDX_CUMULATIVE,
            be(next_cumulative + 1),
        );

        if let Some(vh) = &op.value_hash {
            let mut txids = self.zonefile_txids(vh).unwrap_or_default();
            txids.push(op.txid.clone());
            batch.put_cf(self.cf(CF_ZONEFILE_TXIDS)?, vh.as_bytes(), bincode::serialize(&txids)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    pub fn upsert_namespace(&self, ns: NamespaceRecord) -> Result<()> {
        let is_new = self.view().namespace_record(&ns.namespace_id)?.is_none();
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_NAMESPACES)?, ns.namespace_id.as_bytes(), bincode::serialize(&ns)?);
        if is_new {
            let next = self.next_counter(KEY_NEXT_NS_IDX)?;
            batch.put_cf(self.cf(CF_NS_ORDER)?, be(next), ns.namespace_id.as_bytes());
            batch.put_cf(self.cf(CF_META)?, KEY_NEXT_NS_IDX, be(next + 1));
        }
        self.db.write(batch)?;
        Ok(())
    }

    pub fn set_consensus_hash(&self, block: u64, hash_hex: &str) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_CONSENSUS_BY_BLOCK)?, be(block), hash_hex.as_bytes());
        batch.put_cf(self.cf(CF_BLOCK_BY_CONSENSUS)?, hash_hex.as_bytes(), be(block));
        self.db.write(batch)?;
        Ok(())
    }

    fn next_counter(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        Ok(match self.db.get_cf(cf, key)? {
            Some(v) => u64::from_be_bytes(v.as_slice().try_into().unwrap_or([0; 8])),
            None => 0,
        })
    }

    // Read helpers delegate to the view so writer and reader share one
    // implementation; the writer simply also holds the `Arc<DB>` directly.
    pub fn names_owned_by_address(&self, addr: &str) -> Result<Vec<String>> {
        self.view().names_owned_by_address(addr)
    }

    pub fn historic_names_for_address(&self, addr: &str) -> Result<Vec<(u64, String)>> {
        self.view().historic_names_for_address(addr)
    }

    pub fn nameops_at(&self, block: u64) -> Result<Vec<NameOpEntry>> {
        self.view().nameops_at(block)
    }

    pub fn zonefile_txids(&self, value_hash: &str) -> Result<Vec<String>> {
        self.view().zonefile_txids(value_hash)
    }
}

/// Read-only handle to the Name DB. RPC handlers construct one at request
/// entry and drop it before reply (§4.3) — dropping is free since the
/// underlying `Arc<DB>` is shared, not reopened, but the type still models
/// the request-scoped lifetime §9 calls for.
#[derive(Clone)]
pub struct NameDbView {
    db: Arc<DB>,
}

impl NameDbView {
    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or(DbError::MissingColumnFamily(name))
    }

    fn get_bincode<T: for<'a> Deserialize<'a>>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn lastblock(&self) -> Result<u64> {
        match self.db.get_cf(self.cf(CF_META)?, KEY_LASTBLOCK)? {
            Some(v) => Ok(u64::from_be_bytes(v.as_slice().try_into().unwrap_or([0; 8]))),
            None => Ok(0),
        }
    }

    pub fn indexing_flag(&self) -> Result<bool> {
        match self.db.get_cf(self.cf(CF_META)?, KEY_INDEXING_FLAG)? {
            Some(v) => Ok(v.first().copied().unwrap_or(0) != 0),
            None => Ok(false),
        }
    }

    pub fn name_record(&self, name: &str) -> Result<Option<NameRecord>> {
        self.get_bincode(CF_NAMES, name.as_bytes())
    }

    /// Value at or before `block`, for `get_name_at` / `get_historic_name_at`.
    pub fn name_record_at(&self, name: &str, block: u64) -> Result<Option<NameRecord>> {
        let cf = self.cf(CF_NAME_HISTORY)?;
        let mut upper = name.as_bytes().to_vec();
        upper.extend_from_slice(&be(block));
        let mut iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(&upper, rocksdb::Direction::Reverse),
        );
        if let Some(Ok((k, v))) = iter.next() {
            if k.starts_with(name.as_bytes()) {
                return Ok(Some(bincode::deserialize(&v)?));
            }
        }
        Ok(None)
    }

    pub fn name_history_blocks(&self, name: &str) -> Result<Vec<u64>> {
        let cf = self.cf(CF_NAME_HISTORY)?;
        let prefix = name.as_bytes().to_vec();
        let mut blocks = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (k, _) = item?;
            if k.len() == prefix.len() + 8 && k.starts_with(&prefix) {
                let block = u64::from_be_bytes(k[prefix.len()..].try_into().unwrap());
                blocks.push(block);
            }
        }
        blocks.sort_unstable();
        Ok(blocks)
    }

    pub fn names_owned_by_address(&self, addr: &str) -> Result<Vec<String>> {
        Ok(self.get_bincode(CF_OWNER_NAMES, addr.as_bytes())?.unwrap_or_default())
    }

    pub fn historic_names_for_address(&self, addr: &str) -> Result<Vec<(u64, String)>> {
        Ok(self.get_bincode(CF_OWNER_HISTORY, addr.as_bytes())?.unwrap_or_default())
    }

    pub fn namespace_record(&self, namespace_id: &str) -> Result<Option<NamespaceRecord>> {
        self.get_bincode(CF_NAMESPACES, namespace_id.as_bytes())
    }

    pub fn all_namespaces(&self) -> Result<Vec<NamespaceRecord>> {
        let cf = self.cf(CF_NS_ORDER)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, v) = item?;
            let ns_id = String::from_utf8_lossy(&v).to_string();
            if let Some(rec) = self.namespace_record(&ns_id)? {
                out.push(rec);
            }
        }
        Ok(out)
    }

    pub fn names_in_namespace(&self, namespace_id: &str) -> Result<Vec<String>> {
        let suffix = format!(".{namespace_id}");
        Ok(self
            .all_names_ordered(CF_NAME_ORDER)?
            .into_iter()
            .filter(|n| n.ends_with(&suffix))
            .collect())
    }

    fn all_names_ordered(&self, cf_name: &'static str) -> Result<Vec<String>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, v) = item?;
            out.push(String::from_utf8_lossy(&v).to_string());
        }
        Ok(out)
    }

    /// Order-stable page: concatenating pages of a fixed cap reproduces the
    /// full enumeration (property P5).
    pub fn page(names: &[String], offset: u64, count: u32) -> Vec<String> {
        names
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect()
    }

    pub fn num_names(&self) -> Result<u64> {
        Ok(self.all_names_ordered(CF_NAME_ORDER)?.len() as u64)
    }

    pub fn num_names_cumulative(&self) -> Result<u64> {
        Ok(self.all_names_ordered(CF_NAME_ORDER_CUMULATIVE)?.len() as u64)
    }

    pub fn all_names(&self, offset: u64, count: u32) -> Result<Vec<String>> {
        Ok(Self::page(&self.all_names_ordered(CF_NAME_ORDER)?, offset, count))
    }

    pub fn all_names_cumulative(&self, offset: u64, count: u32) -> Result<Vec<String>> {
        Ok(Self::page(&self.all_names_ordered(CF_NAME_ORDER_CUMULATIVE)?, offset, count))
    }

    pub fn consensus_at(&self, block: u64) -> Result<Option<String>> {
        match self.db.get_cf(self.cf(CF_CONSENSUS_BY_BLOCK)?, be(block))? {
            Some(v) => Ok(Some(String::from_utf8_lossy(&v).to_string())),
            None => Ok(None),
        }
    }

    pub fn block_from_consensus(&self, hash_hex: &str) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(CF_BLOCK_BY_CONSENSUS)?, hash_hex.as_bytes())? {
            Some(v) => Ok(Some(u64::from_be_bytes(v.as_slice().try_into().unwrap()))),
            None => Ok(None),
        }
    }

    pub fn nameops_at(&self, block: u64) -> Result<Vec<NameOpEntry>> {
        Ok(self.get_bincode(CF_NAMEOPS_AT, &be(block))?.unwrap_or_default())
    }

    pub fn num_nameops_at(&self, block: u64) -> Result<u64> {
        Ok(self.nameops_at(block)?.len() as u64)
    }

    /// SNV digest: sha256 over the bincode encoding of the per-block op log,
    /// letting SNV clients verify history without the full DB (§GLOSSARY).
    pub fn nameops_hash_at(&self, block: u64) -> Result<String> {
        let ops = self.nameops_at(block)?;
        let bytes = bincode::serialize(&ops)?;
        Ok(hex::encode(atlasd_hash::sha256(&bytes)))
    }

    pub fn zonefile_txids(&self, value_hash: &str) -> Result<Vec<String>> {
        Ok(self.get_bincode(CF_ZONEFILE_TXIDS, value_hash.as_bytes())?.unwrap_or_default())
    }

    /// Invariant I2's on-chain-commitment check.
    pub fn has_zonefile_commitment(&self, value_hash: &str) -> Result<bool> {
        Ok(!self.zonefile_txids(value_hash)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlasd_types::record::NamespaceLifecycle;

    fn open_tmp() -> (NameDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (NameDb::open(dir.path()).unwrap(), dir)
    }

    fn sample_record(expire: i64, deadline: i64) -> NameRecord {
        NameRecord {
            name: "alice.id".into(),
            address: "1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            last_modified_block: 500,
            opcode: Opcode::NameRegistration,
            expire_block: expire,
            renewal_deadline: deadline,
        }
    }

    #[test]
    fn lastblock_starts_at_zero_and_persists() {
        let (db, _dir) = open_tmp();
        assert_eq!(db.lastblock().unwrap(), 0);
        db.set_lastblock(42).unwrap();
        assert_eq!(db.lastblock().unwrap(), 42);
    }

    #[test]
    fn apply_name_op_indexes_name_owner_and_history() {
        let (db, _dir) = open_tmp();
        let rec = sample_record(52560 + 500, 52560 + 500);
        let op = NameOpEntry {
            name: rec.name.clone(),
            opcode: rec.opcode,
            block: 500,
            txid: "deadbeef".into(),
            address: rec.address.clone(),
            value_hash: None,
        };
        db.apply_name_op(op, rec.clone()).unwrap();

        let view = db.view();
        assert_eq!(view.name_record("alice.id").unwrap().unwrap(), rec);
        assert_eq!(view.names_owned_by_address(&rec.address).unwrap(), vec!["alice.id"]);
        assert_eq!(view.name_history_blocks("alice.id").unwrap(), vec![500]);
        assert_eq!(view.num_names().unwrap(), 1);
    }

    #[test]
    fn consensus_hash_roundtrips_both_directions() {
        let (db, _dir) = open_tmp();
        db.set_consensus_hash(100, "aabbccdd").unwrap();
        let view = db.view();
        assert_eq!(view.consensus_at(100).unwrap().as_deref(), Some("aabbccdd"));
        assert_eq!(view.block_from_consensus("aabbccdd").unwrap(), Some(100));
        assert_eq!(view.consensus_at(200).unwrap(), None);
    }

    #[test]
    fn zonefile_commitment_requires_on_chain_txid() {
        let (db, _dir) = open_tmp();
        let view = db.view();
        assert!(!view.has_zonefile_commitment("deadbeef").unwrap());

        let rec = sample_record(-1, -1);
        let op = NameOpEntry {
            name: rec.name.clone(),
            opcode: Opcode::NameUpdate,
            block: 501,
            txid: "txid1".into(),
            address: rec.address.clone(),
            value_hash: Some("deadbeef".into()),
        };
        db.apply_name_op(op, rec).unwrap();
        assert!(db.view().has_zonefile_commitment("deadbeef").unwrap());
    }

    #[test]
    fn pagination_is_order_stable_and_partitions_full_result() {
        let (db, _dir) = open_tmp();
        for i in 0..5u64 {
            let rec = NameRecord {
                name: format!("user{i}.id"),
                address: "1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
                last_modified_block: i,
                opcode: Opcode::NameRegistration,
                expire_block: -1,
                renewal_deadline: -1,
            };
            let op = NameOpEntry {
                name: rec.name.clone(),
                opcode: rec.opcode,
                block: i,
                txid: format!("tx{i}"),
                address: rec.address.clone(),
                value_hash: None,
            };
            db.apply_name_op(op, rec).unwrap();
        }
        let view = db.view();
        let full = view.all_names(0, 100).unwrap();
        let mut paged = Vec::new();
        for offset in (0..5).step_by(2) {
            paged.extend(view.all_names(offset, 2).unwrap());
        }
        assert_eq!(full, paged);
    }

    #[test]
    fn namespace_upsert_indexes_once() {
        let (db, _dir) = open_tmp();
        let ns = NamespaceRecord {
            namespace_id: "id".into(),
            lifecycle: NamespaceLifecycle::Blocks(52560),
            base_price: 100,
            price_decay: 1.0,
            ready: true,
            revealed_at_block: 10,
        };
        db.upsert_namespace(ns.clone()).unwrap();
        db.upsert_namespace(ns.clone()).unwrap();
        assert_eq!(db.view().all_namespaces().unwrap().len(), 1);
    }
}
