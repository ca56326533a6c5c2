//! Response envelope shapes. Every RPC method returns a JSON object; on
//! failure the object carries `error` (and, for unexpected exceptions,
//! `traceback`) instead of the method's normal fields (spec §7).

use serde::Serialize;
use serde_json::{json, Value};

use atlasd_db::NameOpEntry;
use atlasd_types::{NameRecord, NamespaceRecord};

pub fn error_envelope(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

pub fn internal_error_envelope(message: impl Into<String>, traceback: Vec<String>) -> Value {
    json!({ "error": message.into(), "traceback": traceback })
}

#[derive(Serialize)]
pub struct GetInfoResponse {
    pub last_block_processed: u64,
    pub last_block_seen: u64,
    pub consensus_hash: Option<String>,
    pub server_version: &'static str,
    pub zonefile_count: u64,
    pub indexing: bool,
}

/// `get_name_at` / `get_historic_name_at` wrap results under `records`
/// (plural) per the historical envelope shape (spec §9 Open Question).
#[derive(Serialize)]
pub struct RecordsEnvelope {
    pub records: Vec<NameRecord>,
}

pub fn name_blockchain_record_envelope(record: &NameRecord) -> Value {
    json!({ "record": record })
}

pub fn namespace_blockchain_record_envelope(record: &NamespaceRecord) -> Value {
    json!({ "record": record })
}

pub fn nameops_envelope(ops: &[NameOpEntry]) -> Value {
    json!({ "nameops": ops })
}
