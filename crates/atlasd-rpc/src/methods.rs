//! Method handlers for the RPC surface (spec §4.3). Each handler takes the
//! raw JSON-RPC params array and always returns an envelope `Value` — never
//! an `Err` for a validation failure, since "always produce an envelope" is
//! the dispatcher's contract (§7, §9).

use std::sync::Arc;

use base64::Engine;
use serde_json::{json, Value};

use atlasd_atlas::{AtlasState, HostPort};
use atlasd_db::NameDbView;
use atlasd_types::limits::{
    CONSENSUS_HASHES_BATCH_CAP, DEFAULT_PAGE_COUNT_CAP, GET_ZONEFILES_BATCH_CAP, HISTORY_COUNT_CAP,
    MAX_ATLAS_PEERS_RETURNED, MAX_ZONEFILE_INVENTORY_BITS, NAMEOPS_AT_COUNT_CAP,
    NAMESPACE_BASE_PRICE, NAMESPACE_PRICE_DECAY, PUT_ZONEFILES_BATCH_CAP,
};
use atlasd_types::validation;

use crate::types::{error_envelope, GetInfoResponse};

pub struct Context {
    pub db: NameDbView,
    pub atlas: Option<Arc<AtlasState>>,
    pub test_mode: bool,
    pub server_version: &'static str,
    pub last_block_seen: Option<u64>,
}

fn arg(params: &[Value], i: usize) -> Option<&Value> {
    params.get(i)
}

fn arg_str<'a>(params: &'a [Value], i: usize) -> Result<&'a str, Value> {
    arg(params, i)
        .and_then(Value::as_str)
        .ok_or_else(|| error_envelope("missing or non-string argument"))
}

fn arg_i64(params: &[Value], i: usize) -> Result<i64, Value> {
    arg(params, i)
        .and_then(Value::as_i64)
        .ok_or_else(|| error_envelope("missing or non-integer argument"))
}

macro_rules! unwrap_or_envelope {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(envelope) => return envelope,
        }
    };
}

pub fn ping(_ctx: &Context, _params: &[Value]) -> Value {
    json!({ "status": "alive" })
}

pub fn getinfo(ctx: &Context) -> Value {
    let lastblock = match ctx.db.lastblock() {
        Ok(b) => b,
        Err(e) => return error_envelope(e.to_string()),
    };
    let consensus_hash = ctx.db.consensus_at(lastblock).ok().flatten();
    let zonefile_count = ctx
        .atlas
        .as_ref()
        .and_then(|a| a.get_num_zonefiles().ok())
        .unwrap_or(0);
    let indexing = ctx.db.indexing_flag().unwrap_or(false);

    serde_json::to_value(GetInfoResponse {
        last_block_processed: lastblock,
        last_block_seen: ctx.last_block_seen.unwrap_or(lastblock),
        consensus_hash,
        server_version: ctx.server_version,
        zonefile_count,
        indexing,
    })
    .unwrap_or_else(|e| error_envelope(e.to_string()))
}

pub fn get_name_blockchain_record(ctx: &Context, params: &[Value]) -> Value {
    let name = unwrap_or_envelope!(arg_str(params, 0));
    if validation::validate_name(name).is_err() {
        return error_envelope("Invalid name");
    }
    match ctx.db.name_record(name) {
        Ok(Some(record)) => {
            let lastblock = ctx.db.lastblock().unwrap_or(0);
            let expired = record.expired(lastblock);
            let mut value = serde_json::to_value(&record).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = value {
                map.insert("expired".into(), json!(expired));
            }
            json!({ "record": value })
        }
        Ok(None) => error_envelope("Not found."),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_name_history_blocks(ctx: &Context, params: &[Value]) -> Value {
    let name = unwrap_or_envelope!(arg_str(params, 0));
    match ctx.db.name_history_blocks(name) {
        Ok(blocks) => json!({ "history_blocks": blocks }),
        Err(e) => error_envelope(e.to_string()),
    }
}

fn name_at(ctx: &Context, params: &[Value]) -> Value {
    let name = unwrap_or_envelope!(arg_str(params, 0));
    let block = unwrap_or_envelope!(arg_i64(params, 1));
    let block = unwrap_or_envelope!(
        validation::validate_block_id(block, ctx.test_mode).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.name_record_at(name, block) {
        Ok(Some(record)) => json!({ "records": [record] }),
        Ok(None) => json!({ "records": Value::Null }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_name_at(ctx: &Context, params: &[Value]) -> Value {
    name_at(ctx, params)
}

pub fn get_historic_name_at(ctx: &Context, params: &[Value]) -> Value {
    name_at(ctx, params)
}

pub fn get_num_nameops_at(ctx: &Context, params: &[Value]) -> Value {
    let block = unwrap_or_envelope!(arg_i64(params, 0));
    let block = unwrap_or_envelope!(
        validation::validate_block_id(block, ctx.test_mode).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.num_nameops_at(block) {
        Ok(n) => json!({ "count": n }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_nameops_at(ctx: &Context, params: &[Value]) -> Value {
    let block = unwrap_or_envelope!(arg_i64(params, 0));
    let block = unwrap_or_envelope!(
        validation::validate_block_id(block, ctx.test_mode).map_err(|e| error_envelope(e.to_string()))
    );
    let offset = unwrap_or_envelope!(arg_i64(params, 1));
    let count = unwrap_or_envelope!(arg_i64(params, 2));
    // Exact literal per the historical envelope (spec §8 S5); the general
    // validator's message text differs and must not leak here.
    if validation::validate_count(count, NAMEOPS_AT_COUNT_CAP).is_err() {
        return error_envelope("Invalid count");
    }
    if validation::validate_offset(offset, None).is_err() {
        return error_envelope("Invalid offset");
    }
    match ctx.db.nameops_at(block) {
        Ok(ops) => {
            let page: Vec<_> = ops.into_iter().skip(offset as usize).take(count as usize).collect();
            json!({ "nameops": page })
        }
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_nameops_hash_at(ctx: &Context, params: &[Value]) -> Value {
    let block = unwrap_or_envelope!(arg_i64(params, 0));
    let block = unwrap_or_envelope!(
        validation::validate_block_id(block, ctx.test_mode).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.nameops_hash_at(block) {
        Ok(hash) => json!({ "nameops_hash": hash }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_names_owned_by_address(ctx: &Context, params: &[Value]) -> Value {
    let address = unwrap_or_envelope!(arg_str(params, 0));
    if validation::validate_address(address).is_err() {
        return error_envelope("Invalid address");
    }
    match ctx.db.names_owned_by_address(address) {
        Ok(names) => json!({ "names": names }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_historic_names_by_address(ctx: &Context, params: &[Value]) -> Value {
    let address = unwrap_or_envelope!(arg_str(params, 0));
    let offset = unwrap_or_envelope!(arg_i64(params, 1));
    let count = unwrap_or_envelope!(arg_i64(params, 2));
    if validation::validate_count(count, HISTORY_COUNT_CAP).is_err() {
        return error_envelope("Invalid count");
    }
    let offset = unwrap_or_envelope!(
        validation::validate_offset(offset, None).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.historic_names_for_address(address) {
        Ok(history) => {
            let page: Vec<_> = history
                .into_iter()
                .skip(offset as usize)
                .take(count as usize)
                .collect();
            json!({ "history": page })
        }
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_num_historic_names_by_address(ctx: &Context, params: &[Value]) -> Value {
    let address = unwrap_or_envelope!(arg_str(params, 0));
    match ctx.db.historic_names_for_address(address) {
        Ok(history) => json!({ "count": history.len() }),
        Err(e) => error_envelope(e.to_string()),
    }
}

/// Registration cost: `base_price / price_decay^(len - 1)`, rounded up, per
/// the namespace's pricing curve (mirrors the original's `price_name`,
/// `int(math.ceil(ret))`).
pub fn get_name_cost(ctx: &Context, params: &[Value]) -> Value {
    let name = unwrap_or_envelope!(arg_str(params, 0));
    let Some((label, namespace_id)) = name.split_once('.') else {
        return error_envelope("Invalid name");
    };
    match ctx.db.namespace_record(namespace_id) {
        Ok(Some(ns)) => {
            let decay = ns.price_decay.max(1.0).powi((label.len().max(1) - 1) as i32);
            let cost = (ns.base_price as f64 / decay).ceil() as u64;
            json!({ "satoshis": cost })
        }
        Ok(None) => error_envelope("No such namespace"),
        Err(e) => error_envelope(e.to_string()),
    }
}

/// Namespace registration cost, rounded up, on the same decay curve as
/// `get_name_cost` but keyed on the namespace id's own length rather than a
/// registered namespace's pricing fields — a namespace that doesn't exist
/// yet still has a cost to register. If the namespace already exists, the
/// envelope additionally carries a `warning` (mirrors the original's
/// `rpc_get_namespace_cost`, which always prices the namespace and only
/// adds `warning` when `get_namespace` finds one).
pub fn get_namespace_cost(ctx: &Context, params: &[Value]) -> Value {
    let namespace_id = unwrap_or_envelope!(arg_str(params, 0));
    let decay = NAMESPACE_PRICE_DECAY.max(1.0).powi((namespace_id.len().max(1) - 1) as i32);
    let cost = (NAMESPACE_BASE_PRICE as f64 / decay).ceil() as u64;
    match ctx.db.namespace_record(namespace_id) {
        Ok(Some(_)) => json!({ "satoshis": cost, "warning": "Namespace already exists" }),
        Ok(None) => json!({ "satoshis": cost }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_namespace_blockchain_record(ctx: &Context, params: &[Value]) -> Value {
    let namespace_id = unwrap_or_envelope!(arg_str(params, 0));
    match ctx.db.namespace_record(namespace_id) {
        Ok(Some(record)) => json!({ "record": record }),
        Ok(None) => error_envelope("Unknown/invalid namespace"),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_num_names(ctx: &Context, _params: &[Value]) -> Value {
    match ctx.db.num_names() {
        Ok(n) => json!({ "count": n }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_num_names_cumulative(ctx: &Context, _params: &[Value]) -> Value {
    match ctx.db.num_names_cumulative() {
        Ok(n) => json!({ "count": n }),
        Err(e) => error_envelope(e.to_string()),
    }
}

fn paged_names(
    ctx: &Context,
    params: &[Value],
    fetch: impl Fn(&NameDbView, u64, u32) -> atlasd_db::Result<Vec<String>>,
) -> Value {
    let offset = unwrap_or_envelope!(arg_i64(params, 0));
    let count = unwrap_or_envelope!(arg_i64(params, 1));
    if validation::validate_count(count, DEFAULT_PAGE_COUNT_CAP).is_err() {
        return error_envelope("Invalid count");
    }
    let offset = unwrap_or_envelope!(
        validation::validate_offset(offset, None).map_err(|e| error_envelope(e.to_string()))
    );
    match fetch(&ctx.db, offset, count as u32) {
        Ok(names) => json!({ "names": names }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_all_names(ctx: &Context, params: &[Value]) -> Value {
    paged_names(ctx, params, |db, o, c| db.all_names(o, c))
}

pub fn get_all_names_cumulative(ctx: &Context, params: &[Value]) -> Value {
    paged_names(ctx, params, |db, o, c| db.all_names_cumulative(o, c))
}

pub fn get_all_namespaces(ctx: &Context, _params: &[Value]) -> Value {
    match ctx.db.all_namespaces() {
        Ok(namespaces) => {
            let ids: Vec<_> = namespaces.into_iter().map(|n| n.namespace_id).collect();
            json!({ "namespaces": ids })
        }
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_num_names_in_namespace(ctx: &Context, params: &[Value]) -> Value {
    let namespace_id = unwrap_or_envelope!(arg_str(params, 0));
    match ctx.db.names_in_namespace(namespace_id) {
        Ok(names) => json!({ "count": names.len() }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_names_in_namespace(ctx: &Context, params: &[Value]) -> Value {
    let namespace_id = unwrap_or_envelope!(arg_str(params, 0));
    let offset = unwrap_or_envelope!(arg_i64(params, 1));
    let count = unwrap_or_envelope!(arg_i64(params, 2));
    if validation::validate_count(count, DEFAULT_PAGE_COUNT_CAP).is_err() {
        return error_envelope("Invalid count");
    }
    let offset = unwrap_or_envelope!(
        validation::validate_offset(offset, None).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.names_in_namespace(namespace_id) {
        Ok(names) => {
            let page = NameDbView::page(&names, offset, count as u32);
            json!({ "names": page })
        }
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_consensus_at(ctx: &Context, params: &[Value]) -> Value {
    let block = unwrap_or_envelope!(arg_i64(params, 0));
    let block = unwrap_or_envelope!(
        validation::validate_block_id(block, ctx.test_mode).map_err(|e| error_envelope(e.to_string()))
    );
    match ctx.db.consensus_at(block) {
        Ok(hash) => json!({ "consensus_hash": hash }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_consensus_hashes(ctx: &Context, params: &[Value]) -> Value {
    let Some(blocks) = arg(params, 0).and_then(Value::as_array) else {
        return error_envelope("missing or non-array argument");
    };
    if blocks.len() > CONSENSUS_HASHES_BATCH_CAP {
        return error_envelope("Invalid count");
    }
    let mut out = serde_json::Map::new();
    for b in blocks {
        let Some(block) = b.as_u64() else {
            return error_envelope("invalid block in batch");
        };
        let hash = ctx.db.consensus_at(block).unwrap_or(None);
        out.insert(block.to_string(), hash.map(Value::String).unwrap_or(Value::Null));
    }
    Value::Object(out)
}

pub fn get_block_from_consensus(ctx: &Context, params: &[Value]) -> Value {
    let hash = unwrap_or_envelope!(arg_str(params, 0));
    if validation::validate_consensus_hash(hash).is_err() {
        return error_envelope("Invalid consensus hash");
    }
    match ctx.db.block_from_consensus(hash) {
        Ok(block) => json!({ "block_id": block }),
        Err(e) => error_envelope(e.to_string()),
    }
}

pub fn get_zonefiles(ctx: &Context, params: &[Value]) -> Value {
    let Some(hashes) = arg(params, 0).and_then(Value::as_array) else {
        return error_envelope("missing or non-array argument");
    };
    if hashes.len() > GET_ZONEFILES_BATCH_CAP {
        return error_envelope("Invalid count");
    }
    let Some(atlas) = &ctx.atlas else {
        return error_envelope("No data");
    };
    let mut zonefiles = serde_json::Map::new();
    for h in hashes {
        let Some(hash_hex) = h.as_str() else {
            return error_envelope("invalid hash in batch");
        };
        if let Ok(Some(bytes)) = atlas.zonefile(hash_hex) {
            let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
            zonefiles.insert(hash_hex.to_string(), Value::String(b64));
        }
    }
    json!({ "zonefiles": zonefiles })
}

/// P2: a blob is only saved if its hash has at least one on-chain txid
/// commitment (invariant I2).
pub fn put_zonefiles(ctx: &Context, params: &[Value]) -> Value {
    let Some(blobs) = arg(params, 0).and_then(Value::as_array) else {
        return error_envelope("missing or non-array argument");
    };
    if blobs.len() > PUT_ZONEFILES_BATCH_CAP {
        return error_envelope("Invalid count");
    }
    let Some(atlas) = &ctx.atlas else {
        return error_envelope("No data");
    };
    let mut saved = Vec::with_capacity(blobs.len());
    for b in blobs {
        let ok = (|| -> Option<bool> {
            let b64 = b.as_str()?;
            let bytes = base64::engine::general_purpose::STANDARD.decode(b64).ok()?;
            let hash_hex = hex::encode(atlasd_hash::truncated_sha256(
                &bytes,
                atlasd_types::limits::VALUE_HASH_LEN,
            ));
            if ctx.db.has_zonefile_commitment(&hash_hex).unwrap_or(false) {
                atlas.store_zonefile(&hash_hex, &bytes).ok()?;
                Some(true)
            } else {
                Some(false)
            }
        })()
        .unwrap_or(false);
        saved.push(if ok { 1 } else { 0 });
    }
    json!({ "saved": saved })
}

pub fn get_zonefiles_by_block(ctx: &Context, params: &[Value]) -> Value {
    let from_block = unwrap_or_envelope!(arg_i64(params, 0));
    let to_block = unwrap_or_envelope!(arg_i64(params, 1));
    if from_block < 0 || to_block < from_block {
        return error_envelope("Invalid block range");
    }
    let mut hashes = Vec::new();
    for block in from_block as u64..=to_block as u64 {
        if let Ok(ops) = ctx.db.nameops_at(block) {
            hashes.extend(ops.into_iter().filter_map(|op| op.value_hash));
        }
    }
    json!({ "zonefile_hashes": hashes })
}

/// Selection described in §4.5: live neighbors relative to the caller,
/// shuffled and truncated if they exceed `max_neighbors()`, caller always
/// enqueued first.
pub fn get_atlas_peers(ctx: &Context, params: &[Value]) -> Value {
    let Some(atlas) = &ctx.atlas else {
        return error_envelope("Not an atlas node");
    };
    let caller = unwrap_or_envelope!(arg_str(params, 0));
    let caller = match HostPort::parse(caller) {
        Ok(hp) => hp,
        Err(e) => return error_envelope(e.to_string()),
    };
    let mut peers = atlas.get_atlas_peers(caller);
    peers.truncate(MAX_ATLAS_PEERS_RETURNED);
    json!({ "peers": peers.iter().map(|p| p.to_string()).collect::<Vec<_>>() })
}

pub fn get_zonefile_inventory(ctx: &Context, params: &[Value]) -> Value {
    let Some(atlas) = &ctx.atlas else {
        return error_envelope("Not an atlas node");
    };
    let offset = unwrap_or_envelope!(arg_i64(params, 0));
    let length = unwrap_or_envelope!(arg_i64(params, 1));
    if offset < 0 || length < 0 || length as usize > MAX_ZONEFILE_INVENTORY_BITS {
        return error_envelope("Invalid inventory range");
    }
    let bytes = atlas.get_zonefile_inventory(offset as u64, length as u64);
    json!({ "inv": base64::engine::general_purpose::STANDARD.encode(bytes) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlasd_db::NameDb;

    fn test_ctx() -> (Context, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = NameDb::open(dir.path()).unwrap();
        let ctx = Context {
            db: db.view(),
            atlas: None,
            test_mode: true,
            server_version: "test",
            last_block_seen: None,
        };
        (ctx, dir)
    }

    #[test]
    fn ping_returns_alive() {
        let (ctx, _dir) = test_ctx();
        assert_eq!(ping(&ctx, &[]), json!({ "status": "alive" }));
    }

    #[test]
    fn get_nameops_at_rejects_count_above_cap() {
        let (ctx, _dir) = test_ctx();
        let result = get_nameops_at(&ctx, &[json!(450), json!(0), json!(11)]);
        assert_eq!(result, json!({ "error": "Invalid count" }));
    }

    #[test]
    fn get_name_blockchain_record_not_found() {
        let (ctx, _dir) = test_ctx();
        let result = get_name_blockchain_record(&ctx, &[json!("nobody.id")]);
        assert_eq!(result, json!({ "error": "Not found." }));
    }

    #[test]
    fn get_consensus_hashes_mixes_known_and_unknown() {
        let (ctx, _dir) = test_ctx();
        let result = get_consensus_hashes(&ctx, &[json!([100, 200])]);
        assert_eq!(result["100"], Value::Null);
        assert_eq!(result["200"], Value::Null);
    }

    #[test]
    fn get_atlas_peers_errors_when_atlas_disabled() {
        let (ctx, _dir) = test_ctx();
        let result = get_atlas_peers(&ctx, &[json!("1.2.3.4:80")]);
        assert_eq!(result, json!({ "error": "Not an atlas node" }));
    }
}
