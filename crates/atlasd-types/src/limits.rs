//! Fixed-width and size constants defined by the naming protocol.
//!
//! Values carried over from the original implementation
//! (`blockstack/blockstackd.py`, `lib/config.py`'s `LENGTHS` table) where
//! the distilled spec only said "hex string of exact length 2*L".

/// Width in bytes of a consensus hash. Hex-encoded this is 32 characters.
pub const CONSENSUS_HASH_LEN: usize = 16;

/// Width in bytes of a zone-file value hash. Hex-encoded this is 40 characters.
pub const VALUE_HASH_LEN: usize = 20;

/// Maximum size in bytes of a decoded zone-file payload.
pub const RPC_MAX_ZONEFILE_LEN: usize = 40_960;

/// First block height indexed on mainnet.
pub const FIRST_BLOCK_MAINNET: u64 = 373_601;

/// Upper bound on a `block_id` argument outside test mode.
pub const MAX_BLOCK_ID: u64 = 10_000_000;

/// Sentinel expiry/renewal-deadline value meaning "namespace has infinite lifetime".
pub const INFINITE_LIFETIME: i64 = -1;

/// `get_nameops_at` count cap (the one paginated endpoint with a tighter cap, §4.3/§9).
pub const NAMEOPS_AT_COUNT_CAP: u32 = 10;

/// Default cap for most paginated endpoints (`get_all_names`, `get_names_in_namespace`, ...).
pub const DEFAULT_PAGE_COUNT_CAP: u32 = 100;

/// Cap on `get_historic_names_by_address` / similar by-address history endpoints.
pub const HISTORY_COUNT_CAP: u32 = 10;

/// Cap on `get_consensus_hashes` batch size.
pub const CONSENSUS_HASHES_BATCH_CAP: usize = 32;

/// Cap on `get_zonefiles` batch size.
pub const GET_ZONEFILES_BATCH_CAP: usize = 100;

/// Cap on `put_zonefiles` batch size.
pub const PUT_ZONEFILES_BATCH_CAP: usize = 5;

/// Cap on `get_atlas_peers` returned neighbor count.
pub const MAX_ATLAS_PEERS_RETURNED: usize = 100;

/// Cap on `get_zonefile_inventory` bit-length argument.
pub const MAX_ZONEFILE_INVENTORY_BITS: usize = 524_288;

/// Hard request body cap enforced at admission (§4.3, §6).
pub const RPC_MAX_REQUEST_SIZE: usize = 512 * 1024;

/// Base cost in satoshis of registering a 1-character namespace. Namespace
/// cost decays with the namespace id's own length on the same curve a
/// name's registration cost decays with its label length (§4.3).
pub const NAMESPACE_BASE_PRICE: u64 = 40_000_000_000;

/// Per-character price decay multiplier for namespace registration cost.
pub const NAMESPACE_PRICE_DECAY: f64 = 4.0;
