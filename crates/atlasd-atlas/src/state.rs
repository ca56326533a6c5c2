//! The Atlas interface as consumed by the core (spec §4.5): a small,
//! explicit contract rather than a long-lived opaque singleton. `init`
//! builds the peer table; `start`/`stop` bracket the gossip loop; the rest
//! are read/write operations the RPC layer and indexing supervisor call
//! directly.

use std::path::PathBuf;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::hostport::HostPort;
use crate::inventory::ZonefileInventory;
use crate::peer::PeerTable;
use crate::store::ZonefileStore;
use crate::Result;

/// Returned by [`init`]; wraps the peer table the core threads through
/// `start`/`enqueue_peer`/`get_live_neighbors`.
pub struct AtlasPeerTable {
    pub(crate) table: RwLock<PeerTable>,
}

/// Returned by [`start`]; live handle for a running Atlas subsystem.
pub struct AtlasState {
    peers: RwLock<PeerTable>,
    inventory: ZonefileInventory,
    store: ZonefileStore,
    running: std::sync::atomic::AtomicBool,
}

pub const DEFAULT_MAX_NEIGHBORS: usize = 32;

/// `init(db_path, zonefile_dir, name_db, seed_peers, blacklist) -> peer_table`
pub fn init(
    _db_path: &std::path::Path,
    seed_peers: Vec<HostPort>,
    blacklist: Vec<HostPort>,
) -> AtlasPeerTable {
    AtlasPeerTable {
        table: RwLock::new(PeerTable::new(DEFAULT_MAX_NEIGHBORS, seed_peers, blacklist)),
    }
}

/// `start(hostname, port, db_path, zonefile_dir, working_dir, read_drivers, write_drivers) -> atlas_state`
pub fn start(peer_table: AtlasPeerTable, zonefile_dir: PathBuf) -> Result<AtlasState> {
    let store = ZonefileStore::open(&zonefile_dir)?;
    let inventory = ZonefileInventory::new();
    Ok(AtlasState {
        peers: peer_table.table,
        inventory,
        store,
        running: std::sync::atomic::AtomicBool::new(true),
    })
}

/// `stop(atlas_state)`
pub fn stop(state: &AtlasState) {
    state.running.store(false, std::sync::atomic::Ordering::SeqCst);
}

impl AtlasState {
    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// `get_num_zonefiles()`
    pub fn get_num_zonefiles(&self) -> Result<u64> {
        self.store.count()
    }

    /// `max_neighbors()`
    pub fn max_neighbors(&self) -> usize {
        self.peers.read().max_neighbors()
    }

    /// Current peer table size, for health reporting.
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Picks one known peer at random, for the gossip round to poll next.
    pub fn random_gossip_peer(&self) -> Option<HostPort> {
        // Not excluding any real peer: live_neighbors needs a caller to
        // exclude, and there's no local hostport to exclude here.
        let unused_caller = HostPort::parse("0.0.0.0:0").expect("valid literal host:port");
        let peers = self.peers.read();
        let candidates = peers.live_neighbors(&unused_caller);
        candidates.choose(&mut thread_rng()).cloned()
    }

    pub fn record_peer_success(&self, peer: &HostPort) {
        self.peers.write().record_success(peer);
    }

    pub fn record_peer_failure(&self, peer: &HostPort) {
        self.peers.write().record_failure(peer);
    }

    /// `enqueue_peer(hostport)`
    pub fn enqueue_peer(&self, hostport: HostPort) {
        self.peers.write().enqueue_peer(hostport);
    }

    /// `get_live_neighbors(hostport)`
    pub fn get_live_neighbors(&self, caller: &HostPort) -> Vec<HostPort> {
        self.peers.read().live_neighbors(caller)
    }

    /// `get_zonefile_inventory(offset_bits, length_bits) -> bytes`
    pub fn get_zonefile_inventory(&self, offset_bits: u64, length_bits: u64) -> Vec<u8> {
        self.inventory.window(offset_bits, length_bits)
    }

    pub fn note_zonefile_present(&self, index: u64, present: bool) {
        self.inventory.set(index, present);
    }

    pub fn zonefile(&self, hash_hex: &str) -> Result<Option<Vec<u8>>> {
        self.store.get(hash_hex)
    }

    pub fn store_zonefile(&self, hash_hex: &str, bytes: &[u8]) -> Result<()> {
        self.store.put(hash_hex, bytes)
    }

    /// `sync_zonefiles(db, from_block, zonefile_dir, db_path)`: pulls
    /// missing zone files for name-ops at or after `from_block` from known
    /// peers. This driver only marks zone files already present on disk as
    /// locally available in the inventory; actual network fetch happens in
    /// the caller via [`crate::gossip::fetch_zonefile`], since the core
    /// invokes this entry point for both steady-state gossip and crash
    /// recovery, and recovery runs before any peer connection exists.
    pub fn sync_zonefiles(&self, name_hashes: &[(u64, String)]) -> Result<u64> {
        let mut synced = 0u64;
        for (index, hash_hex) in name_hashes {
            let present = self.store.has(hash_hex);
            self.inventory.set(*index, present);
            if present {
                synced += 1;
            }
        }
        Ok(synced)
    }

    /// Peer selection for `get_atlas_peers` (spec §4.5): live neighbors
    /// relative to the caller, shuffled and truncated to `max_neighbors()`
    /// if there are more, with the caller always enqueued first.
    pub fn get_atlas_peers(&self, caller: HostPort) -> Vec<HostPort> {
        self.enqueue_peer(caller.clone());
        let mut candidates = self.get_live_neighbors(&caller);
        let cap = self.max_neighbors();
        if candidates.len() > cap {
            candidates.shuffle(&mut thread_rng());
            candidates.truncate(cap);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp(s: &str) -> HostPort {
        HostPort::parse(s).unwrap()
    }

    #[test]
    fn get_atlas_peers_enqueues_caller() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![hp("1.1.1.1:80")], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();

        let peers = state.get_atlas_peers(hp("2.2.2.2:80"));
        assert!(peers.contains(&hp("1.1.1.1:80")));
        assert!(state.get_live_neighbors(&hp("9.9.9.9:1")).contains(&hp("2.2.2.2:80")));
    }

    #[test]
    fn get_atlas_peers_truncates_to_max_neighbors() {
        let many: Vec<HostPort> = (0..5).map(|i| hp(&format!("10.0.0.{i}:80"))).collect();
        let peer_table = AtlasPeerTable {
            table: RwLock::new(PeerTable::new(2, many, vec![])),
        };
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();

        let peers = state.get_atlas_peers(hp("99.99.99.99:1"));
        assert!(peers.len() <= 2);
    }

    #[test]
    fn random_gossip_peer_is_none_with_no_peers() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();
        assert!(state.random_gossip_peer().is_none());
    }

    #[test]
    fn record_peer_failure_eventually_removes_peer_from_rotation() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![hp("1.1.1.1:80")], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();
        for _ in 0..20 {
            state.record_peer_failure(&hp("1.1.1.1:80"));
        }
        assert!(state.random_gossip_peer().is_none());
    }

    #[test]
    fn stop_clears_running_flag() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();
        assert!(state.is_running());
        stop(&state);
        assert!(!state.is_running());
    }

    #[test]
    fn sync_zonefiles_marks_present_from_disk() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();
        state.store_zonefile("deadbeef", b"zone").unwrap();

        let synced = state
            .sync_zonefiles(&[(0, "deadbeef".to_string()), (1, "missing".to_string())])
            .unwrap();
        assert_eq!(synced, 1);
        assert_eq!(state.get_zonefile_inventory(0, 2), vec![0b1000_0000]);
    }
}
