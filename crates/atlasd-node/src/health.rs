//! Internal health snapshot (ambient, §4.6): not a documented RPC endpoint,
//! only feeds `getinfo`'s `indexing`/`lastblock` fields and lets the
//! lifecycle supervisor log a liveness line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub indexing: bool,
    pub lastblock: u64,
    pub atlas_peer_count: usize,
    pub seconds_since_last_block: u64,
}

pub struct HealthMonitor {
    lastblock: AtomicU64,
    last_advance: parking_lot::Mutex<Instant>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            lastblock: AtomicU64::new(0),
            last_advance: parking_lot::Mutex::new(Instant::now()),
        }
    }

    pub fn note_lastblock(&self, block: u64) {
        let previous = self.lastblock.swap(block, Ordering::SeqCst);
        if block != previous {
            *self.last_advance.lock() = Instant::now();
        }
    }

    pub fn snapshot(&self, indexing: bool, atlas_peer_count: usize) -> HealthSnapshot {
        HealthSnapshot {
            indexing,
            lastblock: self.lastblock.load(Ordering::SeqCst),
            atlas_peer_count,
            seconds_since_last_block: self.last_advance.lock().elapsed().as_secs(),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_current_lastblock() {
        let monitor = HealthMonitor::new();
        monitor.note_lastblock(42);
        let snap = monitor.snapshot(false, 3);
        assert_eq!(snap.lastblock, 42);
        assert_eq!(snap.atlas_peer_count, 3);
        assert!(!snap.indexing);
    }

    #[test]
    fn repeated_same_block_does_not_reset_advance_clock() {
        let monitor = HealthMonitor::new();
        monitor.note_lastblock(10);
        let first_advance = *monitor.last_advance.lock();
        std::thread::sleep(Duration::from_millis(20));
        monitor.note_lastblock(10);
        assert_eq!(*monitor.last_advance.lock(), first_advance);
    }
}
