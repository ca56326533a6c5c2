//! The Atlas peer table: tracks neighbors discovered through gossip and
//! scores them so `get_live_neighbors` and peer selection for
//! `get_atlas_peers` (spec §4.5) can prefer well-behaved peers.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::hostport::HostPort;

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub hostport: HostPort,
    pub connected_at: SystemTime,
    pub last_seen: SystemTime,
    pub reputation: u8,
    pub failed_requests: u32,
    pub successful_requests: u32,
}

impl PeerInfo {
    pub fn new(hostport: HostPort) -> Self {
        let now = SystemTime::now();
        Self {
            hostport,
            connected_at: now,
            last_seen: now,
            reputation: 100,
            failed_requests: 0,
            successful_requests: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.successful_requests += 1;
        self.last_seen = SystemTime::now();
        if self.reputation < 100 {
            self.reputation = (self.reputation + 1).min(100);
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
        self.reputation = self.reputation.saturating_sub(5);
    }

    pub fn is_active(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed().map(|e| e < timeout).unwrap_or(false)
    }

    pub fn should_ban(&self) -> bool {
        self.reputation < 20 || self.failed_requests > 10
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.successful_requests + self.failed_requests;
        if total == 0 {
            1.0
        } else {
            self.successful_requests as f64 / total as f64
        }
    }

    pub fn connection_score(&self) -> f64 {
        self.reputation as f64 * self.success_rate()
    }
}

/// The `peer_table` value `init()` hands back (spec §4.5).
pub struct PeerTable {
    peers: HashMap<HostPort, PeerInfo>,
    max_neighbors: usize,
    blacklist: Vec<HostPort>,
}

impl PeerTable {
    pub fn new(max_neighbors: usize, seed_peers: Vec<HostPort>, blacklist: Vec<HostPort>) -> Self {
        let mut peers = HashMap::new();
        for hp in seed_peers {
            if !blacklist.contains(&hp) {
                peers.insert(hp.clone(), PeerInfo::new(hp));
            }
        }
        Self { peers, max_neighbors, blacklist }
    }

    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    /// `enqueue_peer(hostport)`: add a peer if there's room and it isn't
    /// blacklisted. A peer already present is left untouched rather than
    /// reset, so its reputation survives re-enqueueing.
    pub fn enqueue_peer(&mut self, hostport: HostPort) {
        if self.blacklist.contains(&hostport) {
            return;
        }
        if self.peers.contains_key(&hostport) {
            return;
        }
        if self.peers.len() >= self.max_neighbors {
            self.evict_worst();
        }
        self.peers.insert(hostport.clone(), PeerInfo::new(hostport));
    }

    fn evict_worst(&mut self) {
        if let Some(worst) = self
            .peers
            .values()
            .min_by(|a, b| {
                a.connection_score()
                    .partial_cmp(&b.connection_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|p| p.hostport.clone())
        {
            self.peers.remove(&worst);
        }
    }

    pub fn record_success(&mut self, hostport: &HostPort) {
        if let Some(p) = self.peers.get_mut(hostport) {
            p.record_success();
        }
    }

    pub fn record_failure(&mut self, hostport: &HostPort) {
        if let Some(p) = self.peers.get_mut(hostport) {
            p.record_failure();
        }
    }

    pub fn cleanup(&mut self, timeout: Duration) {
        self.peers.retain(|_, p| p.is_active(timeout) && !p.should_ban());
    }

    /// `get_live_neighbors(hostport)`: every known peer other than the
    /// caller, excluding banned ones.
    pub fn live_neighbors(&self, caller: &HostPort) -> Vec<HostPort> {
        self.peers
            .values()
            .filter(|p| !p.should_ban() && &p.hostport != caller)
            .map(|p| p.hostport.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp(s: &str) -> HostPort {
        HostPort::parse(s).unwrap()
    }

    #[test]
    fn enqueue_skips_blacklisted() {
        let mut table = PeerTable::new(10, vec![], vec![hp("1.2.3.4:80")]);
        table.enqueue_peer(hp("1.2.3.4:80"));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn enqueue_evicts_worst_when_full() {
        let mut table = PeerTable::new(1, vec![hp("1.1.1.1:80")], vec![]);
        table.record_failure(&hp("1.1.1.1:80"));
        for _ in 0..5 {
            table.record_failure(&hp("1.1.1.1:80"));
        }
        table.enqueue_peer(hp("2.2.2.2:80"));
        assert_eq!(table.len(), 1);
        assert!(table.live_neighbors(&hp("9.9.9.9:1")).contains(&hp("2.2.2.2:80")));
    }

    #[test]
    fn live_neighbors_excludes_caller_and_banned() {
        let mut table = PeerTable::new(10, vec![hp("1.1.1.1:80"), hp("2.2.2.2:80")], vec![]);
        for _ in 0..20 {
            table.record_failure(&hp("2.2.2.2:80"));
        }
        let live = table.live_neighbors(&hp("1.1.1.1:80"));
        assert_eq!(live, vec![]);
    }
}
