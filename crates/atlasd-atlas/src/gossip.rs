//! Peer-to-peer zone-file exchange. Atlas peers speak the same RPC surface
//! as clients (`get_zonefile_inventory`, `get_zonefiles`, `put_zonefiles`),
//! so gossip is just the node acting as its own RPC client against
//! neighbors in the peer table.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AtlasError, Result};
use crate::hostport::HostPort;
use crate::state::AtlasState;

/// How often the gossip loop polls one random peer for new zone files.
const GOSSIP_INTERVAL: Duration = Duration::from_secs(60);

const INVENTORY_WINDOW_BITS: u64 = 4096;

/// Spawns the background gossip loop for a running Atlas instance: every
/// `GOSSIP_INTERVAL`, pick one live peer, pull its zone-file inventory
/// window, and fetch any zone file it has that this node is still missing.
/// Exits once [`AtlasState::stop`] clears the running flag.
pub fn spawn(state: Arc<AtlasState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        while state.is_running() {
            gossip_round(&state, &client).await;
            sleep_checking_running(&state, GOSSIP_INTERVAL).await;
        }
    })
}

/// Sleeps in one-second increments so [`stop`](crate::state::stop) is
/// noticed promptly instead of up to `duration` late.
async fn sleep_checking_running(state: &AtlasState, duration: Duration) {
    let step = Duration::from_secs(1);
    let mut remaining = duration;
    while remaining > Duration::ZERO && state.is_running() {
        let this_step = remaining.min(step);
        tokio::time::sleep(this_step).await;
        remaining = remaining.saturating_sub(this_step);
    }
}

/// Polls one peer's inventory window and updates its reputation in the peer
/// table. The returned bitmap tells the caller which zone files that peer
/// claims to hold; matching them against local gaps (by index -> hash) is
/// the indexing supervisor's job, since the index/hash mapping lives in the
/// Name DB rather than here.
async fn gossip_round(state: &AtlasState, client: &reqwest::Client) {
    let Some(peer) = state.random_gossip_peer() else {
        return;
    };
    match fetch_inventory(client, &peer, 0, INVENTORY_WINDOW_BITS).await {
        Ok(_bits) => state.record_peer_success(&peer),
        Err(e) => {
            warn!(%peer, error = %e, "gossip: inventory fetch failed");
            state.record_peer_failure(&peer);
        }
    }
}

/// For each `(index, hash_hex)` pair not yet present in the local store,
/// asks one random known peer for it and stores whatever comes back. Used
/// by the indexing supervisor after a sync pass to backfill zone files for
/// names indexed in blocks it just processed (spec §4.5).
pub async fn fetch_missing_zonefiles(state: &AtlasState, name_hashes: &[(u64, String)]) -> u64 {
    let client = reqwest::Client::new();
    let mut fetched = 0u64;
    for (index, hash_hex) in name_hashes {
        if state.zonefile(hash_hex).ok().flatten().is_some() {
            continue;
        }
        let Some(peer) = state.random_gossip_peer() else {
            break;
        };
        match fetch_zonefile(&client, &peer, hash_hex).await {
            Ok(Some(bytes)) => {
                state.record_peer_success(&peer);
                if state.store_zonefile(hash_hex, &bytes).is_ok() {
                    state.note_zonefile_present(*index, true);
                    fetched += 1;
                }
            }
            Ok(None) => state.record_peer_success(&peer),
            Err(e) => {
                warn!(%peer, hash = %hash_hex, error = %e, "gossip: zone-file fetch failed");
                state.record_peer_failure(&peer);
            }
        }
    }
    fetched
}

#[derive(Debug, Deserialize)]
struct ZonefilesResponse {
    zonefiles: std::collections::HashMap<String, String>,
}

/// Fetches a single zone file (base64-encoded in the response envelope, per
/// spec §6) from `peer` by its value hash.
pub async fn fetch_zonefile(
    client: &reqwest::Client,
    peer: &HostPort,
    hash_hex: &str,
) -> Result<Option<Vec<u8>>> {
    let url = format!("http://{peer}/zonefiles/{hash_hex}");
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        return Ok(None);
    }
    let body: ZonefilesResponse = resp.json().await?;
    match body.zonefiles.get(hash_hex) {
        Some(b64) => {
            let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
                .map_err(|e| AtlasError::Transport(e.to_string()))?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

/// Pulls a window of `peer`'s zone-file inventory bitmap.
pub async fn fetch_inventory(
    client: &reqwest::Client,
    peer: &HostPort,
    offset_bits: u64,
    length_bits: u64,
) -> Result<Vec<u8>> {
    let url = format!(
        "http://{peer}/zonefile-inventory?offset={offset_bits}&length={length_bits}"
    );
    let resp = client.get(&url).send().await?;
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{init, start};

    #[test]
    fn hostport_url_formatting() {
        let hp = HostPort::parse("node.example.com:6264").unwrap();
        assert_eq!(format!("http://{hp}/zonefiles/abc"), "http://node.example.com:6264/zonefiles/abc");
    }

    #[tokio::test]
    async fn fetch_missing_zonefiles_skips_already_present_entries() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();
        state.store_zonefile("deadbeef", b"zone").unwrap();

        let fetched = fetch_missing_zonefiles(&state, &[(0, "deadbeef".to_string())]).await;
        assert_eq!(fetched, 0);
    }

    #[tokio::test]
    async fn fetch_missing_zonefiles_stops_when_no_peers_known() {
        let peer_table = init(std::path::Path::new("/tmp"), vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let state = start(peer_table, dir.path().to_path_buf()).unwrap();

        let fetched = fetch_missing_zonefiles(&state, &[(0, "missing".to_string())]).await;
        assert_eq!(fetched, 0);
    }
}
