//! The Indexing Supervisor (spec §4.2): the only writer to the Name DB.
//! An owned long-running loop task rather than a callback registered with
//! a runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use atlasd_atlas::AtlasState;
use atlasd_chain::BlockchainAdapter;
use atlasd_db::NameDb;

use crate::state_engine::{StateEngine, SyncOutcome, SyncRequest};

/// Confirmation depth subtracted from the chain tip before syncing (§4.2
/// step 3), so the supervisor never indexes a block that could still be
/// reorganized out.
pub const NUM_CONFIRMATIONS: u64 = 6;

/// How long the supervisor sleeps between sync passes once caught up to
/// `effective_tip` (§4.2 step 6).
pub const REINDEX_FREQUENCY: Duration = Duration::from_secs(300);

/// Backoff cap while the adapter can't reach the chain client (§4.2 step 2).
const BACKOFF_CAP: Duration = Duration::from_secs(60);

pub struct IndexingSupervisor {
    db: Arc<NameDb>,
    engine: Arc<dyn StateEngine>,
    atlas: Option<Arc<AtlasState>>,
    working_dir: PathBuf,
    expected_snapshots: HashMap<u64, String>,
    running: Arc<AtomicBool>,
}

impl IndexingSupervisor {
    pub fn new(
        db: Arc<NameDb>,
        engine: Arc<dyn StateEngine>,
        atlas: Option<Arc<AtlasState>>,
        working_dir: PathBuf,
        expected_snapshots: HashMap<u64, String>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self { db, engine, atlas, working_dir, expected_snapshots, running }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs until the running flag clears or the state engine signals Stop.
    /// Any other error escaping `sync` is fatal (§4.2 step 8): the process
    /// aborts rather than attempt in-place recovery, since correctness
    /// depends on ordered replay.
    pub async fn run(&self, make_client: impl Fn() -> Arc<dyn BlockchainAdapter>) {
        while self.running() {
            let client = make_client();

            let range = match self.obtain_range_with_backoff(&client).await {
                Some(r) => r,
                None => break, // running flag cleared mid-backoff
            };

            let effective_tip = range.last.unwrap_or(range.first).saturating_sub(NUM_CONFIRMATIONS);
            let old_lastblock = match self.db.lastblock() {
                Ok(b) => b,
                Err(e) => {
                    error!(error = %e, "fatal: could not read lastblock watermark");
                    std::process::abort();
                }
            };

            if let Err(e) = self.db.set_indexing_flag(true) {
                error!(error = %e, "fatal: could not persist indexing flag");
                std::process::abort();
            }

            let start = std::time::Instant::now();
            let outcome = self
                .engine
                .sync(
                    &self.db,
                    SyncRequest {
                        working_dir: &self.working_dir,
                        client: client.as_ref(),
                        effective_tip,
                        expected_snapshots: &self.expected_snapshots,
                        filter: atlasd_chain::accept,
                    },
                )
                .await;

            if let Err(e) = self.db.set_indexing_flag(false) {
                error!(error = %e, "fatal: could not clear indexing flag");
                std::process::abort();
            }

            let outcome = match outcome {
                Ok(o) => o,
                Err(e) => {
                    error!(error = %e, "fatal indexing error, aborting process");
                    std::process::abort();
                }
            };

            let new_lastblock = self.db.lastblock().unwrap_or(old_lastblock);
            info!(
                from = old_lastblock,
                to = new_lastblock,
                effective_tip,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "sync pass complete"
            );

            if let Some(atlas) = &self.atlas {
                if new_lastblock > old_lastblock {
                    self.catch_up_atlas(atlas, old_lastblock + 1, new_lastblock + 1).await;
                }
            }

            if outcome == SyncOutcome::Stop {
                info!("state engine requested stop, exiting indexing loop");
                break;
            }

            self.sleep_until_next_poll().await;
        }
    }

    /// Marks zone files already on disk as present, then asks known peers
    /// for whatever is still missing (spec §4.5's zone-file propagation).
    async fn catch_up_atlas(&self, atlas: &AtlasState, from_block: u64, to_block_exclusive: u64) {
        let mut hashes = Vec::new();
        for block in from_block..to_block_exclusive {
            if let Ok(ops) = self.db.nameops_at(block) {
                for op in ops {
                    if let Some(vh) = op.value_hash {
                        hashes.push((block, vh));
                    }
                }
            }
        }
        if let Err(e) = atlas.sync_zonefiles(&hashes) {
            warn!(error = %e, "atlas zone-file catch-up failed");
            return;
        }
        let fetched = atlasd_atlas::gossip::fetch_missing_zonefiles(atlas, &hashes).await;
        if fetched > 0 {
            info!(fetched, "atlas fetched missing zone files from peers");
        }
    }

    async fn obtain_range_with_backoff(
        &self,
        client: &Arc<dyn BlockchainAdapter>,
    ) -> Option<atlasd_chain::adapter::IndexRange> {
        let mut backoff = Duration::from_secs(1);
        loop {
            if !self.running() {
                return None;
            }
            match client.index_range().await {
                Ok(range) if range.last.is_some() => return Some(range),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "chain client unreachable"),
            }
            warn!(backoff_secs = backoff.as_secs(), "backing off before retry");
            if !self.sleep_checking_running(backoff).await {
                return None;
            }
            let jitter_ms = rand::thread_rng().gen_range(0..250);
            backoff = (backoff * 2 + Duration::from_millis(jitter_ms)).min(BACKOFF_CAP);
        }
    }

    async fn sleep_until_next_poll(&self) {
        self.sleep_checking_running(REINDEX_FREQUENCY).await;
    }

    /// Sleeps in one-second increments so shutdown is prompt (§4.2 step 6,
    /// §5 cancellation). Returns false if the running flag cleared mid-sleep.
    async fn sleep_checking_running(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        let step = Duration::from_secs(1);
        while remaining > Duration::ZERO {
            if !self.running() {
                return false;
            }
            let this_step = remaining.min(step);
            sleep(this_step).await;
            remaining = remaining.saturating_sub(this_step);
        }
        self.running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlasd_chain::adapter::{IndexRange, RawTransaction};
    use atlasd_chain::ChainError;

    struct FixedAdapter {
        tip: u64,
    }

    #[async_trait]
    impl BlockchainAdapter for FixedAdapter {
        async fn index_range(&self) -> atlasd_chain::Result<IndexRange> {
            Ok(IndexRange { first: 1, last: Some(self.tip) })
        }
        async fn block_transactions(&self, _height: u64) -> atlasd_chain::Result<Vec<RawTransaction>> {
            Ok(vec![])
        }
    }

    struct NeverReachableAdapter;

    #[async_trait]
    impl BlockchainAdapter for NeverReachableAdapter {
        async fn index_range(&self) -> atlasd_chain::Result<IndexRange> {
            Err(ChainError::Transport("no client".into()))
        }
        async fn block_transactions(&self, _height: u64) -> atlasd_chain::Result<Vec<RawTransaction>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn advances_lastblock_past_confirmation_depth() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(NameDb::open(dir.path()).unwrap());
        let running = Arc::new(AtomicBool::new(true));
        let supervisor = IndexingSupervisor::new(
            db.clone(),
            crate::state_engine::shared(crate::state_engine::WatermarkOnlyEngine),
            None,
            dir.path().to_path_buf(),
            HashMap::new(),
            running.clone(),
        );

        let running_clone = running.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            running_clone.store(false, Ordering::SeqCst);
        });

        supervisor
            .run(|| Arc::new(FixedAdapter { tip: NUM_CONFIRMATIONS + 10 }))
            .await;

        assert_eq!(db.lastblock().unwrap(), 10);
    }

    #[tokio::test]
    async fn stops_promptly_when_running_flag_clears_during_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(NameDb::open(dir.path()).unwrap());
        let running = Arc::new(AtomicBool::new(true));
        let supervisor = IndexingSupervisor::new(
            db,
            crate::state_engine::shared(crate::state_engine::WatermarkOnlyEngine),
            None,
            dir.path().to_path_buf(),
            HashMap::new(),
            running.clone(),
        );

        let running_clone = running.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            running_clone.store(false, Ordering::SeqCst);
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor.run(|| Arc::new(NeverReachableAdapter)),
        )
        .await;
        assert!(result.is_ok(), "supervisor did not exit promptly on shutdown");
    }
}
