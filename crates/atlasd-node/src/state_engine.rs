//! The state-engine boundary (spec §1(b), §2 component 3): the external
//! library that replays filtered transactions into the name database.
//! Naming-protocol opcode semantics are explicitly out of scope here —
//! this module defines only the interface the indexing supervisor calls
//! into and the watermark it reads back, mirroring how
//! `atlasd_chain::BlockchainAdapter` bounds the other external collaborator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use atlasd_chain::{BlockchainAdapter, RawTransaction};
use atlasd_db::NameDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Sync applied (or found nothing new to apply) up to the requested tip.
    Continued,
    /// The engine asked the supervisor to exit the loop cleanly (§4.2 step 7).
    Stop,
}

/// What one `sync` call needs: the working directory, the filter predicate,
/// and the already-fetched client handle and target height. `expected_snapshots`
/// is the parsed `snapshots` map from the expected-snapshots file (§6), checked
/// by a real engine against the consensus hash it computes at each listed block.
pub struct SyncRequest<'a> {
    pub working_dir: &'a Path,
    pub client: &'a dyn BlockchainAdapter,
    pub effective_tip: u64,
    pub expected_snapshots: &'a std::collections::HashMap<u64, String>,
    pub filter: fn(&RawTransaction) -> bool,
}

#[async_trait]
pub trait StateEngine: Send + Sync {
    async fn sync(&self, db: &NameDb, req: SyncRequest<'_>) -> atlasd_db::Result<SyncOutcome>;
}

/// Stand-in engine used where no production naming-protocol replay is wired
/// in: advances `lastblock` straight to the requested tip without decoding
/// any operations. Exercises the supervisor's control flow (watermark
/// advance, Atlas catch-up trigger) without claiming to implement the
/// protocol semantics §1(b) places out of scope.
pub struct WatermarkOnlyEngine;

#[async_trait]
impl StateEngine for WatermarkOnlyEngine {
    async fn sync(&self, db: &NameDb, req: SyncRequest<'_>) -> atlasd_db::Result<SyncOutcome> {
        for height in (db.lastblock()?.max(1))..=req.effective_tip {
            let txs = req
                .client
                .block_transactions(height)
                .await
                .map_err(|e| atlasd_db::DbError::Database(e.to_string()))?;
            let _accepted: Vec<_> = txs.iter().filter(|tx| (req.filter)(tx)).collect();
        }
        if req.effective_tip > 0 {
            db.set_lastblock(req.effective_tip)?;
        }
        Ok(SyncOutcome::Continued)
    }
}

pub fn shared(engine: impl StateEngine + 'static) -> Arc<dyn StateEngine> {
    Arc::new(engine)
}
