use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A raw transaction as handed back by the chain client. Only the
/// null-data ("OP_RETURN"-equivalent) payload and identifying txid matter
/// to the core; everything else about the transaction is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub block_height: u64,
    pub sender_address: String,
    /// Hex-encoded null-data payload, if the transaction carries one.
    pub nulldata: Option<String>,
}

/// `(first, last)` indexable block range, as returned by `index_range()`.
/// `last = None` signals the adapter could not reach the chain client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub first: u64,
    pub last: Option<u64>,
}

/// External collaborator (spec §6): "exposes `index_range()` and streams
/// raw transactions with an OP_RETURN-equivalent payload field."
///
/// A fresh handle is obtained every supervisor iteration (§4.2 step 1) so
/// transient disconnects don't poison a long-lived connection.
#[async_trait]
pub trait BlockchainAdapter: Send + Sync {
    async fn index_range(&self) -> Result<IndexRange>;
    async fn block_transactions(&self, height: u64) -> Result<Vec<RawTransaction>>;
}
