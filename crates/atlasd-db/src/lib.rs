//! Name DB: the materialized database of names and namespaces.
//!
//! The real state-engine library and its on-disk schema are out of scope
//! for this core (spec §1); what lives here is the read/write surface the
//! core actually calls: the `lastblock` watermark, per-name/namespace
//! lookups, consensus-hash history, and zone-file commitment tracking
//! (invariant I2). `NameDb` is opened fresh per RPC call and closed before
//! reply (§4.3), backed by a single long-lived RocksDB handle internally,
//! wrapped so call sites see an open/close lifecycle per §9's "Per-request
//! DB open/close" redesign note.

pub mod engine;
pub mod error;
pub mod maintenance;

pub use engine::{NameDb, NameDbView, NameOpEntry};
pub use error::{DbError, Result};
pub use maintenance::{restore_from_backup, snapshot_to_crash_dir, BackupConfig};
