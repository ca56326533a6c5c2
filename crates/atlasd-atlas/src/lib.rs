//! Atlas (spec §4.5): the peer-to-peer zone-file replication overlay,
//! consumed by the core through the small explicit contract in
//! [`state`] — `init`/`start`/`stop` plus the read/write operations the
//! RPC layer and indexing supervisor call directly.

pub mod error;
pub mod gossip;
pub mod hostport;
pub mod inventory;
pub mod peer;
pub mod rate_limiter;
pub mod store;
pub mod state;

pub use error::{AtlasError, Result};
pub use hostport::HostPort;
pub use inventory::ZonefileInventory;
pub use peer::{PeerInfo, PeerTable};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterStats};
pub use state::{init, start, stop, AtlasPeerTable, AtlasState, DEFAULT_MAX_NEIGHBORS};
pub use store::ZonefileStore;
