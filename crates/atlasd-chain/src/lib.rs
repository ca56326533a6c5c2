//! The Blockchain Adapter (external collaborator, spec §6) and the
//! Transaction Filter (§4.1) the indexing supervisor drives it with.
//!
//! `atlasd-chain` is deliberately thin: the adapter's job is only to hand
//! back an index range and raw transactions for a height; everything about
//! consensus validation belongs to the chain client itself, out of scope
//! here (spec §1 Non-goals).

pub mod adapter;
pub mod error;
pub mod filter;
pub mod rpc_adapter;

pub use adapter::{BlockchainAdapter, IndexRange, RawTransaction};
pub use error::{ChainError, Result};
pub use filter::accept;
pub use rpc_adapter::JsonRpcAdapter;
