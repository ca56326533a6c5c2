//! Data model for the naming-protocol indexer.
//!
//! Everything the RPC server and indexing supervisor pass around: names,
//! namespaces, zone-file entries and the length/format rules that bound
//! them. The state-engine's own on-disk schema is out of scope (§1 of the
//! spec); this crate only defines the shapes exchanged at the boundary.

pub mod error;
pub mod limits;
pub mod opcode;
pub mod record;
pub mod validation;

pub use error::{Result, TypesError};
pub use opcode::Opcode;
pub use record::{NameRecord, NamespaceRecord, NamespaceLifecycle, ZonefileEntry};
