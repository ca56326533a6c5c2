use serde::{Deserialize, Serialize};

/// The on-chain operation that produced the current state of a name or
/// namespace record. Materialized from the original implementation's
/// opcode strings (`NAME_REGISTRATION`, `NAMESPACE_REVEAL`, ...) since
/// `canonicalize(opcode, record)` (§4.3) dispatches on a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    NamePreorder,
    NameRegistration,
    NameUpdate,
    NameTransfer,
    NameRenewal,
    NameRevoke,
    NameImport,
    NamespacePreorder,
    NamespaceReveal,
    NamespaceReady,
}

impl Opcode {
    /// Wire string matching the original implementation's opcode names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::NamePreorder => "NAME_PREORDER",
            Opcode::NameRegistration => "NAME_REGISTRATION",
            Opcode::NameUpdate => "NAME_UPDATE",
            Opcode::NameTransfer => "NAME_TRANSFER",
            Opcode::NameRenewal => "NAME_RENEWAL",
            Opcode::NameRevoke => "NAME_REVOKE",
            Opcode::NameImport => "NAME_IMPORT",
            Opcode::NamespacePreorder => "NAMESPACE_PREORDER",
            Opcode::NamespaceReveal => "NAMESPACE_REVEAL",
            Opcode::NamespaceReady => "NAMESPACE_READY",
        }
    }

    /// Whether this opcode creates a new name record (register/import).
    pub fn creates_name(&self) -> bool {
        matches!(self, Opcode::NameRegistration | Opcode::NameImport)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_import_create_names() {
        assert!(Opcode::NameRegistration.creates_name());
        assert!(Opcode::NameImport.creates_name());
        assert!(!Opcode::NameUpdate.creates_name());
    }

    #[test]
    fn display_matches_wire_string() {
        assert_eq!(Opcode::NamespaceReady.to_string(), "NAMESPACE_READY");
    }
}
