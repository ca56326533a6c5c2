//! Compile-time catalog of the RPC method surface (spec §4.3). Single
//! source of truth for `rpc_listMethods` introspection; never shadows a
//! real method name.

#[derive(Debug, Clone, Copy)]
pub struct RpcMethodInfo {
    pub name: &'static str,
    pub category: &'static str,
    pub is_write: bool,
    pub description: &'static str,
}

pub const ALL_METHODS: &[RpcMethodInfo] = &[
    RpcMethodInfo { name: "ping", category: "system", is_write: false, description: "Liveness check" },
    RpcMethodInfo { name: "getinfo", category: "system", is_write: false, description: "Indexer status snapshot" },

    RpcMethodInfo { name: "get_name_blockchain_record", category: "names", is_write: false, description: "Current record for a name" },
    RpcMethodInfo { name: "get_name_history_blocks", category: "names", is_write: false, description: "Blocks at which a name changed" },
    RpcMethodInfo { name: "get_name_at", category: "names", is_write: false, description: "Name record at a given block" },
    RpcMethodInfo { name: "get_historic_name_at", category: "names", is_write: false, description: "Historic name record at a given block" },

    RpcMethodInfo { name: "get_num_nameops_at", category: "names", is_write: false, description: "Count of name-ops at a block" },
    RpcMethodInfo { name: "get_nameops_at", category: "names", is_write: false, description: "Name-ops at a block (cap 10)" },
    RpcMethodInfo { name: "get_nameops_hash_at", category: "names", is_write: false, description: "SNV digest of name-ops at a block" },

    RpcMethodInfo { name: "get_names_owned_by_address", category: "names", is_write: false, description: "Currently-owned names for an address" },
    RpcMethodInfo { name: "get_historic_names_by_address", category: "names", is_write: false, description: "Historic ownership for an address" },
    RpcMethodInfo { name: "get_num_historic_names_by_address", category: "names", is_write: false, description: "Count of historic names for an address" },

    RpcMethodInfo { name: "get_name_cost", category: "pricing", is_write: false, description: "Registration cost for a name" },
    RpcMethodInfo { name: "get_namespace_cost", category: "pricing", is_write: false, description: "Preorder cost for a namespace" },

    RpcMethodInfo { name: "get_namespace_blockchain_record", category: "namespaces", is_write: false, description: "Current record for a namespace" },
    RpcMethodInfo { name: "get_num_names", category: "names", is_write: false, description: "Count of live names" },
    RpcMethodInfo { name: "get_num_names_cumulative", category: "names", is_write: false, description: "Count of names ever registered" },
    RpcMethodInfo { name: "get_all_names", category: "names", is_write: false, description: "Paginated list of live names" },
    RpcMethodInfo { name: "get_all_names_cumulative", category: "names", is_write: false, description: "Paginated list of all names ever registered" },

    RpcMethodInfo { name: "get_all_namespaces", category: "namespaces", is_write: false, description: "List of ready namespaces" },
    RpcMethodInfo { name: "get_num_names_in_namespace", category: "namespaces", is_write: false, description: "Count of names in a namespace" },
    RpcMethodInfo { name: "get_names_in_namespace", category: "namespaces", is_write: false, description: "Paginated names in a namespace" },

    RpcMethodInfo { name: "get_consensus_at", category: "consensus", is_write: false, description: "Consensus hash at a block" },
    RpcMethodInfo { name: "get_consensus_hashes", category: "consensus", is_write: false, description: "Consensus hashes for multiple blocks" },
    RpcMethodInfo { name: "get_block_from_consensus", category: "consensus", is_write: false, description: "Block for a consensus hash" },

    RpcMethodInfo { name: "get_zonefiles", category: "atlas", is_write: false, description: "Fetch zone files by hash" },
    RpcMethodInfo { name: "put_zonefiles", category: "atlas", is_write: true, description: "Submit zone files for on-chain commitments" },
    RpcMethodInfo { name: "get_zonefiles_by_block", category: "atlas", is_write: false, description: "Zone-file hashes committed in a block range" },
    RpcMethodInfo { name: "get_atlas_peers", category: "atlas", is_write: false, description: "Live Atlas neighbors" },
    RpcMethodInfo { name: "get_zonefile_inventory", category: "atlas", is_write: false, description: "Zone-file inventory bitmap window" },

    RpcMethodInfo { name: "rpc_listMethods", category: "rpc", is_write: false, description: "List all available RPC methods" },
];

pub fn methods_by_category(category: &str) -> Vec<&'static RpcMethodInfo> {
    ALL_METHODS.iter().filter(|m| m.category == category).collect()
}

pub fn find(name: &str) -> Option<&'static RpcMethodInfo> {
    ALL_METHODS.iter().find(|m| m.name == name)
}

pub fn api_summary() -> serde_json::Value {
    serde_json::json!({
        "total_methods": ALL_METHODS.len(),
        "methods": ALL_METHODS.iter().map(|m| serde_json::json!({
            "name": m.name,
            "category": m.category,
            "write": m.is_write,
            "description": m.description,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_never_shadows_itself() {
        let mut names: Vec<&str> = ALL_METHODS.iter().map(|m| m.name).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before, "duplicate method name in registry");
    }

    #[test]
    fn find_locates_known_method() {
        assert!(find("ping").is_some());
        assert!(find("not_a_method").is_none());
    }
}
