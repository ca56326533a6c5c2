//! The RPC server (spec §4.3, §4.4, §6): a `Server` value constructed once
//! at startup and handed to the HTTP transport, rather than a process-wide
//! singleton (§9 redesign note). Dispatch goes through an explicit method
//! registry instead of reflection over `rpc_*` methods.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use atlasd_atlas::AtlasState;
use atlasd_db::NameDb;

use crate::methods::{self, Context};
use crate::rate_limiter::RateLimiter;
use crate::types::error_envelope;

pub struct RpcServer {
    db: Arc<NameDb>,
    atlas: Option<Arc<AtlasState>>,
    rate_limiter: Arc<RateLimiter>,
    test_mode: bool,
    server_version: &'static str,
    data_dir: PathBuf,
}

impl RpcServer {
    pub fn builder(db: Arc<NameDb>) -> RpcServerBuilder {
        RpcServerBuilder {
            db,
            atlas: None,
            rate_limiter: None,
            test_mode: false,
            data_dir: None,
        }
    }

    #[cfg(test)]
    pub fn new_for_testing(db: Arc<NameDb>) -> Self {
        Self {
            db,
            atlas: None,
            rate_limiter: Arc::new(RateLimiter::new()),
            test_mode: true,
            server_version: env!("CARGO_PKG_VERSION"),
            data_dir: std::env::temp_dir(),
        }
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    fn context(&self) -> Context {
        Context {
            db: self.db.view(),
            atlas: self.atlas.clone(),
            test_mode: self.test_mode,
            server_version: self.server_version,
            last_block_seen: None,
        }
    }

    /// Dispatches one call, after transport-level admission has already run.
    /// Always returns an envelope (§7, §9): an unknown method or any
    /// dispatch panic-free error becomes `{error: ...}`, never a transport
    /// failure.
    pub fn dispatch(&self, method: &str, params: &[Value], client_ip: IpAddr) -> Value {
        if !self.rate_limiter.check(client_ip) {
            warn!(%client_ip, %method, "rate limited");
            return error_envelope("Rate limit exceeded");
        }

        let ctx = self.context();
        match method {
            "ping" => methods::ping(&ctx, params),
            "getinfo" => methods::getinfo(&ctx),
            "get_name_blockchain_record" => methods::get_name_blockchain_record(&ctx, params),
            "get_name_history_blocks" => methods::get_name_history_blocks(&ctx, params),
            "get_name_at" => methods::get_name_at(&ctx, params),
            "get_historic_name_at" => methods::get_historic_name_at(&ctx, params),
            "get_num_nameops_at" => methods::get_num_nameops_at(&ctx, params),
            "get_nameops_at" => methods::get_nameops_at(&ctx, params),
            "get_nameops_hash_at" => methods::get_nameops_hash_at(&ctx, params),
            "get_names_owned_by_address" => methods::get_names_owned_by_address(&ctx, params),
            "get_historic_names_by_address" => methods::get_historic_names_by_address(&ctx, params),
            "get_num_historic_names_by_address" => {
                methods::get_num_historic_names_by_address(&ctx, params)
            }
            "get_name_cost" => methods::get_name_cost(&ctx, params),
            "get_namespace_cost" => methods::get_namespace_cost(&ctx, params),
            "get_namespace_blockchain_record" => methods::get_namespace_blockchain_record(&ctx, params),
            "get_num_names" => methods::get_num_names(&ctx, params),
            "get_num_names_cumulative" => methods::get_num_names_cumulative(&ctx, params),
            "get_all_names" => methods::get_all_names(&ctx, params),
            "get_all_names_cumulative" => methods::get_all_names_cumulative(&ctx, params),
            "get_all_namespaces" => methods::get_all_namespaces(&ctx, params),
            "get_num_names_in_namespace" => methods::get_num_names_in_namespace(&ctx, params),
            "get_names_in_namespace" => methods::get_names_in_namespace(&ctx, params),
            "get_consensus_at" => methods::get_consensus_at(&ctx, params),
            "get_consensus_hashes" => methods::get_consensus_hashes(&ctx, params),
            "get_block_from_consensus" => methods::get_block_from_consensus(&ctx, params),
            "get_zonefiles" => methods::get_zonefiles(&ctx, params),
            "put_zonefiles" => methods::put_zonefiles(&ctx, params),
            "get_zonefiles_by_block" => methods::get_zonefiles_by_block(&ctx, params),
            "get_atlas_peers" => methods::get_atlas_peers(&ctx, params),
            "get_zonefile_inventory" => methods::get_zonefile_inventory(&ctx, params),
            "rpc_listMethods" => crate::api_registry::api_summary(),
            _ => error_envelope(format!("unknown method: {method}")),
        }
    }
}

pub struct RpcServerBuilder {
    db: Arc<NameDb>,
    atlas: Option<Arc<AtlasState>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    test_mode: bool,
    data_dir: Option<PathBuf>,
}

impl RpcServerBuilder {
    pub fn atlas(mut self, atlas: Arc<AtlasState>) -> Self {
        self.atlas = Some(atlas);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn test_mode(mut self, on: bool) -> Self {
        self.test_mode = on;
        self
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    pub fn build(self) -> RpcServer {
        RpcServer {
            db: self.db,
            atlas: self.atlas,
            rate_limiter: self.rate_limiter.unwrap_or_else(|| Arc::new(RateLimiter::new())),
            test_mode: self.test_mode,
            server_version: env!("CARGO_PKG_VERSION"),
            data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from("./data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_server() -> (RpcServer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(NameDb::open(dir.path()).unwrap());
        (RpcServer::new_for_testing(db), dir)
    }

    #[test]
    fn dispatch_ping() {
        let (server, _dir) = test_server();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(server.dispatch("ping", &[], ip), json!({ "status": "alive" }));
    }

    #[test]
    fn dispatch_unknown_method_is_an_envelope_not_a_panic() {
        let (server, _dir) = test_server();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let result = server.dispatch("not_a_real_method", &[], ip);
        assert!(result.get("error").is_some());
    }

    #[test]
    fn dispatch_honors_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(NameDb::open(dir.path()).unwrap());
        let limiter = Arc::new(RateLimiter::with_config(crate::rate_limiter::RateLimiterConfig {
            max_requests: 1,
            window: std::time::Duration::from_secs(60),
            cleanup_interval: std::time::Duration::from_secs(300),
        }));
        let server = RpcServer::builder(db).rate_limiter(limiter).test_mode(true).build();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(server.dispatch("ping", &[], ip).get("status").is_some());
        assert!(server.dispatch("ping", &[], ip).get("error").is_some());
    }
}
