//! Node configuration (ambient, SPEC_FULL §4.6), loaded the way the
//! teacher's `Config` is: TOML on disk, `serde` derived, validated once at
//! startup before anything else runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub rpc: RpcConfig,
    pub atlas: AtlasConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain name; used to derive `<chain>.pid`, `<chain>.log` (§6).
    pub chain_name: String,
    pub working_dir: PathBuf,
    pub testnet: bool,
    #[serde(default)]
    pub expected_snapshots: Option<PathBuf>,
    pub chain_rpc_url: String,
    #[serde(default = "default_first_block")]
    pub first_indexed_block: u64,
}

fn default_first_block() -> u64 {
    atlasd_types::limits::FIRST_BLOCK_MAINNET
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub listen_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    pub enabled: bool,
    pub port: u16,
    #[serde(default)]
    pub seed_peers: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                chain_name: "atlasd".to_string(),
                working_dir: PathBuf::from("./data"),
                testnet: false,
                expected_snapshots: None,
                chain_rpc_url: "http://127.0.0.1:8332".to_string(),
                first_indexed_block: default_first_block(),
            },
            rpc: RpcConfig {
                enabled: true,
                listen_addr: "127.0.0.1".to_string(),
                listen_port: 6270,
            },
            atlas: AtlasConfig {
                enabled: true,
                port: 6271,
                seed_peers: vec![],
                blacklist: vec![],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node.chain_name.is_empty() {
            anyhow::bail!("chain_name must not be empty");
        }
        if self.rpc.enabled && self.rpc.listen_port == 0 {
            anyhow::bail!("Invalid RPC port: 0");
        }
        if self.atlas.enabled && self.atlas.port == 0 {
            anyhow::bail!("Invalid atlas port: 0");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }
        Ok(())
    }

    /// Parses the expected-snapshots file (§6): `{"snapshots": {"<block>": "<hash>"}}`.
    pub fn load_expected_snapshots(&self) -> anyhow::Result<std::collections::HashMap<u64, String>> {
        let Some(path) = &self.node.expected_snapshots else {
            return Ok(std::collections::HashMap::new());
        };
        let contents = std::fs::read_to_string(path)?;
        let parsed: serde_json::Value = serde_json::from_str(&contents)?;
        let snapshots = parsed
            .get("snapshots")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let mut out = std::collections::HashMap::new();
        for (block, hash) in snapshots {
            if let (Ok(block), Some(hash)) = (block.parse::<u64>(), hash.as_str()) {
                out.insert(block, hash.to_string());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rpc_port_when_enabled() {
        let mut config = Config::default();
        config.rpc.listen_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "noisy".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn expected_snapshots_parses_block_to_hash_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        std::fs::write(&path, r#"{"snapshots": {"100": "aabbcc", "200": "ddeeff"}}"#).unwrap();
        let mut config = Config::default();
        config.node.expected_snapshots = Some(path);
        let snapshots = config.load_expected_snapshots().unwrap();
        assert_eq!(snapshots.get(&100), Some(&"aabbcc".to_string()));
        assert_eq!(snapshots.get(&200), Some(&"ddeeff".to_string()));
    }

    #[test]
    fn missing_expected_snapshots_path_yields_empty_map() {
        let config = Config::default();
        assert!(config.load_expected_snapshots().unwrap().is_empty());
    }
}
