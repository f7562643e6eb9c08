//! The TOML configuration shared by every command.
//!
//! ```toml
//! [stream]
//! file = "datastream.bin"
//! version = 4
//! chain_id = 1101
//! upgrade_etrog_batch_number = 0
//!
//! [rpc]
//! url = "http://localhost:8545"
//! backoff = 100
//! max_retries = 0
//!
//! [merkle_tree]
//! max_threads = 0
//! cache_file = "imroots.json"
//!
//! [log]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_path_to_error::Error<toml::de::Error>),
    #[error("merkle_tree.max_threads is {0}, but stream.upgrade_etrog_batch_number is not set")]
    ThreadsWithoutEtrog(usize),
    #[error("the generate command needs an [rpc] section")]
    MissingRpc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub rpc: Option<RpcConfig>,
    #[serde(default)]
    pub merkle_tree: MerkleTreeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Path of the local stream file.
    pub file: PathBuf,
    /// Stream format version. `L2BlockEnd` entries exist from version 4 on.
    #[serde(default = "default_version")]
    pub version: u32,
    pub chain_id: u64,
    /// First batch of the etrog fork, `0` when unknown.
    #[serde(default)]
    pub upgrade_etrog_batch_number: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcConfig {
    pub url: Url,
    /// Initial delay between retries, in milliseconds.
    #[serde(default = "default_backoff")]
    pub backoff: u64,
    /// Retries per failed request. `0` surfaces the first failure.
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleTreeConfig {
    /// Intermediate state root workers. `0` disables the backfill.
    #[serde(default)]
    pub max_threads: usize,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_version() -> u32 {
    crate::generate::STREAM_VERSION_L2_BLOCK_END
}

fn default_backoff() -> u64 {
    100
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    /// Checks the settings the generate command depends on.
    pub fn validate_generate(&self) -> Result<&RpcConfig, ConfigError> {
        let threads = self.merkle_tree.max_threads;
        if threads > 0 && self.stream.upgrade_etrog_batch_number == 0 {
            return Err(ConfigError::ThreadsWithoutEtrog(threads));
        }
        if threads > 0 && self.merkle_tree.cache_file.is_none() {
            warn!(
                threads,
                "merkle_tree.cache_file is not set, intermediate state roots will not be persisted"
            );
        }
        self.rpc.as_ref().ok_or(ConfigError::MissingRpc)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_path_to_error::deserialize(toml::Deserializer::new(s))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [stream]
        file = "/tmp/ds.bin"
        version = 3
        chain_id = 1101
        upgrade_etrog_batch_number = 2000

        [rpc]
        url = "http://localhost:8123"
        max_retries = 2

        [merkle_tree]
        max_threads = 8
        cache_file = "roots.json"

        [log]
        level = "debug"
    "#;

    #[test]
    fn parses_full_config() {
        let config: Config = FULL.parse().unwrap();
        assert_eq!(config.stream.version, 3);
        assert_eq!(config.stream.upgrade_etrog_batch_number, 2000);
        let rpc = config.validate_generate().unwrap();
        assert_eq!(rpc.backoff, 100);
        assert_eq!(rpc.max_retries, 2);
        assert_eq!(config.merkle_tree.max_threads, 8);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn defaults() {
        let config: Config = "[stream]\nfile = \"ds.bin\"\nchain_id = 1\n".parse().unwrap();
        assert_eq!(config.stream.version, 4);
        assert_eq!(config.merkle_tree.max_threads, 0);
        assert!(config.rpc.is_none());
        assert_eq!(config.log.level, "info");
        assert!(matches!(
            config.validate_generate(),
            Err(ConfigError::MissingRpc)
        ));
    }

    #[test]
    fn rpc_failures_are_not_retried_by_default() {
        let config: Config = "[stream]\nfile = \"ds.bin\"\nchain_id = 1\n[rpc]\nurl = \"http://localhost:8123\"\n"
            .parse()
            .unwrap();
        let rpc = config.validate_generate().unwrap();
        assert_eq!(rpc.max_retries, 0);
    }

    #[test]
    fn threads_need_etrog_batch() {
        let config: Config = FULL
            .replace("upgrade_etrog_batch_number = 2000", "")
            .parse()
            .unwrap();
        assert!(matches!(
            config.validate_generate(),
            Err(ConfigError::ThreadsWithoutEtrog(8))
        ));
    }

    #[test]
    fn errors_name_the_offending_field() {
        let err = "[stream]\nfile = \"ds.bin\"\nchain_id = \"one\"\n"
            .parse::<Config>()
            .unwrap_err();
        assert!(err.to_string().contains("stream.chain_id"), "{err}");
    }
}
