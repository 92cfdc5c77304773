//! Node configuration types

use lode_contracts::amount_value;
use lode_core::constants::{config_keys, DEFAULT_SNAPSHOT_RETENTION, DEFAULT_ZONE};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{NodeError, Result};

/// Complete node configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// On-chain network parameters installed at genesis
    #[serde(default)]
    pub network: NetworkConfig,

    /// Local devnet layout
    #[serde(default)]
    pub devnet: DevnetConfig,
}

impl NodeConfig {
    /// Read a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(NodeError::Config(format!(
                "unknown log format {:?}, expected text or json",
                self.logging.format
            )));
        }
        if self.network.snapshot_retention == 0 {
            return Err(NodeError::Config("snapshot_retention must be at least 1".into()));
        }
        if self.network.withdraw_lock_epochs == 0 {
            return Err(NodeError::Config("withdraw_lock_epochs must be at least 1".into()));
        }
        if self.devnet.alphabet_size == 0 {
            return Err(NodeError::Config("devnet alphabet needs at least one key".into()));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Network parameters; fees are in the smallest LODE unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub container_fee: u64,

    #[serde(default)]
    pub container_alias_fee: u64,

    #[serde(default)]
    pub peer_registration_fee: u64,

    /// Epochs a withdrawal stays escrowed before it can be reclaimed
    #[serde(default = "default_withdraw_lock_epochs")]
    pub withdraw_lock_epochs: u64,

    /// Netmap snapshots kept, current epoch included
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention: u64,

    /// Default zone for named containers
    #[serde(default = "default_zone")]
    pub zone: String,
}

fn default_withdraw_lock_epochs() -> u64 {
    3
}

fn default_snapshot_retention() -> u64 {
    DEFAULT_SNAPSHOT_RETENTION
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            container_fee: 0,
            container_alias_fee: 0,
            peer_registration_fee: 0,
            withdraw_lock_epochs: default_withdraw_lock_epochs(),
            snapshot_retention: default_snapshot_retention(),
            zone: default_zone(),
        }
    }
}

impl NetworkConfig {
    /// Entries for the `InitConfig` call at genesis
    pub fn config_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        vec![
            (
                config_keys::CONTAINER_FEE.to_vec(),
                amount_value(self.container_fee.into()),
            ),
            (
                config_keys::CONTAINER_ALIAS_FEE.to_vec(),
                amount_value(self.container_alias_fee.into()),
            ),
            (
                config_keys::PEER_REGISTRATION_FEE.to_vec(),
                amount_value(self.peer_registration_fee.into()),
            ),
            (
                config_keys::WITHDRAW_LOCK_EPOCHS.to_vec(),
                amount_value(self.withdraw_lock_epochs.into()),
            ),
        ]
    }
}

/// Local devnet layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevnetConfig {
    /// Inner Ring keys
    #[serde(default = "default_alphabet_size")]
    pub alphabet_size: usize,

    #[serde(default = "default_storage_nodes")]
    pub storage_nodes: usize,

    /// Epochs to run
    #[serde(default = "default_epochs")]
    pub epochs: u64,

    /// Seed for every devnet key
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Main chain deposit made by the demo user
    #[serde(default = "default_deposit")]
    pub deposit: u64,
}

fn default_alphabet_size() -> usize {
    4
}

fn default_storage_nodes() -> usize {
    3
}

fn default_epochs() -> u64 {
    4
}

fn default_seed() -> u64 {
    7
}

fn default_deposit() -> u64 {
    1_000_000
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            alphabet_size: default_alphabet_size(),
            storage_nodes: default_storage_nodes(),
            epochs: default_epochs(),
            seed: default_seed(),
            deposit: default_deposit(),
        }
    }
}
