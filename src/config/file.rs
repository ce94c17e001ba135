//! Configuration file handling

use super::{BuildOptions, MethodOverride};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Combined ABI file to build commands from
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Only build commands for these contracts
    #[serde(default)]
    pub contracts: Option<Vec<String>>,

    /// Default RPC URL
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Default contract address
    #[serde(default)]
    pub contract_address: Option<String>,

    /// Hardware wallet defaults
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Per-signature documentation overrides and skips
    #[serde(default)]
    pub methods: BTreeMap<String, MethodOverride>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between receipt polls while waiting on a slow transaction
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Blocks to wait for a receipt before reporting the transaction as not mined
    #[serde(default = "default_confirmation_blocks")]
    pub confirmation_blocks: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Settings {
    /// Reject values that would turn polling into a busy loop
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                field: "poll_interval_secs",
                value: "0 (must be at least 1)".to_string(),
            });
        }
        Ok(())
    }
}

fn default_poll_interval() -> u64 {
    3
}

fn default_confirmation_blocks() -> u64 {
    50
}

fn default_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            confirmation_blocks: default_confirmation_blocks(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Hardware wallet defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// HD derivation path
    #[serde(default)]
    pub hd_path: Option<String>,

    /// Print the request and ask for on-device confirmation
    #[serde(default)]
    pub hardware_confirm: Option<bool>,
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dot-abi-cli")
            .join("config.toml")
    }

    /// Load from default path
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::default_path();
        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Load from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let mut config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.settings.validate()?;

        // Relative catalog paths are relative to the config file
        if let (Some(catalog), Some(parent)) = (config.catalog.as_ref(), path.parent()) {
            if catalog.is_relative() {
                config.catalog = Some(parent.join(catalog));
            }
        }

        Ok(config)
    }

    /// Load an explicit path, or the default path if present
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_default()?.unwrap_or_default()),
        }
    }

    /// Command-building options carried by this file
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            contracts: self.contracts.clone(),
            methods: self.methods.clone(),
        }
    }
}
