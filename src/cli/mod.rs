//! Command-line surface
//!
//! The subcommands are not known at compile time: they are generated from the
//! catalog ([`spec`]), registered with their codecs ([`registry`]) and turned
//! into a clap command tree ([`app`]). Global flags and the built-in commands
//! are ordinary clap derives.

pub mod app;
pub mod info;
pub mod registry;
pub mod spec;

use crate::config::ConfigFile;
use crate::dispatch::InvocationContext;
use crate::error::{ConfigError, Result};
use crate::rpc::{ProviderConfig, ProviderResolver, WatchConfig, DEFAULT_HD_PATH, DEFAULT_RPC_URL};
use alloy::primitives::{Address, U256};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Flags accepted by every command
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Combined ABI + NatSpec file (solc --combined-json abi,devdoc,userdoc)
    #[arg(long, env = "DOT_ABI_FILE", global = true, value_name = "PATH")]
    pub abi_file: Option<PathBuf>,

    /// Config file (default: ~/.config/dot-abi-cli/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint [default: http://localhost:8545]
    #[arg(long, visible_alias = "web3", env = "WEB3_PROVIDER_URL", global = true, value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Address of the deployed contract
    #[arg(long, env = "CONTRACT_ADDRESS", global = true, value_name = "ADDRESS")]
    pub contract_address: Option<String>,

    /// Sender address (default: first account of the node or signer)
    #[arg(long, env = "SENDER_ADDRESS", global = true, value_name = "ADDRESS")]
    pub from: Option<String>,

    /// Gas price in wei
    #[arg(long, env = "GAS_PRICE", global = true, value_name = "WEI")]
    pub gas_price: Option<u128>,

    /// Gas limit
    #[arg(long, env = "GAS_LIMIT", global = true)]
    pub gas_limit: Option<u64>,

    /// Wei to send with a payable function
    #[arg(long, global = true, value_name = "WEI")]
    pub value: Option<String>,

    /// Chain id used for signing (default: ask the node)
    #[arg(long, env = "NETWORK_ID", global = true)]
    pub network_id: Option<u64>,

    /// Sign with a Ledger hardware wallet
    #[arg(long, global = true)]
    pub ledger: bool,

    /// HD derivation path for the hardware wallet [default: m/44'/60'/0'/0]
    #[arg(long, global = true, value_name = "PATH")]
    pub hd_path: Option<String>,

    /// Show each request before the device asks for confirmation [default: true]
    #[arg(
        long,
        global = true,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub hardware_confirm: Option<bool>,

    /// Mnemonic of a local HD wallet to sign with
    #[arg(long, env = "KEY_MNEMONIC", global = true, hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Account index within the HD wallet
    #[arg(long, env = "HD_KEY_IDX", global = true, default_value_t = 0)]
    pub hd_key_index: u32,

    /// Print results and events as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Built-in `config` subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Show config file path
    Path,

    /// Show current config
    Show,
}

impl GlobalArgs {
    /// Log filter for the verbosity count
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Connection settings: flags and env first, then the config file
    pub fn provider_config(&self, config: &ConfigFile) -> ProviderConfig {
        ProviderConfig {
            rpc_url: self
                .rpc_url
                .clone()
                .or_else(|| config.rpc_url.clone())
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            hardware_wallet: self.ledger,
            hd_path: self
                .hd_path
                .clone()
                .or_else(|| config.ledger.hd_path.clone())
                .unwrap_or_else(|| DEFAULT_HD_PATH.to_string()),
            hd_key_index: self.hd_key_index,
            hardware_confirm: self
                .hardware_confirm
                .or(config.ledger.hardware_confirm)
                .unwrap_or(true),
            chain_id: self.network_id,
            timeout: Duration::from_secs(config.settings.timeout_seconds),
            watch: WatchConfig {
                poll_interval: Duration::from_secs(config.settings.poll_interval_secs),
                block_timeout: config.settings.confirmation_blocks,
            },
        }
    }

    /// Contract address, required for contract calls
    pub fn contract_address(&self, config: &ConfigFile) -> Result<Address> {
        let raw = self
            .contract_address
            .as_deref()
            .or(config.contract_address.as_deref())
            .ok_or_else(|| {
                ConfigError::MissingField(
                    "contract address (--contract-address or CONTRACT_ADDRESS)".to_string(),
                )
            })?;
        parse_address(raw)
    }

    /// Per-call settings for the dispatcher
    pub fn invocation_context(&self, config: &ConfigFile, resolver: &ProviderResolver) -> Result<InvocationContext> {
        let sender = self.from.as_deref().map(parse_address).transpose()?;
        let value = self
            .value
            .as_deref()
            .map(|v| {
                U256::from_str(v).map_err(|_| ConfigError::InvalidNumber {
                    field: "value",
                    value: v.to_string(),
                })
            })
            .transpose()?;

        Ok(InvocationContext {
            contract_address: self.contract_address(config)?,
            sender,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            value,
            device_confirmation: resolver.device_confirmation(),
        })
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|_| ConfigError::InvalidAddress(raw.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_flags_win_over_config() {
        let config: ConfigFile = toml::from_str(
            r#"
rpc_url = "http://config:8545"
contract_address = "0x000000000000000000000000000000000000c0de"

[settings]
poll_interval_secs = 7
confirmation_blocks = 12

[ledger]
hd_path = "m/44'/60'/1'/0"
hardware_confirm = false
"#,
        )
        .unwrap();

        let args = GlobalArgs {
            rpc_url: Some("http://flag:8545".into()),
            ledger: true,
            ..Default::default()
        };
        let provider = args.provider_config(&config);
        assert_eq!(provider.rpc_url, "http://flag:8545");
        assert_eq!(provider.hd_path, "m/44'/60'/1'/0");
        assert!(!provider.hardware_confirm);
        assert_eq!(provider.watch.poll_interval, Duration::from_secs(7));
        assert_eq!(provider.watch.block_timeout, 12);

        let ctx = args
            .invocation_context(&config, &ProviderResolver::new(provider))
            .unwrap();
        assert_eq!(
            ctx.contract_address,
            "0x000000000000000000000000000000000000c0de".parse::<Address>().unwrap()
        );
        assert!(!ctx.device_confirmation);
    }

    #[test]
    fn test_defaults() {
        let provider = GlobalArgs::default().provider_config(&ConfigFile::default());
        assert_eq!(provider.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(provider.hd_path, DEFAULT_HD_PATH);
        assert!(provider.hardware_confirm);
        assert!(!provider.hardware_wallet);
    }

    #[test]
    fn test_missing_contract_address() {
        let args = GlobalArgs::default();
        let config = ConfigFile::default();
        let resolver = ProviderResolver::new(args.provider_config(&config));
        assert!(matches!(
            args.invocation_context(&config, &resolver),
            Err(Error::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_value_and_sender_parsing() {
        let args = GlobalArgs {
            contract_address: Some("0x000000000000000000000000000000000000c0de".into()),
            from: Some("0x000000000000000000000000000000000000beef".into()),
            value: Some("1000000000000000000".into()),
            ..Default::default()
        };
        let config = ConfigFile::default();
        let ctx = args
            .invocation_context(&config, &ProviderResolver::new(args.provider_config(&config)))
            .unwrap();
        assert_eq!(ctx.value, Some(U256::from(10u64).pow(U256::from(18u64))));
        assert!(ctx.sender.is_some());

        let bad = GlobalArgs {
            value: Some("lots".into()),
            ..args
        };
        assert!(matches!(
            bad.invocation_context(&config, &ProviderResolver::new(bad.provider_config(&config))),
            Err(Error::Config(ConfigError::InvalidNumber { field: "value", .. }))
        ));
    }

    #[test]
    fn test_log_filter() {
        let mut args = GlobalArgs::default();
        assert_eq!(args.log_filter(), "warn");
        args.verbose = 2;
        assert_eq!(args.log_filter(), "debug");
        args.verbose = 9;
        assert_eq!(args.log_filter(), "trace");
    }
}
