//! Full command tree: global flags, built-ins and the registered contract
//! commands

use super::registry::{CommandRegistry, RegisteredCommand};
use super::{ConfigCommands, GlobalArgs};
use clap::builder::ValueRange;
use clap::{ArgMatches, Args, Command, FromArgMatches, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;

const AFTER_HELP: &str = r#"EXAMPLES:
    # List the commands generated from a combined ABI file
    dot-abi-cli --abi-file build/Dotlicense.abi.json --help

    # Read a value
    dot-abi-cli --contract-address 0x... balanceOf 0x...

    # Send a payable transaction from a Ledger
    dot-abi-cli --ledger --value 1000000000000000 purchase 1 1 0x... 0x...

    # Summarize a contract
    dot-abi-cli info

ENVIRONMENT VARIABLES:
    DOT_ABI_FILE         Combined ABI + NatSpec file
    WEB3_PROVIDER_URL    JSON-RPC endpoint
    CONTRACT_ADDRESS     Deployed contract address
    KEY_MNEMONIC         Sign with an HD wallet (account HD_KEY_IDX)
    DOTCLI_ENV           Also load .env.<DOTCLI_ENV>

CONFIG FILE:
    Default: ~/.config/dot-abi-cli/config.toml
"#;

/// What the user asked for
#[derive(Debug)]
pub enum Invocation<'a> {
    Contract {
        command: &'a RegisteredCommand,
        args: Vec<String>,
    },
    Info,
    Config(ConfigCommands),
}

/// Parsed command line
#[derive(Debug)]
pub struct Parsed<'a> {
    pub globals: GlobalArgs,
    pub invocation: Invocation<'a>,
}

/// Command-line application over a command registry
pub struct App {
    registry: CommandRegistry,
}

impl App {
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Top-level command with global flags only
    fn base() -> Command {
        let cmd = Command::new("dot-abi-cli")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Call deployed contracts through commands generated from their ABI and NatSpec")
            .after_help(AFTER_HELP);
        GlobalArgs::augment_args(cmd)
    }

    /// Long flags the generated commands must not reuse
    fn reserved_longs(cmd: &Command) -> BTreeSet<String> {
        let mut reserved: BTreeSet<String> = ["help", "version"].iter().map(|s| s.to_string()).collect();
        for arg in cmd.get_arguments() {
            if let Some(long) = arg.get_long() {
                reserved.insert(long.to_string());
            }
            if let Some(aliases) = arg.get_all_aliases() {
                reserved.extend(aliases.into_iter().map(str::to_string));
            }
        }
        reserved
    }

    /// The complete clap command
    pub fn command(&self) -> Command {
        let base = Self::base();
        let reserved = Self::reserved_longs(&base);

        let config = ConfigCommands::augment_subcommands(
            Command::new("config")
                .about("Manage configuration")
                .subcommand_required(true),
        );
        let info = Command::new("info")
            .about("Read every documented zero-argument getter and the contract balance");

        let mut cmd = base
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(info)
            .subcommand(config);
        for command in self.registry.iter() {
            cmd = cmd.subcommand(command.subcommand(&reserved));
        }
        cmd
    }

    /// Parse a full command line
    pub fn try_parse_from<I, T>(&self, argv: I) -> Result<Parsed<'_>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = self.command();
        let matches = cmd.try_get_matches_from_mut(argv)?;
        self.from_matches(&mut cmd, &matches)
    }

    fn from_matches(&self, cmd: &mut Command, matches: &ArgMatches) -> Result<Parsed<'_>, clap::Error> {
        let globals = GlobalArgs::from_arg_matches(matches)?;

        let invocation = match matches.subcommand() {
            Some(("info", _)) => Invocation::Info,
            Some(("config", sub)) => Invocation::Config(ConfigCommands::from_arg_matches(sub)?),
            Some((name, sub)) => {
                let command = self.registry.get(name).ok_or_else(|| {
                    cmd.error(
                        clap::error::ErrorKind::InvalidSubcommand,
                        format!("unknown command '{}'", name),
                    )
                })?;
                let args = command.collect_args(sub).map_err(|e| {
                    cmd.error(clap::error::ErrorKind::MissingRequiredArgument, e.to_string())
                })?;
                Invocation::Contract { command, args }
            }
            None => {
                return Err(cmd.error(
                    clap::error::ErrorKind::MissingSubcommand,
                    "a command is required",
                ))
            }
        };

        Ok(Parsed { globals, invocation })
    }
}

/// Tolerant parse of the global flags only, used to locate the catalog and
/// config file before the full command tree can be built. Global flags are
/// picked out of `argv` wherever they appear, including after the command.
pub fn bootstrap_globals<I, T>(argv: I) -> GlobalArgs
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut cmd = App::base()
        .ignore_errors(true)
        .disable_help_flag(true)
        .disable_version_flag(true);
    cmd.build();

    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let tokens = global_tokens(&cmd, &argv);

    cmd.try_get_matches_from(tokens)
        .ok()
        .and_then(|matches| GlobalArgs::from_arg_matches(&matches).ok())
        .unwrap_or_default()
}

/// Program name plus every token belonging to a flag of `cmd`
fn global_tokens(cmd: &Command, argv: &[OsString]) -> Vec<OsString> {
    let mut longs: BTreeMap<String, ValueRange> = BTreeMap::new();
    let mut shorts: BTreeMap<char, ValueRange> = BTreeMap::new();
    for arg in cmd.get_arguments().filter(|a| !a.is_positional()) {
        let range = arg.get_num_args().unwrap_or(ValueRange::SINGLE);
        if let Some(long) = arg.get_long() {
            longs.insert(long.to_string(), range);
        }
        if let Some(aliases) = arg.get_all_aliases() {
            longs.extend(aliases.into_iter().map(|a| (a.to_string(), range)));
        }
        if let Some(short) = arg.get_short() {
            shorts.insert(short, range);
        }
    }

    let mut kept: Vec<OsString> = argv.iter().take(1).cloned().collect();
    let mut tokens = argv.iter().skip(1).peekable();
    while let Some(token) = tokens.next() {
        let Some(text) = token.to_str() else {
            continue;
        };
        if text == "--" {
            break;
        }

        let range = if let Some(flag) = text.strip_prefix("--") {
            match flag.split_once('=') {
                Some((name, _)) if longs.contains_key(name) => {
                    kept.push(token.clone());
                    continue;
                }
                _ => longs.get(flag).copied(),
            }
        } else if let Some(cluster) = text.strip_prefix('-').filter(|c| !c.is_empty()) {
            // Only clusters made entirely of known value-less shorts (`-vv`, `-vq`)
            let all_flags = cluster
                .chars()
                .all(|c| shorts.get(&c).is_some_and(|r| !r.takes_values()));
            if all_flags {
                kept.push(token.clone());
            }
            continue;
        } else {
            None
        };

        let Some(range) = range else {
            continue;
        };
        kept.push(token.clone());

        if range.takes_values() {
            let next = tokens.peek().and_then(|t| t.to_str());
            let take = if range.min_values() == 0 {
                // Optional values are only consumed in their literal form
                matches!(next, Some("true") | Some("false"))
            } else {
                next.is_some()
            };
            if take {
                if let Some(value) = tokens.next() {
                    kept.push(value.clone());
                }
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Catalog;
    use crate::config::BuildOptions;
    use serde_json::json;

    fn app() -> App {
        let combined = json!({
            "contracts": {
                "LicenseSale.sol:LicenseSale": {
                    "abi": [
                        {"type": "function", "name": "balanceOf", "inputs": [{"name": "_owner", "type": "address"}], "outputs": [{"name": "", "type": "uint256"}], "stateMutability": "view"},
                        {"type": "function", "name": "transfer", "inputs": [{"name": "_to", "type": "address"}, {"name": "_tokenId", "type": "uint256"}], "outputs": [], "stateMutability": "nonpayable"},
                        {"type": "function", "name": "setValue", "inputs": [{"name": "value", "type": "uint256"}], "outputs": [], "stateMutability": "nonpayable"}
                    ],
                    "userdoc": {"methods": {
                        "balanceOf(address)": {"notice": "Count licenses"},
                        "transfer(address,uint256)": {"notice": "Transfer a license"},
                        "setValue(uint256)": {"notice": "Set the value"}
                    }}
                }
            }
        });
        let catalog = Catalog::from_json_str(&combined.to_string()).unwrap();
        App::new(CommandRegistry::from_catalog(&catalog, &BuildOptions::default()))
    }

    #[test]
    fn test_command_tree_is_valid() {
        app().command().debug_assert();
    }

    #[test]
    fn test_parse_contract_command() {
        let app = app();
        let parsed = app
            .try_parse_from([
                "dot-abi-cli",
                "--contract-address",
                "0x000000000000000000000000000000000000c0de",
                "transfer",
                "0x000000000000000000000000000000000000dEaD",
                "7",
                "--gas-limit",
                "90000",
            ])
            .unwrap();

        assert_eq!(parsed.globals.gas_limit, Some(90000));
        match parsed.invocation {
            Invocation::Contract { command, args } => {
                assert_eq!(command.spec.name, "transfer");
                assert_eq!(args, vec!["0x000000000000000000000000000000000000dEaD", "7"]);
            }
            other => panic!("unexpected invocation {:?}", other),
        }
    }

    #[test]
    fn test_param_named_like_global_flag() {
        let app = app();
        let parsed = app
            .try_parse_from(["dot-abi-cli", "setValue", "5", "--value", "10"])
            .unwrap();

        assert_eq!(parsed.globals.value.as_deref(), Some("10"));
        match parsed.invocation {
            Invocation::Contract { args, .. } => assert_eq!(args, vec!["5"]),
            other => panic!("unexpected invocation {:?}", other),
        }
    }

    #[test]
    fn test_builtins() {
        let app = app();
        let parsed = app.try_parse_from(["dot-abi-cli", "info"]).unwrap();
        assert!(matches!(parsed.invocation, Invocation::Info));

        let parsed = app.try_parse_from(["dot-abi-cli", "config", "path"]).unwrap();
        assert!(matches!(parsed.invocation, Invocation::Config(ConfigCommands::Path)));
    }

    #[test]
    fn test_missing_argument() {
        let app = app();
        let err = app.try_parse_from(["dot-abi-cli", "balanceOf"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_unknown_command() {
        let app = app();
        let err = app.try_parse_from(["dot-abi-cli", "mint", "1"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_bootstrap_ignores_unknown_commands() {
        let globals = bootstrap_globals([
            "dot-abi-cli",
            "--abi-file",
            "custom.json",
            "purchase",
            "1",
            "--ledger",
            "--help",
        ]);
        assert_eq!(globals.abi_file.as_deref(), Some(std::path::Path::new("custom.json")));
        assert!(globals.ledger);
    }

    #[test]
    fn test_bootstrap_finds_flags_after_command() {
        let globals = bootstrap_globals([
            "dot-abi-cli",
            "balanceOf",
            "0x000000000000000000000000000000000000dEaD",
            "--help",
            "--abi-file",
            "custom.json",
            "--config=prod.toml",
            "-vv",
        ]);
        assert_eq!(globals.abi_file.as_deref(), Some(std::path::Path::new("custom.json")));
        assert_eq!(globals.config.as_deref(), Some(std::path::Path::new("prod.toml")));
        assert_eq!(globals.verbose, 2);
    }

    #[test]
    fn test_bootstrap_skips_command_arguments() {
        let globals = bootstrap_globals([
            "dot-abi-cli",
            "--hardware-confirm",
            "setPrice",
            "-5",
            "--productId",
            "1",
            "--config",
            "prod.toml",
            "--",
            "--abi-file",
            "ignored.json",
        ]);
        assert_eq!(globals.hardware_confirm, Some(true));
        assert_eq!(globals.config.as_deref(), Some(std::path::Path::new("prod.toml")));
        assert_eq!(globals.abi_file, None);
        assert_eq!(globals.verbose, 0);
    }

    #[test]
    fn test_bootstrap_agrees_with_full_parse() {
        let app = app();
        let argv = [
            "dot-abi-cli",
            "transfer",
            "0x000000000000000000000000000000000000dEaD",
            "7",
            "--config",
            "prod.toml",
            "--gas-limit",
            "90000",
        ];
        let parsed = app.try_parse_from(argv).unwrap();
        let boot = bootstrap_globals(argv);
        assert_eq!(boot.config, parsed.globals.config);
        assert_eq!(boot.gas_limit, parsed.globals.gas_limit);
    }
}
