//! Registered contract commands
//!
//! Holds one [`RegisteredCommand`] per generated subcommand: the grammar, the
//! function it calls and the codec built for it. Registration is first-wins
//! in contract-name order; later commands with a taken name are skipped with
//! a warning.

use super::spec::{self, CommandSpec, PositionalParam};
use crate::abi::{CallCodec, Catalog, FunctionDescriptor};
use crate::config::BuildOptions;
use crate::dispatch::PreparedCall;
use crate::error::AbiError;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::{BTreeMap, BTreeSet};

/// Names owned by built-in subcommands
pub const BUILTIN_COMMANDS: &[&str] = &["info", "config", "help"];

/// One generated subcommand
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub spec: CommandSpec,
    pub function: FunctionDescriptor,
    pub codec: CallCodec,
}

impl RegisteredCommand {
    pub fn new(spec: CommandSpec, function: FunctionDescriptor) -> Result<Self, AbiError> {
        let codec = CallCodec::new(&function)?;
        Ok(Self {
            spec,
            function,
            codec,
        })
    }

    fn positional_id(param: &PositionalParam) -> String {
        format!("arg:{}", param.name)
    }

    fn named_id(param: &PositionalParam) -> String {
        format!("named:{}", param.name)
    }

    /// clap subcommand for this function. Named `--param` forms are only added
    /// when neither the name nor the alias is in `reserved`.
    pub fn subcommand(&self, reserved: &BTreeSet<String>) -> Command {
        let spec = &self.spec;
        let mut cmd = Command::new(spec.name.clone())
            .about(spec.description.clone())
            .allow_negative_numbers(true);

        let mut long_about = spec.description.clone();
        if let Some(details) = &spec.details {
            long_about.push_str("\n\n");
            long_about.push_str(details);
        }
        cmd = cmd.long_about(long_about);

        if spec.requires_value_flag {
            cmd = cmd.after_help("Payable: pass the amount to send with --value <WEI>");
        }

        for (i, param) in spec.positional_params.iter().enumerate() {
            let help = match &param.help {
                Some(help) => format!("{} ({})", help, param.ty),
                None => param.ty.clone(),
            };

            let mut positional = Arg::new(Self::positional_id(param))
                .value_name(param.name.clone())
                .help(help)
                .index(i + 1)
                .action(ArgAction::Set);

            let shadows = reserved.contains(&param.name)
                || param.alias.as_ref().is_some_and(|a| reserved.contains(a));
            if shadows {
                // Left optional for clap; a missing value surfaces from collect_args
                tracing::debug!(
                    "{}: --{} would shadow a global flag, positional only",
                    spec.name,
                    param.name
                );
            } else {
                let mut named = Arg::new(Self::named_id(param))
                    .long(param.name.clone())
                    .value_name(param.name.clone())
                    .help(format!("Same as <{}>", param.name))
                    .conflicts_with(Self::positional_id(param))
                    .action(ArgAction::Set)
                    .hide(true);
                if let Some(alias) = &param.alias {
                    named = named.alias(alias.clone());
                }
                if param.required {
                    positional = positional.required_unless_present(Self::named_id(param));
                }
                cmd = cmd.arg(named);
            }

            cmd = cmd.arg(positional);
        }

        cmd
    }

    /// Argument strings in declared order, from either form
    pub fn collect_args(&self, matches: &ArgMatches) -> Result<Vec<String>, AbiError> {
        self.spec
            .positional_params
            .iter()
            .map(|param| {
                let value = matches
                    .try_get_one::<String>(&Self::positional_id(param))
                    .ok()
                    .flatten()
                    .or_else(|| {
                        matches
                            .try_get_one::<String>(&Self::named_id(param))
                            .ok()
                            .flatten()
                    });
                value
                    .cloned()
                    .ok_or_else(|| AbiError::MissingArgument(param.name.clone()))
            })
            .collect()
    }

    /// Coerce `args` into a dispatchable call. Payable functions need a value.
    pub fn prepare(&self, args: Vec<String>, value_supplied: bool) -> Result<PreparedCall<'_>, AbiError> {
        if self.spec.requires_value_flag && !value_supplied {
            return Err(AbiError::MissingValue(self.spec.name.clone()));
        }
        PreparedCall::new(&self.spec, &self.function, &self.codec, args)
    }
}

/// All generated commands, by name
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Build and register commands for every selected contract. Contracts are
    /// visited in name order, so on a collision the alphabetically first wins.
    pub fn from_catalog(catalog: &Catalog, options: &BuildOptions) -> Self {
        let mut registry = Self::default();

        for contract in catalog.select(options.contracts.as_deref()) {
            for spec in spec::build(contract, options) {
                let Some(function) = contract.function(&spec.signature) else {
                    continue;
                };
                match RegisteredCommand::new(spec, function.clone()) {
                    Ok(command) => {
                        registry.register(command);
                    }
                    Err(e) => tracing::debug!("Skipping {}.{}: {}", contract.name, function.signature, e),
                }
            }
        }

        registry
    }

    /// Add a command unless its name is taken. Returns whether it was added.
    pub fn register(&mut self, command: RegisteredCommand) -> bool {
        let name = command.spec.name.clone();

        if BUILTIN_COMMANDS.contains(&name.as_str()) {
            tracing::warn!(
                "{}.{} shadows the built-in '{}' command, skipped",
                command.spec.contract,
                command.spec.signature,
                name
            );
            return false;
        }

        if let Some(existing) = self.commands.get(&name) {
            tracing::warn!(
                "{}.{} collides with {}.{}, skipped",
                command.spec.contract,
                command.spec.signature,
                existing.spec.contract,
                existing.spec.signature
            );
            return false;
        }

        self.commands.insert(name, command);
        true
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
