//! Command grammar derived from catalog metadata
//!
//! Pure transformation: no provider, no network. Every function that is
//! documented (by the catalog or by a caller override) becomes one command
//! whose positionals mirror the declared inputs, in declared order.

use crate::abi::{ContractDescriptor, FunctionDescriptor};
use crate::config::BuildOptions;

/// One positional parameter of a generated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalParam {
    /// Display name, one leading underscore stripped
    pub name: String,
    /// Original ABI name when it differs from `name`
    pub alias: Option<String>,
    pub help: Option<String>,
    /// Solidity type, for help output
    pub ty: String,
    /// Always true: every declared input must be supplied
    pub required: bool,
}

/// Command grammar for one contract function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub contract: String,
    /// `name(type1,type2)` of the underlying function
    pub signature: String,
    /// Subcommand name (the function name)
    pub name: String,
    /// `name <p1> <p2>`
    pub command_string: String,
    /// The resolved notice
    pub description: String,
    /// Developer details, shown in long help
    pub details: Option<String>,
    pub positional_params: Vec<PositionalParam>,
    /// Payable functions require `--value`
    pub requires_value_flag: bool,
}

/// Strip one leading underscore: `_who` -> `who`, `__x` -> `_x`
pub fn sanitize_param(name: &str) -> &str {
    name.strip_prefix('_').unwrap_or(name)
}

/// Build the command grammar for every eligible function of a contract.
///
/// Functions that are not `type: function`, are marked `skip`, or have no
/// notice in either the catalog or `options` produce no command. Name
/// collisions are not resolved here.
pub fn build(descriptor: &ContractDescriptor, options: &BuildOptions) -> Vec<CommandSpec> {
    descriptor
        .functions
        .iter()
        .filter(|f| f.is_function())
        .filter(|f| {
            let skipped = options.is_skipped(&f.signature);
            if skipped {
                tracing::debug!("Skipping {}.{} (skip)", descriptor.name, f.signature);
            }
            !skipped
        })
        .filter_map(|f| build_one(descriptor, f, options))
        .collect()
}

fn build_one(
    descriptor: &ContractDescriptor,
    function: &FunctionDescriptor,
    options: &BuildOptions,
) -> Option<CommandSpec> {
    let notice = descriptor
        .notices
        .get(&function.signature)
        .map(String::as_str)
        .or_else(|| options.notice_for(&function.signature));

    // Documentation is mandatory
    let Some(notice) = notice else {
        tracing::debug!("No notice for {}.{}", descriptor.name, function.signature);
        return None;
    };

    let dev_doc = descriptor.dev_docs.get(&function.signature);

    let positional_params: Vec<PositionalParam> = function
        .inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let name = match sanitize_param(&input.name) {
                "" => format!("arg{}", i),
                sanitized => sanitized.to_string(),
            };
            let alias = (!input.name.is_empty() && input.name != name).then(|| input.name.clone());

            let help = dev_doc
                .and_then(|d| d.params.get(&input.name).or_else(|| d.params.get(&name)))
                .map(String::as_str)
                .or_else(|| options.param_doc(&function.signature, &input.name))
                .or_else(|| options.param_doc(&function.signature, &name))
                .map(str::to_string);

            PositionalParam {
                name,
                alias,
                help,
                ty: input.canonical_type(),
                required: true,
            }
        })
        .collect();

    let mut command_string = function.name.clone();
    for param in &positional_params {
        command_string.push_str(&format!(" <{}>", param.name));
    }

    Some(CommandSpec {
        contract: descriptor.name.clone(),
        signature: function.signature.clone(),
        name: function.name.clone(),
        command_string,
        description: notice.to_string(),
        details: dev_doc.and_then(|d| d.details.clone()),
        positional_params,
        requires_value_flag: function.is_payable,
    })
}
