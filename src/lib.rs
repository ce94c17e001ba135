//! dot-abi-cli - command-line interfaces generated from contract ABIs
//!
//! Reads a solc combined-json file (`abi,devdoc,userdoc`), turns every
//! documented function into a subcommand with positional arguments, and
//! dispatches each invocation as a read (`eth_call`) or as a transaction that
//! is followed until it is confirmed.
//!
//! # Example
//!
//! ```rust,no_run
//! use dot_abi_cli::{
//!     BuildOptions, Catalog, CommandRegistry, ConsoleReporter, DispatchEngine,
//!     InvocationContext, ProviderConfig, ProviderResolver,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::load(Path::new("Dotlicense.abi.json"))?;
//!     let registry = CommandRegistry::from_catalog(&catalog, &BuildOptions::default());
//!
//!     let resolver = ProviderResolver::new(ProviderConfig::default());
//!     let client = resolver.resolve().await?;
//!
//!     let command = registry.get("owner").ok_or("no owner() command")?;
//!     let call = command.prepare(vec![], false)?;
//!     let ctx = InvocationContext {
//!         contract_address: "0x000000000000000000000000000000000000c0de".parse()?,
//!         ..Default::default()
//!     };
//!
//!     let mut reporter = ConsoleReporter::stdio(false, false);
//!     DispatchEngine::new(client, &mut reporter).dispatch(&call, &ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod abi;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod output;
pub mod rpc;

// Re-exports for convenience
pub use abi::{CallCodec, Catalog, ContractDescriptor, FunctionDescriptor, MethodDevDoc, Param};
pub use cli::registry::{CommandRegistry, RegisteredCommand};
pub use cli::spec::{CommandSpec, PositionalParam};
pub use config::{BuildOptions, ConfigFile, MethodOverride, Settings};
pub use dispatch::{DispatchEngine, InvocationContext, Outcome, PreparedCall, WriteLifecycle};
pub use error::{
    AbiError, CatalogError, ConfigError, Error, ProviderError, ReadError, Result, RpcError,
    WriteError,
};
pub use output::{ConsoleReporter, Report, Reporter};
pub use rpc::{AlloyClient, LedgerClient, ProviderConfig, ProviderResolver, TxEvent};
