//! dot-abi-cli - call deployed contracts through commands generated from
//! their ABI and NatSpec

use dot_abi_cli::cli::app::{bootstrap_globals, App, Invocation};
use dot_abi_cli::cli::{info, ConfigCommands, GlobalArgs};
use dot_abi_cli::config::{self, ConfigFile};
use dot_abi_cli::output::exit_code;
use dot_abi_cli::rpc::mnemonic_override;
use dot_abi_cli::{
    Catalog, CommandRegistry, ConsoleReporter, DispatchEngine, ProviderResolver, Report, Reporter,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    // Before any parsing so env fallbacks see .env values
    let env_files = config::load_env_files();

    let argv: Vec<OsString> = std::env::args_os().collect();
    let boot = bootstrap_globals(argv.iter().cloned());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(boot.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    for path in &env_files {
        tracing::debug!("Loaded {}", path.display());
    }

    let config = ConfigFile::resolve(boot.config.as_deref())?;
    let registry = match catalog_path(&boot, &config) {
        Some(path) => load_registry(&path, &config)?,
        None => {
            tracing::warn!("No ABI file given (--abi-file or DOT_ABI_FILE); only built-in commands are available");
            CommandRegistry::default()
        }
    };

    let app = App::new(registry);
    let parsed = match app.try_parse_from(argv) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    };
    let globals = parsed.globals;

    // The registry and config were loaded from the bootstrap view of argv
    if globals.config != boot.config || globals.abi_file != boot.abi_file {
        anyhow::bail!(
            "--config/--abi-file could not be read unambiguously; pass them before the command name"
        );
    }

    // Connects lazily, on the first command that needs the node
    let mut resolver = ProviderResolver::new(globals.provider_config(&config));
    if let Some(phrase) = globals.mnemonic.clone() {
        tracing::debug!("Signing with mnemonic account {}", globals.hd_key_index);
        resolver = resolver.with_override(mnemonic_override(phrase, globals.hd_key_index));
    }

    let mut reporter = ConsoleReporter::stdio(globals.json, globals.quiet);
    let result = execute(parsed.invocation, app.registry(), &globals, &config, &resolver, &mut reporter).await;
    if let Err(e) = &result {
        Reporter::<serde_json::Value>::report(&mut reporter, Report::Failure(e));
    }

    Ok(exit_code(&result))
}

/// `--abi-file` / `DOT_ABI_FILE` first, then the config file
fn catalog_path(globals: &GlobalArgs, config: &ConfigFile) -> Option<PathBuf> {
    globals.abi_file.clone().or_else(|| config.catalog.clone())
}

fn load_registry(path: &Path, config: &ConfigFile) -> dot_abi_cli::Result<CommandRegistry> {
    let catalog = Catalog::load(path)?;
    for failure in &catalog.failures {
        tracing::warn!("{}", failure);
    }

    let registry = CommandRegistry::from_catalog(&catalog, &config.build_options());
    tracing::debug!(
        "Registered {} commands from {} contracts in {}",
        registry.len(),
        catalog.contracts.len(),
        path.display()
    );
    Ok(registry)
}

async fn execute(
    invocation: Invocation<'_>,
    registry: &CommandRegistry,
    globals: &GlobalArgs,
    config: &ConfigFile,
    resolver: &ProviderResolver,
    reporter: &mut ConsoleReporter,
) -> dot_abi_cli::Result<()> {
    match invocation {
        Invocation::Contract { command, args } => {
            // Argument errors surface before any network access
            let call = command.prepare(args, globals.value.is_some())?;
            let ctx = globals.invocation_context(config, resolver)?;
            let client = resolver.resolve().await?;

            if !globals.quiet {
                let verb = if call.function.is_constant { "Calling" } else { "Sending" };
                eprintln!("{} {}({})...", verb, command.spec.name, call.args.join(", "));
            }

            DispatchEngine::new(client, reporter)
                .with_poll_interval(resolver.config().watch.poll_interval)
                .dispatch(&call, &ctx)
                .await?;
            Ok(())
        }
        Invocation::Info => {
            let ctx = globals.invocation_context(config, resolver)?;
            let client = resolver.resolve().await?;
            info::run(registry, client, reporter, &ctx).await
        }
        Invocation::Config(action) => {
            handle_config(&action, globals.config.as_deref())?;
            Ok(())
        }
    }
}

fn handle_config(action: &ConfigCommands, explicit: Option<&Path>) -> dot_abi_cli::Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigFile::default_path);

    match action {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }

        ConfigCommands::Show => {
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                println!("# {}\n", path.display());
                println!("{}", content);
            } else {
                println!("No config file found at: {}", path.display());
                println!("\nCreate one with a catalog and defaults, for example:");
                println!("  catalog = \"Dotlicense.abi.json\"");
                println!("  contract_address = \"0x...\"");
            }
        }
    }

    Ok(())
}
