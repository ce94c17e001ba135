//! Configuration: config file, command-building options and environment loading

mod file;
mod options;

pub use file::{ConfigFile, LedgerSettings, Settings};
pub use options::{BuildOptions, MethodOverride};

use std::path::PathBuf;

/// Variable selecting an environment-specific `.env.<name>` file
pub const ENV_SELECTOR: &str = "DOTCLI_ENV";

/// Load `.env` and, if `DOTCLI_ENV` is set, `.env.<DOTCLI_ENV>` from the
/// working directory. Variables already present in the process win.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    if let Ok(selector) = std::env::var(ENV_SELECTOR) {
        let path = PathBuf::from(format!(".env.{}", selector));
        if dotenvy::from_path(&path).is_ok() {
            loaded.push(path);
        }
    }

    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }

    loaded
}
