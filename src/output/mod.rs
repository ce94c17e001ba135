//! User-facing output

mod reporter;

pub use reporter::{exit_code, ConsoleReporter, Report, Reporter};
