//! Result and lifecycle reporting
//!
//! Every lifecycle event is written the moment it is observed, so a slow
//! write keeps giving feedback. Results go to stdout, progress and errors to
//! stderr. With `--json` each stdout line is one JSON object.

use crate::abi::{format_value, value_to_json, FunctionDescriptor};
use crate::error::{Error, Result};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::TxHash;
use serde::Serialize;
use std::io::{self, Stderr, Stdout, Write};
use std::process::ExitCode;

/// Something worth telling the user
#[derive(Debug)]
pub enum Report<'a, R> {
    /// Decoded return values of a read
    ReadResult {
        function: &'a FunctionDescriptor,
        values: &'a [DynSolValue],
    },
    /// Request about to be sent to a hardware signer
    DeviceConfirmation(&'a serde_json::Value),
    TransactionHash(TxHash),
    Receipt(&'a R),
    Confirmation {
        confirmations: u64,
        receipt: &'a R,
    },
    /// Watcher gave up; polling for the receipt of this hash
    SlowConfirmation(TxHash),
    /// Labelled rows, e.g. contract info
    Summary {
        title: &'a str,
        rows: &'a [(String, String)],
    },
    Failure(&'a Error),
}

/// Sink for [`Report`]s
pub trait Reporter<R> {
    fn report(&mut self, event: Report<'_, R>);
}

/// Reporter writing to a pair of streams, stdout/stderr by default
pub struct ConsoleReporter<O: Write = Stdout, E: Write = Stderr> {
    out: O,
    err: E,
    json: bool,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn stdio(json: bool, quiet: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), json, quiet)
    }
}

impl<O: Write, E: Write> ConsoleReporter<O, E> {
    pub fn new(out: O, err: E, json: bool, quiet: bool) -> Self {
        Self {
            out,
            err,
            json,
            quiet,
        }
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }

    fn event_line<P: Serialize>(&mut self, event: &str, payload: P) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(&EventLine { event, payload })
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(self.out, "{}", line)
        } else {
            let text = match serde_json::to_value(&payload) {
                Ok(serde_json::Value::String(s)) => s,
                Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                Err(e) => format!("<unserializable: {}>", e),
            };
            writeln!(self.out, "{}: {}", event, text)
        }
    }

    fn read_result(&mut self, function: &FunctionDescriptor, values: &[DynSolValue]) -> io::Result<()> {
        if self.json {
            let payload = match values {
                [] => serde_json::Value::Null,
                [single] => value_to_json(single),
                _ => {
                    let mut map = serde_json::Map::new();
                    for (i, value) in values.iter().enumerate() {
                        map.insert(output_name(function, i), value_to_json(value));
                    }
                    serde_json::Value::Object(map)
                }
            };
            return writeln!(self.out, "{}", payload);
        }

        match values {
            [] => writeln!(self.out, "(no return value)"),
            [single] => writeln!(self.out, "{}", format_value(single)),
            _ => {
                for (i, value) in values.iter().enumerate() {
                    writeln!(self.out, "{}: {}", output_name(function, i), format_value(value))?;
                }
                Ok(())
            }
        }
    }

    fn summary(&mut self, title: &str, rows: &[(String, String)]) -> io::Result<()> {
        if self.json {
            let map: serde_json::Map<String, serde_json::Value> = rows
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            return writeln!(self.out, "{}", serde_json::Value::Object(map));
        }

        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        writeln!(self.out, "{}", title)?;
        writeln!(self.out, "{}", "─".repeat(50))?;
        for (key, value) in rows {
            writeln!(self.out, "{:width$}  {}", key, value, width = width)?;
        }
        Ok(())
    }

    fn failure(&mut self, error: &Error) -> io::Result<()> {
        writeln!(self.err, "Error: {}", error)?;
        if let Error::Write(write) = error {
            if let Some(hash) = write.tx_hash() {
                writeln!(
                    self.err,
                    "Transaction hash {:#x} was already issued; check its status on a block explorer",
                    hash
                )?;
            }
        }
        Ok(())
    }

    fn write_report<R: Serialize>(&mut self, event: Report<'_, R>) -> io::Result<()> {
        match event {
            Report::ReadResult { function, values } => self.read_result(function, values),
            Report::DeviceConfirmation(request) => {
                if self.quiet {
                    return Ok(());
                }
                writeln!(self.err, "Please confirm transaction on device:")?;
                writeln!(
                    self.err,
                    "{}",
                    serde_json::to_string_pretty(request).unwrap_or_else(|_| request.to_string())
                )
            }
            // Always shown: the hash is the user's handle on the transaction
            Report::TransactionHash(hash) => self.event_line("transactionHash", format!("{:#x}", hash)),
            Report::Receipt(receipt) => self.event_line("receipt", receipt),
            Report::Confirmation {
                confirmations,
                receipt,
            } => self.event_line(
                "confirmation",
                ConfirmationPayload {
                    confirmations,
                    receipt,
                },
            ),
            Report::SlowConfirmation(hash) => {
                if !self.quiet {
                    writeln!(
                        self.err,
                        "Transaction {:#x} is taking a while to be mined, polling for its receipt...",
                        hash
                    )?;
                }
                self.event_line("slowConfirmation", format!("{:#x}", hash))
            }
            Report::Summary { title, rows } => self.summary(title, rows),
            Report::Failure(error) => self.failure(error),
        }
    }
}

impl<R: Serialize, O: Write, E: Write> Reporter<R> for ConsoleReporter<O, E> {
    fn report(&mut self, event: Report<'_, R>) {
        let result = self
            .write_report(event)
            .and_then(|_| self.out.flush())
            .and_then(|_| self.err.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to write output: {}", e);
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a, P> {
    event: &'a str,
    payload: P,
}

#[derive(Serialize)]
struct ConfirmationPayload<'a, R> {
    confirmations: u64,
    receipt: &'a R,
}

fn output_name(function: &FunctionDescriptor, index: usize) -> String {
    match function.outputs.get(index) {
        Some(param) if !param.name.is_empty() => param.name.clone(),
        _ => format!("[{}]", index),
    }
}

/// Process exit status for a terminal outcome
pub fn exit_code<T>(result: &Result<T>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
