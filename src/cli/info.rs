//! `info` built-in: every documented zero-argument getter plus the balance

use super::registry::CommandRegistry;
use crate::abi::format_value;
use crate::dispatch::{DispatchEngine, InvocationContext};
use crate::error::{ReadError, Result};
use crate::output::{Report, Reporter};
use crate::rpc::LedgerClient;
use alloy::primitives::utils::format_ether;

/// Read all getters and report them as one summary. A failing getter is
/// shown inline; only a failed balance lookup fails the command.
pub async fn run<C, P>(
    registry: &CommandRegistry,
    client: &C,
    reporter: &mut P,
    ctx: &InvocationContext,
) -> Result<()>
where
    C: LedgerClient,
    P: Reporter<C::Receipt>,
{
    let mut rows = Vec::new();

    {
        let engine = DispatchEngine::new(client, reporter);
        for command in registry.iter() {
            if !command.function.is_constant || !command.function.inputs.is_empty() {
                continue;
            }

            let call = command.prepare(Vec::new(), false)?;
            let value = match engine.read(&call, ctx).await {
                Ok(values) => values.iter().map(format_value).collect::<Vec<_>>().join(", "),
                Err(e) => {
                    tracing::warn!("{} failed: {}", command.function.signature, e);
                    format!("<error: {}>", e)
                }
            };
            rows.push((command.spec.name.clone(), value));
        }
    }

    let balance = client
        .balance(ctx.contract_address)
        .await
        .map_err(|source| ReadError {
            function: "getBalance".to_string(),
            source,
        })?;
    rows.push(("balance (wei)".to_string(), balance.to_string()));
    rows.push(("balance (ether)".to_string(), format_ether(balance)));

    let title = format!("Contract {}", ctx.contract_address.to_checksum(None));
    reporter.report(Report::Summary {
        title: &title,
        rows: &rows,
    });
    Ok(())
}
