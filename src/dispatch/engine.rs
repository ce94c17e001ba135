//! Dispatch engine: executes reads, drives writes to confirmation

use super::lifecycle::{Transition, WriteLifecycle};
use super::{InvocationContext, Outcome, PreparedCall};
use crate::error::{ReadError, Result, WriteError};
use crate::output::{Report, Reporter};
use crate::rpc::LedgerClient;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionRequest;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

/// Delay between receipt polls after the confirmation watcher gave up
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Executes one prepared call against a ledger client
pub struct DispatchEngine<'a, C, P> {
    client: &'a C,
    reporter: &'a mut P,
    poll_interval: Duration,
}

impl<'a, C, P> DispatchEngine<'a, C, P>
where
    C: LedgerClient,
    P: Reporter<C::Receipt>,
{
    pub fn new(client: &'a C, reporter: &'a mut P) -> Self {
        Self {
            client,
            reporter,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run `call`: constant functions are read, everything else is sent as a
    /// transaction and followed until confirmed
    pub async fn dispatch(
        &mut self,
        call: &PreparedCall<'_>,
        ctx: &InvocationContext,
    ) -> Result<Outcome<C::Receipt>> {
        if call.function.is_constant {
            let values = self.read(call, ctx).await?;
            self.reporter.report(Report::ReadResult {
                function: call.function,
                values: &values,
            });
            Ok(Outcome::Read(values))
        } else {
            self.write(call, ctx).await
        }
    }

    /// Single `eth_call`, decoded. Never retried.
    pub async fn read(&self, call: &PreparedCall<'_>, ctx: &InvocationContext) -> Result<Vec<DynSolValue>> {
        let mut tx = TransactionRequest::default()
            .to(ctx.contract_address)
            .input(call.calldata().into());
        if let Some(from) = ctx.sender {
            tx = tx.from(from);
        }

        tracing::debug!("Calling {} on {:#x}", call.function.signature, ctx.contract_address);
        let data = self.client.call(tx).await.map_err(|source| ReadError {
            function: call.function.signature.clone(),
            source,
        })?;

        Ok(call.codec.decode_output(&data)?)
    }

    async fn write(
        &mut self,
        call: &PreparedCall<'_>,
        ctx: &InvocationContext,
    ) -> Result<Outcome<C::Receipt>> {
        let from = match ctx.sender {
            Some(sender) => sender,
            None => self
                .client
                .accounts()
                .await
                .map_err(WriteError::Accounts)?
                .into_iter()
                .next()
                .ok_or(WriteError::NoAccount)?,
        };

        let mut tx = TransactionRequest::default()
            .from(from)
            .to(ctx.contract_address)
            .input(call.calldata().into());
        if let Some(gas_price) = ctx.gas_price {
            tx = tx.gas_price(gas_price);
        }
        if let Some(gas_limit) = ctx.gas_limit {
            tx = tx.gas_limit(gas_limit);
        }
        if let Some(value) = ctx.value {
            tx = tx.value(value);
        }

        if ctx.device_confirmation {
            let request = json!({
                "method": call.spec.name,
                "args": call.args,
                "from": format!("{:#x}", from),
                "to": format!("{:#x}", ctx.contract_address),
                "gasPrice": ctx.gas_price.map(|p| p.to_string()),
                "gas": ctx.gas_limit,
                "value": ctx.value.map(|v| v.to_string()),
            });
            self.reporter.report(Report::DeviceConfirmation(&request));
        }

        tracing::debug!("Sending {} from {:#x}", call.function.signature, from);
        let mut events = self.client.send_transaction(tx);
        let mut lifecycle = WriteLifecycle::new();

        while let Some(event) = events.next().await {
            match lifecycle.apply(event) {
                Transition::Waiting => {}
                Transition::HashReceived(hash) => self.reporter.report(Report::TransactionHash(hash)),
                Transition::ReceiptReceived(receipt) => self.reporter.report(Report::Receipt(&receipt)),
                Transition::Confirmed {
                    tx_hash,
                    confirmations,
                    receipt,
                } => {
                    self.reporter.report(Report::Confirmation {
                        confirmations,
                        receipt: &receipt,
                    });
                    return Ok(Outcome::Confirmed {
                        tx_hash,
                        receipt,
                        recovered: false,
                    });
                }
                Transition::SlowConfirmation(tx_hash) => {
                    // The live channel is abandoned; only the hash matters now
                    drop(events);
                    self.reporter.report(Report::SlowConfirmation(tx_hash));

                    let receipt = self.poll_for_receipt(tx_hash).await;
                    lifecycle.recover(receipt.clone());
                    self.reporter.report(Report::Receipt(&receipt));
                    return Ok(Outcome::Confirmed {
                        tx_hash,
                        receipt,
                        recovered: true,
                    });
                }
                Transition::Failed(error) => return Err(error.into()),
            }
        }

        Err(WriteError::ChannelClosed {
            tx_hash: lifecycle.tx_hash(),
        }
        .into())
    }

    /// Poll until the node returns a receipt. Retries forever: the hash is
    /// known, so the transaction either gets mined or the user interrupts.
    async fn poll_for_receipt(&self, tx_hash: TxHash) -> C::Receipt {
        let mut attempt: u64 = 0;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            attempt += 1;

            match self.client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    tracing::debug!("Receipt for {:#x} after {} polls", tx_hash, attempt);
                    return receipt;
                }
                Ok(None) => tracing::debug!("No receipt for {:#x} yet (poll {})", tx_hash, attempt),
                Err(e) => tracing::warn!("Receipt poll for {:#x} failed: {}", tx_hash, e),
            }
        }
    }
}
