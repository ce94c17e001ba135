//! Transaction submission and block-based confirmation watching
//!
//! Produces the `transactionHash -> receipt -> confirmation` event sequence
//! for one transaction by polling the node. If no receipt shows up within
//! `block_timeout` blocks the watcher gives up and reports that through the
//! confirmation channel, leaving recovery to the caller.

use super::client::{Confirmations, TxEvent, TxEventStream};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use std::time::Duration;

/// Polling parameters for the confirmation watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Delay between block/receipt polls
    pub poll_interval: Duration,
    /// Blocks to wait for a receipt before giving up
    pub block_timeout: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            block_timeout: 50,
        }
    }
}

/// Message reported when the receipt did not show up in time
pub fn not_mined_message(blocks: u64) -> String {
    format!(
        "Transaction was not mined within {} blocks, please make sure your transaction was properly sent. Be aware that it might still be mined!",
        blocks
    )
}

/// Submit `tx` on a background task and stream its events
pub fn spawn(
    provider: DynProvider,
    tx: TransactionRequest,
    config: WatchConfig,
) -> TxEventStream<TransactionReceipt> {
    let (sender, receiver) = mpsc::unbounded();
    tokio::spawn(watch(provider, tx, config, sender));
    receiver.boxed()
}

async fn watch(
    provider: DynProvider,
    tx: TransactionRequest,
    config: WatchConfig,
    sender: UnboundedSender<TxEvent<TransactionReceipt>>,
) {
    let pending = match provider.send_transaction(tx).await {
        Ok(pending) => pending,
        Err(e) => {
            let _ = sender.unbounded_send(TxEvent::Error(e.to_string()));
            return;
        }
    };

    let hash = *pending.tx_hash();
    tracing::debug!("Submitted {:#x}", hash);
    if sender.unbounded_send(TxEvent::TransactionHash(hash)).is_err() {
        return;
    }

    let mut start_block: Option<u64> = None;
    let mut receipt: Option<TransactionReceipt> = None;

    loop {
        tokio::time::sleep(config.poll_interval).await;

        // Receiver dropped: the caller stopped listening
        if sender.is_closed() {
            return;
        }

        let current = match provider.get_block_number().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to get block number while watching {:#x}: {}", hash, e);
                continue;
            }
        };
        let start = *start_block.get_or_insert(current);

        if receipt.is_none() {
            match provider.get_transaction_receipt(hash).await {
                Ok(Some(r)) => {
                    let reverted = !r.status();
                    let _ = sender.unbounded_send(TxEvent::Receipt(r.clone()));
                    if reverted {
                        let _ = sender.unbounded_send(TxEvent::Error(
                            "Transaction has been reverted by the EVM".to_string(),
                        ));
                        return;
                    }
                    receipt = Some(r);
                }
                Ok(None) => {
                    if current.saturating_sub(start) >= config.block_timeout {
                        let _ = sender.unbounded_send(TxEvent::Confirmation {
                            confirmations: Confirmations::Failed(not_mined_message(
                                config.block_timeout,
                            )),
                            receipt: None,
                        });
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to get receipt for {:#x}: {}", hash, e);
                    continue;
                }
            }
        }

        if let Some(r) = &receipt {
            let mined_in = r.block_number.unwrap_or(current);
            let confirmations = current.saturating_sub(mined_in);
            if confirmations >= 1 {
                let _ = sender.unbounded_send(TxEvent::Confirmation {
                    confirmations: Confirmations::Count(confirmations),
                    receipt: Some(r.clone()),
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::is_not_mined;
    use alloy::primitives::{Address, TxHash, B256};
    use alloy::providers::ProviderBuilder;
    use alloy::transports::mock::Asserter;
    use serde_json::{json, Value};

    const HASH: TxHash = TxHash::repeat_byte(0xab);

    fn provider(asserter: Asserter) -> DynProvider {
        ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter)
            .erased()
    }

    fn config(block_timeout: u64) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_secs(1),
            block_timeout,
        }
    }

    fn tx() -> TransactionRequest {
        TransactionRequest::default()
            .from(Address::repeat_byte(0x22))
            .to(Address::repeat_byte(0x33))
    }

    fn block(n: u64) -> String {
        format!("{:#x}", n)
    }

    /// Receipt as a node returns it
    fn receipt(block_number: u64, success: bool) -> Value {
        json!({
            "transactionHash": HASH,
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0x11),
            "blockNumber": block(block_number),
            "from": Address::repeat_byte(0x22),
            "to": Address::repeat_byte(0x33),
            "contractAddress": null,
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "status": if success { "0x1" } else { "0x0" },
            "type": "0x2"
        })
    }

    async fn events(asserter: Asserter, config: WatchConfig) -> Vec<TxEvent<TransactionReceipt>> {
        spawn(provider(asserter), tx(), config).collect().await
    }

    #[test]
    fn test_not_mined_message_names_block_count() {
        let msg = not_mined_message(50);
        assert!(msg.starts_with("Transaction was not mined within 50 blocks,"));
        assert!(is_not_mined(&msg));
    }

    #[test]
    fn test_default_watch_config() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.block_timeout, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_error() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("insufficient funds for gas * price + value");

        let events = events(asserter, config(50)).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TxEvent::Error(msg) if msg.contains("insufficient funds")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_one_block_on_top() {
        let asserter = Asserter::new();
        asserter.push_success(&HASH);
        asserter.push_success(&block(0x10));
        asserter.push_success(&Value::Null);
        // Mined in the current block: no confirmation yet
        asserter.push_success(&block(0x11));
        asserter.push_success(&receipt(0x11, true));
        asserter.push_success(&block(0x12));

        let events = events(asserter, config(50)).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TxEvent::TransactionHash(HASH));
        assert!(matches!(&events[1], TxEvent::Receipt(r) if r.block_number == Some(0x11)));
        assert!(matches!(
            &events[2],
            TxEvent::Confirmation {
                confirmations: Confirmations::Count(1),
                receipt: Some(_),
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_receipt_is_followed_by_error() {
        let asserter = Asserter::new();
        asserter.push_success(&HASH);
        asserter.push_success(&block(0x10));
        asserter.push_success(&receipt(0x10, false));

        let events = events(asserter, config(50)).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TxEvent::TransactionHash(HASH));
        assert!(matches!(&events[1], TxEvent::Receipt(r) if !r.status()));
        assert!(matches!(&events[2], TxEvent::Error(msg) if msg.contains("reverted")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_block_timeout() {
        let asserter = Asserter::new();
        asserter.push_success(&HASH);
        for n in 0x10..=0x12u64 {
            asserter.push_success(&block(n));
            asserter.push_success(&Value::Null);
        }

        let events = events(asserter, config(2)).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TxEvent::TransactionHash(HASH));
        match &events[1] {
            TxEvent::Confirmation {
                confirmations: Confirmations::Failed(msg),
                receipt: None,
            } => {
                assert_eq!(msg, &not_mined_message(2));
                assert!(is_not_mined(msg));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
