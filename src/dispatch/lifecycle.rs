//! Write transaction lifecycle
//!
//! ```text
//! Submitted -> HashReceived -> ReceiptReceived -> Confirmed
//!     |              |                |
//!     +--------------+----------------+--> Errored
//!                    |                |
//!                    +----------------+--> SlowConfirmationPending -> Confirmed
//! ```
//!
//! Events are applied one at a time. A receipt alone never completes a write:
//! completion needs a confirmation count of at least one, or recovery of a
//! receipt after the watcher gave up on a known hash.

use crate::error::WriteError;
use crate::rpc::{Confirmations, TxEvent};
use alloy::primitives::TxHash;
use regex::Regex;
use std::sync::OnceLock;

/// Where a write currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Submitted,
    HashReceived,
    ReceiptReceived,
    Confirmed,
    Errored,
    SlowConfirmationPending(TxHash),
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Confirmed | LifecycleState::Errored)
    }
}

/// What the driver should do after applying an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<R> {
    /// Nothing to report
    Waiting,
    HashReceived(TxHash),
    ReceiptReceived(R),
    Confirmed {
        tx_hash: TxHash,
        confirmations: u64,
        receipt: R,
    },
    /// Stop listening and poll for the receipt of this hash
    SlowConfirmation(TxHash),
    Failed(WriteError),
}

/// State machine for one submitted write
#[derive(Debug, Clone)]
pub struct WriteLifecycle<R> {
    state: LifecycleState,
    tx_hash: Option<TxHash>,
    receipt: Option<R>,
}

impl<R> Default for WriteLifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> WriteLifecycle<R> {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Submitted,
            tx_hash: None,
            receipt: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    pub fn receipt(&self) -> Option<&R> {
        self.receipt.as_ref()
    }

    fn set_state(&mut self, state: LifecycleState) {
        tracing::debug!("Write lifecycle {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn fail(&mut self, error: WriteError) -> Transition<R> {
        self.set_state(LifecycleState::Errored);
        Transition::Failed(error)
    }
}

impl<R: Clone> WriteLifecycle<R> {
    /// Apply one transport event
    pub fn apply(&mut self, event: TxEvent<R>) -> Transition<R> {
        if self.state.is_terminal() || matches!(self.state, LifecycleState::SlowConfirmationPending(_)) {
            tracing::debug!("Ignoring event in state {:?}", self.state);
            return Transition::Waiting;
        }

        match event {
            TxEvent::TransactionHash(hash) => {
                self.tx_hash = Some(hash);
                if self.state == LifecycleState::Submitted {
                    self.set_state(LifecycleState::HashReceived);
                }
                Transition::HashReceived(hash)
            }
            TxEvent::Receipt(receipt) => {
                // A repeated receipt overwrites the previous one
                self.receipt = Some(receipt.clone());
                self.set_state(LifecycleState::ReceiptReceived);
                Transition::ReceiptReceived(receipt)
            }
            TxEvent::Confirmation {
                confirmations: Confirmations::Failed(message),
                ..
            } => match self.tx_hash {
                Some(hash) if is_not_mined(&message) => {
                    self.set_state(LifecycleState::SlowConfirmationPending(hash));
                    Transition::SlowConfirmation(hash)
                }
                tx_hash => self.fail(WriteError::Failed {
                    tx_hash,
                    cause: message,
                }),
            },
            TxEvent::Confirmation {
                confirmations: Confirmations::Count(count),
                receipt,
            } => {
                if let Some(receipt) = receipt {
                    self.receipt = Some(receipt);
                }
                if count == 0 {
                    return Transition::Waiting;
                }

                let Some(tx_hash) = self.tx_hash else {
                    return self.fail(WriteError::MissingTransactionHash);
                };
                let Some(receipt) = self.receipt.clone() else {
                    return self.fail(WriteError::MissingReceipt { tx_hash });
                };

                self.set_state(LifecycleState::Confirmed);
                Transition::Confirmed {
                    tx_hash,
                    confirmations: count,
                    receipt,
                }
            }
            TxEvent::Error(cause) => self.fail(WriteError::Failed {
                tx_hash: self.tx_hash,
                cause,
            }),
        }
    }

    /// Complete a slow confirmation with the polled receipt. Returns the
    /// hash, or `None` if no slow confirmation was pending.
    pub fn recover(&mut self, receipt: R) -> Option<TxHash> {
        let LifecycleState::SlowConfirmationPending(hash) = self.state else {
            return None;
        };
        self.receipt = Some(receipt);
        self.set_state(LifecycleState::Confirmed);
        Some(hash)
    }
}

/// Whether a confirmation-channel error means the watcher gave up waiting
/// rather than the transaction failing
pub fn is_not_mined(message: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)not mined within \d+ blocks").expect("valid pattern"))
        .is_match(message)
}
