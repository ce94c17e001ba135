//! Ledger client abstraction and its alloy-backed implementation

use super::watcher::{self, WatchConfig};
use crate::error::RpcError;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

/// Value delivered where a confirmation count is expected.
///
/// Some transports report watcher failures through the confirmation channel
/// instead of the error channel; both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmations {
    Count(u64),
    Failed(String),
}

/// One event of a submitted transaction, in transport order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent<R> {
    TransactionHash(TxHash),
    Receipt(R),
    Confirmation {
        confirmations: Confirmations,
        receipt: Option<R>,
    },
    Error(String),
}

/// Events of one submitted transaction
pub type TxEventStream<R> = BoxStream<'static, TxEvent<R>>;

/// The JSON-RPC operations the dispatcher needs from a node
#[async_trait]
pub trait LedgerClient: Send + Sync {
    type Receipt: Serialize + Clone + Send + Sync + 'static;

    /// Accounts managed by the node or the signer
    async fn accounts(&self) -> Result<Vec<Address>, RpcError>;

    /// Native balance in wei
    async fn balance(&self, address: Address) -> Result<U256, RpcError>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, RpcError>;

    /// Submit a transaction and observe its lifecycle. Submission failures are
    /// delivered as [`TxEvent::Error`].
    fn send_transaction(&self, tx: TransactionRequest) -> TxEventStream<Self::Receipt>;

    /// Receipt by hash, `None` while pending
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Self::Receipt>, RpcError>;
}

/// [`LedgerClient`] over an alloy provider
#[derive(Clone)]
pub struct AlloyClient {
    provider: DynProvider,
    watch: WatchConfig,
}

impl AlloyClient {
    pub fn new(provider: DynProvider, watch: WatchConfig) -> Self {
        Self { provider, watch }
    }

    /// Underlying provider
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

#[async_trait]
impl LedgerClient for AlloyClient {
    type Receipt = TransactionReceipt;

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, RpcError> {
        self.provider
            .call(tx)
            .await
            .map_err(|e| RpcError::Call(e.to_string()))
    }

    fn send_transaction(&self, tx: TransactionRequest) -> TxEventStream<TransactionReceipt> {
        watcher::spawn(self.provider.clone(), tx, self.watch.clone())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, RpcError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }
}
