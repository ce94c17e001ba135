//! Error types for dot-abi-cli

use alloy::primitives::TxHash;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog loading errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// ABI coercion, encoding and decoding errors
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Provider resolution errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Read (constant call) errors
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Write (transaction) errors
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Combined ABI file errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Catalog has no `contracts` object")]
    MissingContracts,

    #[error("Invalid `{field}` for {contract}: {reason}")]
    InvalidEntry {
        contract: String,
        field: &'static str,
        reason: String,
    },

    #[error("All {0} contract entries failed to load")]
    AllContractsFailed(usize),
}

/// ABI-related errors
#[derive(Error, Debug)]
pub enum AbiError {
    #[error("Invalid type '{ty}': {reason}")]
    InvalidType { ty: String, reason: String },

    #[error("Invalid value '{value}' for type '{ty}': {reason}")]
    InvalidValue {
        value: String,
        ty: String,
        reason: String,
    },

    #[error("Function '{function}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Missing argument <{0}>")]
    MissingArgument(String),

    #[error("--value is required for payable function '{0}'")]
    MissingValue(String),

    #[error("Failed to decode output of '{function}': {reason}")]
    DecodeError { function: String, reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config file: {0}")]
    InvalidFile(String),

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Provider resolution errors. Resolution is never retried automatically.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("RPC endpoint {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Hardware wallet unavailable: {0}")]
    HardwareTransport(String),

    #[error("Signer setup failed: {0}")]
    Signer(String),

    #[error("Provider override failed: {0}")]
    Override(String),
}

/// Transport-level failures reported by a ledger client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Call reverted or failed: {0}")]
    Call(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response from node: {0}")]
    InvalidResponse(String),
}

/// A constant call failed. Reads are never retried.
#[derive(Error, Debug)]
#[error("{function} failed: {source}")]
pub struct ReadError {
    pub function: String,
    #[source]
    pub source: RpcError,
}

/// A write failed. Carries whatever transaction hash was already known so the
/// user can follow up manually.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("No sender: pass --from or unlock an account on the node")]
    NoAccount,

    #[error("Could not list accounts: {0}")]
    Accounts(RpcError),

    #[error("{}", describe_failure(tx_hash, cause))]
    Failed {
        tx_hash: Option<TxHash>,
        cause: String,
    },

    #[error("Transaction event channel closed before a transaction hash was received")]
    MissingTransactionHash,

    #[error("Confirmation for {tx_hash:#x} arrived without a receipt")]
    MissingReceipt { tx_hash: TxHash },

    #[error("{}", describe_closed(tx_hash))]
    ChannelClosed { tx_hash: Option<TxHash> },
}

fn describe_failure(tx_hash: &Option<TxHash>, cause: &str) -> String {
    match tx_hash {
        Some(hash) => format!("transaction {:#x} failed: {}", hash, cause),
        None => format!("transaction failed before submission: {}", cause),
    }
}

fn describe_closed(tx_hash: &Option<TxHash>) -> String {
    match tx_hash {
        Some(hash) => format!(
            "stopped watching transaction {:#x} before it was confirmed",
            hash
        ),
        None => "transaction event channel closed before submission".to_string(),
    }
}

impl WriteError {
    /// Transaction hash captured before the failure, if any
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            WriteError::Failed { tx_hash, .. } | WriteError::ChannelClosed { tx_hash } => *tx_hash,
            WriteError::MissingReceipt { tx_hash } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
