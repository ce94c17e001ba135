//! Ledger connectivity: provider resolution, middleware and the client the
//! dispatcher talks to

mod client;
mod resolver;
mod shim;
mod watcher;

pub use client::{AlloyClient, Confirmations, LedgerClient, TxEvent, TxEventStream};
pub use resolver::{
    mnemonic_override, ProviderConfig, ProviderFactory, ProviderResolver, ProviderSource,
    DEFAULT_HD_PATH, DEFAULT_RPC_URL,
};
pub use shim::{SubscriptionShim, SubscriptionShimLayer, SubscriptionSource};
pub use watcher::{not_mined_message, WatchConfig};
