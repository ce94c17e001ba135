//! Provider resolution
//!
//! Turns a [`ProviderConfig`] into the one [`AlloyClient`] a process talks to.
//! The first match wins:
//!
//! 1. an explicit override factory (embedding callers, tests, mnemonic signer)
//! 2. the Ledger hardware signer, layered over HTTP with the subscription shim,
//!    cached nonce tracking and gas estimation
//! 3. a plain HTTP connection where the node manages unlocked accounts
//!
//! A successful resolution is memoized; failures are returned as-is and the
//! next call tries again.

use super::client::AlloyClient;
use super::shim::SubscriptionShimLayer;
use super::watcher::WatchConfig;
use crate::error::ProviderError;
use alloy::network::{EthereumWallet, TxSigner};
use alloy::primitives::Signature;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::{ClientBuilder, RpcClient};
use alloy::signers::ledger::{HDPath, LedgerSigner};
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder};
use alloy::transports::http::{reqwest, Http};
use alloy::transports::utils::guess_local_url;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'/0";

/// Everything needed to establish a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub rpc_url: String,
    /// Sign with a Ledger device
    pub hardware_wallet: bool,
    /// Base derivation path; the account index is appended
    pub hd_path: String,
    pub hd_key_index: u32,
    /// Show pending requests before asking the device to sign
    pub hardware_confirm: bool,
    /// Chain id for signing; fetched from the node when unset
    pub chain_id: Option<u64>,
    /// HTTP request timeout
    pub timeout: Duration,
    pub watch: WatchConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            hardware_wallet: false,
            hd_path: DEFAULT_HD_PATH.to_string(),
            hd_key_index: 0,
            hardware_confirm: true,
            chain_id: None,
            timeout: Duration::from_secs(30),
            watch: WatchConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Full derivation path of the signing account
    pub fn derivation_path(&self) -> String {
        format!("{}/{}", self.hd_path.trim_end_matches('/'), self.hd_key_index)
    }
}

/// Caller-supplied provider constructor, takes priority over everything else
pub type ProviderFactory =
    Box<dyn Fn(&ProviderConfig) -> BoxFuture<'static, Result<DynProvider, ProviderError>> + Send + Sync>;

/// Which strategy [`ProviderResolver::resolve`] will use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    Override,
    HardwareWallet,
    Http,
}

/// Memoizing resolver for the process-wide client
pub struct ProviderResolver {
    config: ProviderConfig,
    override_factory: Option<ProviderFactory>,
    resolved: OnceCell<AlloyClient>,
}

impl ProviderResolver {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            override_factory: None,
            resolved: OnceCell::new(),
        }
    }

    /// Use `factory` instead of the built-in strategies
    pub fn with_override(mut self, factory: ProviderFactory) -> Self {
        self.override_factory = Some(factory);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn source(&self) -> ProviderSource {
        if self.override_factory.is_some() {
            ProviderSource::Override
        } else if self.config.hardware_wallet {
            ProviderSource::HardwareWallet
        } else {
            ProviderSource::Http
        }
    }

    /// Whether writes go through a hardware signer that should be preceded by
    /// a notice listing the pending request. Follows the strategy actually
    /// used, so an override wins over `hardware_wallet`.
    pub fn device_confirmation(&self) -> bool {
        self.source() == ProviderSource::HardwareWallet && self.config.hardware_confirm
    }

    /// Resolve the client, connecting on first use
    pub async fn resolve(&self) -> Result<&AlloyClient, ProviderError> {
        self.resolved.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<AlloyClient, ProviderError> {
        tracing::debug!("Resolving provider via {:?}", self.source());

        let provider = match &self.override_factory {
            Some(factory) => factory(&self.config).await?,
            None if self.config.hardware_wallet => connect_ledger(&self.config).await?,
            None => ProviderBuilder::new()
                .connect_client(http_client(&self.config, false)?)
                .erased(),
        };

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| unreachable(&self.config, e))?;
        tracing::debug!("Connected to chain {} at {}", chain_id, self.config.rpc_url);

        Ok(AlloyClient::new(provider, self.config.watch.clone()))
    }
}

/// Override factory signing with an HD wallet derived from a mnemonic
pub fn mnemonic_override(phrase: String, index: u32) -> ProviderFactory {
    Box::new(move |config: &ProviderConfig| {
        let phrase = phrase.clone();
        let config = config.clone();
        Box::pin(async move {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .index(index)
                .map_err(|e| ProviderError::Signer(e.to_string()))?
                .build()
                .map_err(|e| ProviderError::Signer(e.to_string()))?;
            tracing::debug!("Using mnemonic account {} (index {})", signer.address(), index);

            let chain_id = chain_id(&config).await?;
            Ok(signing_provider(http_client(&config, true)?, chain_id, signer))
        })
    })
}

async fn connect_ledger(config: &ProviderConfig) -> Result<DynProvider, ProviderError> {
    let chain_id = chain_id(config).await?;
    let path = config.derivation_path();
    tracing::debug!("Opening Ledger at {} for chain {}", path, chain_id);

    let signer = LedgerSigner::new(HDPath::Other(path), Some(chain_id))
        .await
        .map_err(|e| ProviderError::HardwareTransport(e.to_string()))?;

    Ok(signing_provider(http_client(config, true)?, chain_id, signer))
}

/// Wallet stack shared by every signing strategy
fn signing_provider<S>(client: RpcClient, chain_id: u64, signer: S) -> DynProvider
where
    S: TxSigner<Signature> + Send + Sync + 'static,
{
    ProviderBuilder::new()
        .disable_recommended_fillers()
        .with_gas_estimation()
        .with_cached_nonce_management()
        .with_chain_id(chain_id)
        .wallet(EthereumWallet::from(signer))
        .connect_client(client)
        .erased()
}

/// HTTP RPC client honouring the configured timeout, optionally behind the
/// subscription shim
fn http_client(config: &ProviderConfig, shim: bool) -> Result<RpcClient, ProviderError> {
    let url = config
        .rpc_url
        .parse::<reqwest::Url>()
        .map_err(|e| ProviderError::InvalidUrl {
            url: config.rpc_url.clone(),
            reason: e.to_string(),
        })?;

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| ProviderError::InvalidUrl {
            url: config.rpc_url.clone(),
            reason: e.to_string(),
        })?;

    let is_local = guess_local_url(&url);
    let transport = Http::with_client(client, url);

    Ok(if shim {
        ClientBuilder::default()
            .layer(SubscriptionShimLayer::default())
            .transport(transport, is_local)
    } else {
        ClientBuilder::default().transport(transport, is_local)
    })
}

async fn chain_id(config: &ProviderConfig) -> Result<u64, ProviderError> {
    if let Some(id) = config.chain_id {
        return Ok(id);
    }

    ProviderBuilder::new()
        .connect_client(http_client(config, false)?)
        .get_chain_id()
        .await
        .map_err(|e| unreachable(config, e))
}

fn unreachable(config: &ProviderConfig, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Unreachable {
        url: config.rpc_url.clone(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::transports::mock::Asserter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_factory(calls: Arc<AtomicUsize>, asserter: Option<Asserter>) -> ProviderFactory {
        Box::new(move |_config: &ProviderConfig| {
            calls.fetch_add(1, Ordering::SeqCst);
            let asserter = asserter.clone();
            Box::pin(async move {
                match asserter {
                    Some(asserter) => Ok(ProviderBuilder::new().connect_mocked_client(asserter).erased()),
                    None => Err(ProviderError::Override("no provider".to_string())),
                }
            })
        })
    }

    #[test]
    fn test_source_order() {
        let hardware = ProviderConfig {
            hardware_wallet: true,
            ..Default::default()
        };

        assert_eq!(ProviderResolver::new(ProviderConfig::default()).source(), ProviderSource::Http);
        assert_eq!(ProviderResolver::new(hardware.clone()).source(), ProviderSource::HardwareWallet);

        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = ProviderResolver::new(hardware).with_override(counting_factory(calls, None));
        assert_eq!(resolver.source(), ProviderSource::Override);
    }

    #[test]
    fn test_derivation_path_appends_index() {
        let config = ProviderConfig {
            hd_key_index: 3,
            ..Default::default()
        };
        assert_eq!(config.derivation_path(), "m/44'/60'/0'/0/3");

        let trailing = ProviderConfig {
            hd_path: "m/44'/60'/1'/0/".to_string(),
            ..Default::default()
        };
        assert_eq!(trailing.derivation_path(), "m/44'/60'/1'/0/0");
    }

    #[test]
    fn test_device_confirmation_follows_source() {
        assert!(!ProviderResolver::new(ProviderConfig::default()).device_confirmation());

        let hardware = ProviderConfig {
            hardware_wallet: true,
            ..Default::default()
        };
        assert!(ProviderResolver::new(hardware.clone()).device_confirmation());

        let silent = ProviderConfig {
            hardware_confirm: false,
            ..hardware.clone()
        };
        assert!(!ProviderResolver::new(silent).device_confirmation());

        // A software signer override wins over --ledger, so no device is asked
        let calls = Arc::new(AtomicUsize::new(0));
        let overridden = ProviderResolver::new(hardware).with_override(counting_factory(calls, None));
        assert!(!overridden.device_confirmation());
    }

    #[tokio::test]
    async fn test_resolution_is_memoized() {
        let asserter = Asserter::new();
        asserter.push_success(&"0x1");

        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = ProviderResolver::new(ProviderConfig::default())
            .with_override(counting_factory(calls.clone(), Some(asserter)));

        resolver.resolve().await.unwrap();
        // A second chain id lookup would find no queued response and fail
        resolver.resolve().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = ProviderResolver::new(ProviderConfig::default())
            .with_override(counting_factory(calls.clone(), None));

        assert!(matches!(resolver.resolve().await, Err(ProviderError::Override(_))));
        assert!(resolver.resolve().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let resolver = ProviderResolver::new(ProviderConfig {
            rpc_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(resolver.resolve().await, Err(ProviderError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let resolver = ProviderResolver::new(ProviderConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        });
        assert!(matches!(resolver.resolve().await, Err(ProviderError::Unreachable { .. })));
    }
}
