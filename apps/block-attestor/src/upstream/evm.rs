use alloy_provider::{Provider, RootProvider};
use serde::Deserialize;
use tracing::{debug, error, info};
use url::Url;

use super::{BlockHeightSource, UpstreamBuilder, UpstreamError};

/// Configuration for connecting to an EVM-compatible blockchain.
#[derive(Clone, Debug, Deserialize)]
pub struct EvmUpstreamConfig {
    /// RPC endpoint URL for the EVM chain.
    ///
    /// This should be a valid HTTP or HTTPS URL pointing to an EVM JSON-RPC endpoint.
    pub url: Url,
}

/// Builder for creating EVM upstream readers
pub struct EvmUpstreamBuilder;

impl UpstreamBuilder for EvmUpstreamBuilder {
    type Config = EvmUpstreamConfig;
    type Source = EvmUpstream;

    fn upstream_name() -> &'static str {
        "evm"
    }

    fn build(config: Self::Config) -> Result<Self::Source, UpstreamError> {
        info!(rpcUrl = %config.url, "initializing EVM upstream");

        let client = RootProvider::new_http(config.url);

        Ok(EvmUpstream { client })
    }
}

/// Reads block heights from an EVM JSON-RPC node
#[derive(Debug, Clone)]
pub struct EvmUpstream {
    client: RootProvider,
}

impl EvmUpstream {
    /// Fetch the chain id served by the node (`eth_chainId`).
    pub async fn chain_id(&self) -> Result<u64, UpstreamError> {
        self.client.get_chain_id().await.map_err(|err| {
            error!(error = %err, "failed to fetch chain id from EVM chain");
            UpstreamError::RetrievalError(err.to_string())
        })
    }
}

#[async_trait::async_trait]
impl BlockHeightSource for EvmUpstream {
    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        debug!("fetching latest block number from EVM chain");

        let height = self.client.get_block_number().await.map_err(|err| {
            error!(error = %err, "failed to fetch block number from EVM chain");
            UpstreamError::RetrievalError(err.to_string())
        })?;

        debug!(latestHeight = height, "retrieved latest block number");
        Ok(height)
    }
}
