use thiserror::Error;

pub mod evm;

/// Errors that can occur while reading the upstream chain
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to build upstream client due to: {0}")]
    ConfigError(String),
    #[error("Error while retrieving data: {0}")]
    RetrievalError(String),
}

pub trait UpstreamBuilder {
    type Config: Clone;
    type Source: BlockHeightSource;

    /// Returns the name of the upstream for logging and observability purposes.
    fn upstream_name() -> &'static str;

    /// Build the specific upstream reader
    fn build(config: Self::Config) -> Result<Self::Source, UpstreamError>;
}

#[async_trait::async_trait]
pub trait BlockHeightSource: Sync + Send + 'static {
    /// Fetch the number of the latest mined block.
    async fn latest_block_number(&self) -> Result<u64, UpstreamError>;
}
