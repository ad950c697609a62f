//! Defines the top level configuration for the attestor.
use std::{fs, net::SocketAddr, num::NonZeroU32, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

/// Port the health server uses when no `health_addr` is configured
pub const DEFAULT_HEALTH_PORT: u16 = 8081;

/// The top level configuration for the attestor.
#[derive(Clone, Debug, Deserialize)]
pub struct AttestorConfig<U, K> {
    /// The configuration for the HTTP server.
    pub server: ServerConfig,
    /// Mined-check and signing parameters
    pub attestation: AttestationConfig,
    /// Upstream chain configuration (see [crate::upstream::evm::EvmUpstreamConfig])
    pub upstream: U,
    /// KMS configuration (generic over backend) See:
    /// - [crate::kms::cloud::CloudKmsConfig] for the cloud KMS
    /// - [crate::kms::local::LocalKmsConfig] for a local key
    pub kms: K,
}

impl<U, K> AttestorConfig<U, K>
where
    U: for<'de> Deserialize<'de>,
    K: for<'de> Deserialize<'de>,
{
    /// Load and validate an `AttestorConfig` from a TOML file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .map_err(|e| ConfigError::Io(path_ref.display().to_string(), e))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate an `AttestorConfig` from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents)?;
        cfg.attestation.validate()?;
        Ok(cfg)
    }
}

/// The configuration for the attestation server.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// The address that the server should listen on.
    pub listen_addr: SocketAddr,
    /// The address that the health check server should listen on.
    /// Defaults to port 8081 on the same host as listen_addr if not specified.
    #[serde(default)]
    pub health_addr: Option<SocketAddr>,
}

impl ServerConfig {
    pub fn health_addr(&self) -> SocketAddr {
        self.health_addr.unwrap_or_else(|| {
            let mut addr = self.listen_addr;
            addr.set_port(DEFAULT_HEALTH_PORT);
            addr
        })
    }
}

/// Mined-check and signing parameters
#[derive(Clone, Debug, Deserialize)]
pub struct AttestationConfig {
    /// Chain id bound into every attestation. Read from the upstream node
    /// when omitted.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Refill interval of the upstream rate limiter, usually the block time.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
    /// Upstream refreshes allowed back to back.
    #[serde(default = "default_burst")]
    pub burst: NonZeroU32,
}

const fn default_block_interval_ms() -> u64 {
    12_000
}

const fn default_burst() -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(3)
}

impl AttestationConfig {
    pub const fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.block_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "attestation.block_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur loading the attestor config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing or invalid file paths
    #[error("I/O error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),

    /// Malformed toml
    #[error("invalid TOML in config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values that parse but cannot be used
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kms::local::LocalKmsConfig, upstream::evm::EvmUpstreamConfig};

    type Config = AttestorConfig<EvmUpstreamConfig, LocalKmsConfig>;

    const MINIMAL: &str = r#"
        [server]
        listen_addr = "127.0.0.1:8080"

        [attestation]

        [upstream]
        url = "http://localhost:8545"

        [kms]
        key_path = "/tmp/attestor.key"
    "#;

    #[test]
    fn applies_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.attestation.chain_id, None);
        assert_eq!(config.attestation.block_interval(), Duration::from_secs(12));
        assert_eq!(config.attestation.burst.get(), 4);
        assert_eq!(
            config.server.health_addr(),
            "127.0.0.1:8081".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn explicit_values() {
        let config = Config::from_toml(
            r#"
            [server]
            listen_addr = "0.0.0.0:9000"
            health_addr = "0.0.0.0:9001"

            [attestation]
            chain_id = 1
            block_interval_ms = 2000
            burst = 10

            [upstream]
            url = "https://rpc.example.com"

            [kms]
            key_path = "~/.block-attestor"
            "#,
        )
        .unwrap();

        assert_eq!(config.attestation.chain_id, Some(1));
        assert_eq!(config.attestation.burst.get(), 10);
        assert_eq!(config.server.health_addr().port(), 9001);
    }

    #[test]
    fn rejects_zero_interval_and_burst() {
        let zero_interval = MINIMAL.replace("[attestation]", "[attestation]\nblock_interval_ms = 0");
        assert!(matches!(
            Config::from_toml(&zero_interval),
            Err(ConfigError::Invalid(_))
        ));

        let zero_burst = MINIMAL.replace("[attestation]", "[attestation]\nburst = 0");
        assert!(matches!(
            Config::from_toml(&zero_burst),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            Config::from_file("/nonexistent/attestor.toml"),
            Err(ConfigError::Io(..))
        ));
    }
}
