use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{KmsBuilder, KmsClient, KmsDigest, KmsError, PublicKeyDescriptor};

/// Environment variable read for the bearer token when none is configured
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "KMS_ACCESS_TOKEN";

/// Configuration for building a cloud KMS client
#[derive(Clone, Debug, Deserialize)]
pub struct CloudKmsConfig {
    /// REST endpoint (e.g., "https://cloudkms.googleapis.com")
    pub endpoint: Url,
    /// Full resource name of the key version used for signing
    pub key_name: String,
    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// Per request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_access_token_env() -> String {
    DEFAULT_ACCESS_TOKEN_ENV.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// REST client for a cloud KMS
///
/// Talks to `GET v1/{key}/publicKey` and `POST v1/{key}:asymmetricSign`.
pub struct CloudKms {
    http: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl CloudKms {
    /// Creates a new client for `endpoint`
    pub fn new(
        endpoint: Url,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, KmsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KmsError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            access_token,
        })
    }

    fn resource_url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.endpoint.as_str().trim_end_matches('/'))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, KmsError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| KmsError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| KmsError::Decode(e.to_string()))
    }
}

impl KmsBuilder for CloudKms {
    type Config = CloudKmsConfig;
    type Client = Self;

    fn kms_name() -> &'static str {
        "cloud"
    }

    fn key_ref(config: &Self::Config) -> String {
        config.key_name.clone()
    }

    fn build(config: Self::Config) -> Result<Self::Client, KmsError> {
        let access_token = std::env::var(&config.access_token_env).ok();
        if access_token.is_none() {
            warn!(
                accessTokenEnv = %config.access_token_env,
                "no KMS access token in environment, requests will be unauthenticated"
            );
        }

        info!(
            endpoint = %config.endpoint,
            keyName = %config.key_name,
            "cloud KMS client configured"
        );

        Self::new(
            config.endpoint,
            access_token,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    pem: String,
    algorithm: String,
}

#[derive(Debug, Serialize)]
struct AsymmetricSignRequest {
    digest: DigestField,
}

#[derive(Debug, Serialize)]
struct DigestField {
    sha256: String,
}

#[derive(Debug, Deserialize)]
struct AsymmetricSignResponse {
    signature: String,
}

impl From<KmsDigest> for AsymmetricSignRequest {
    fn from(digest: KmsDigest) -> Self {
        match digest {
            KmsDigest::Sha256(bytes) => Self {
                digest: DigestField {
                    sha256: STANDARD.encode(bytes),
                },
            },
        }
    }
}

#[async_trait]
impl KmsClient for CloudKms {
    async fn get_public_key(&self, key_ref: &str) -> Result<PublicKeyDescriptor, KmsError> {
        debug!(keyRef = key_ref, "fetching public key from cloud KMS");

        let response: PublicKeyResponse = self
            .send(self.http.get(self.resource_url(&format!("{key_ref}/publicKey"))))
            .await?;

        Ok(PublicKeyDescriptor {
            pem: response.pem,
            algorithm: response.algorithm,
        })
    }

    async fn asymmetric_sign(
        &self,
        key_ref: &str,
        digest: KmsDigest,
    ) -> Result<Vec<u8>, KmsError> {
        debug!(keyRef = key_ref, "requesting signature from cloud KMS");

        let body = AsymmetricSignRequest::from(digest);
        let response: AsymmetricSignResponse = self
            .send(
                self.http
                    .post(self.resource_url(&format!("{key_ref}:asymmetricSign")))
                    .json(&body),
            )
            .await?;

        STANDARD
            .decode(response.signature)
            .map_err(|e| KmsError::Decode(e.to_string()))
    }
}
