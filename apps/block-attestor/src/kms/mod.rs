use async_trait::async_trait;

pub mod cloud;
pub mod local;

/// Signing scheme the attestor requires from the KMS key.
///
/// The KMS only offers secp256k1 with SHA-256. Keccak-256 digests have the
/// same width, so they are passed through the SHA-256 digest slot unchanged.
pub const EC_SIGN_SECP256K1_SHA256: &str = "EC_SIGN_SECP256K1_SHA256";

/// Public key material reported by the KMS for a key version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyDescriptor {
    /// PEM wrapped DER `SubjectPublicKeyInfo`
    pub pem: String,
    /// Signing algorithm the key is bound to
    pub algorithm: String,
}

/// Digest handed to the KMS, tagged with the hash function it claims to be
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KmsDigest {
    /// 32 byte digest submitted in the SHA-256 slot
    Sha256([u8; 32]),
}

impl KmsDigest {
    /// Raw digest bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        match self {
            Self::Sha256(bytes) => bytes,
        }
    }
}

/// Remote key management service holding the attestor's private key.
///
/// Implementations never retry; transport failures are returned as-is.
#[async_trait]
pub trait KmsClient: Send + Sync + 'static {
    /// Fetch the public key and algorithm of `key_ref`
    async fn get_public_key(&self, key_ref: &str) -> Result<PublicKeyDescriptor, KmsError>;

    /// Sign `digest` with `key_ref`, returning a DER encoded ECDSA `(R, S)` pair
    async fn asymmetric_sign(&self, key_ref: &str, digest: KmsDigest)
        -> Result<Vec<u8>, KmsError>;
}

/// Trait for building KMS clients from configuration
///
/// Follows the same shape as the upstream and server builders: a config type
/// loaded from TOML and a name used in logs.
pub trait KmsBuilder {
    type Config: Clone + Send + 'static;
    type Client: KmsClient;

    /// Returns the name of the KMS backend for logging and observability purposes.
    fn kms_name() -> &'static str;

    /// Key reference the signer should use for this configuration
    fn key_ref(config: &Self::Config) -> String;

    /// Build the specific KMS client
    fn build(config: Self::Config) -> Result<Self::Client, KmsError>;
}

/// Errors returned by KMS clients
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("KMS transport error: {0}")]
    Transport(String),

    #[error("KMS returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unable to decode KMS response: {0}")]
    Decode(String),

    #[error("Failed to build KMS client due to: {0}")]
    ConfigError(String),

    #[error("Local key error: {0}")]
    LocalKey(String),
}
