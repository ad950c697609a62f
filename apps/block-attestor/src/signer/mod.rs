use alloy_primitives::{keccak256, Address, Signature, B256};
use async_trait::async_trait;

use crate::kms::KmsError;

pub mod kms;

/// Trait for signing attestation data
///
/// The attestation service only sees this trait, so any backend that can
/// produce recoverable EVM signatures can be plugged in.
#[async_trait]
pub trait Signer: Send + Sync + 'static {
    /// Address every signature produced by this signer recovers to
    fn address(&self) -> Address;

    /// Sign a 32 byte digest
    ///
    /// # Returns
    /// * `Signature` - low-S ECDSA signature whose parity recovers [`Signer::address`]
    async fn sign_hash(&self, digest: B256) -> Result<Signature, SignerError>;

    /// Sign an opaque payload. The signed digest is `keccak256(payload)`.
    async fn sign_message(&self, payload: &[u8]) -> Result<Signature, SignerError> {
        self.sign_hash(keccak256(payload)).await
    }
}

/// Errors that can occur during signer construction and signing
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("KMS key algorithm mismatch: expected {expected}, got {actual}")]
    KeyAlgorithmMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("Malformed public key: {0}")]
    MalformedPublicKey(String),

    #[error("Unexpected public key type: {0}")]
    UnexpectedKeyType(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("No recovery id recovers signer address {address}")]
    RecoveryFailed { address: Address },

    #[error("Transaction chain id {actual:?} does not match signer chain id {expected}")]
    ChainIdMismatch { expected: u64, actual: Option<u64> },

    #[error("KMS {operation} failed for key {key_ref}: {source}")]
    Kms {
        operation: &'static str,
        key_ref: String,
        #[source]
        source: KmsError,
    },
}
