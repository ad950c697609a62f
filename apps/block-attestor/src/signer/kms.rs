use alloy::consensus::{SignableTransaction, Signed, Transaction};
use alloy_primitives::{Address, Signature, B256};
use async_trait::async_trait;
use ethereum_keys::{
    address::address_from_public_key,
    signature::{normalize_s, recover_and_match},
};
use k256::{
    ecdsa::Signature as EcdsaSignature,
    pkcs8::{
        der::{pem, Decode},
        spki::{ObjectIdentifier, SubjectPublicKeyInfoRef},
    },
    PublicKey,
};
use tracing::{debug, error, info};

use super::{Signer, SignerError};
use crate::kms::{KmsClient, KmsDigest, EC_SIGN_SECP256K1_SHA256};

/// `id-ecPublicKey` from RFC 5480
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Tag byte of an uncompressed SEC1 point
const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

/// Public key and address of the KMS key, fixed at construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerIdentity {
    public_key: PublicKey,
    address: Address,
}

impl SignerIdentity {
    /// Derives the identity for `public_key`
    pub fn new(public_key: PublicKey) -> Self {
        let address = address_from_public_key(&public_key);
        Self {
            public_key,
            address,
        }
    }

    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub const fn address(&self) -> Address {
        self.address
    }
}

/// Signer whose private key lives in a remote KMS
///
/// The KMS returns bare DER `(R, S)` pairs. Each signature is normalized to
/// low-S and its recovery id is found by trial against the identity address.
/// Nothing here retries; KMS errors are returned with the operation and key
/// reference attached.
pub struct KmsSigner<K> {
    kms: K,
    key_ref: String,
    identity: SignerIdentity,
    chain_id: u64,
}

impl<K: KmsClient> KmsSigner<K> {
    /// Fetches and validates the KMS public key, then binds the signer to `chain_id`
    #[tracing::instrument(skip_all, fields(keyRef = %key_ref, chainId = chain_id))]
    pub async fn new(kms: K, key_ref: String, chain_id: u64) -> Result<Self, SignerError> {
        let descriptor =
            kms.get_public_key(&key_ref)
                .await
                .map_err(|source| SignerError::Kms {
                    operation: "GetPublicKey",
                    key_ref: key_ref.clone(),
                    source,
                })?;

        if descriptor.algorithm != EC_SIGN_SECP256K1_SHA256 {
            error!(
                algorithm = %descriptor.algorithm,
                expected = EC_SIGN_SECP256K1_SHA256,
                "KMS key has the wrong signing algorithm"
            );
            return Err(SignerError::KeyAlgorithmMismatch {
                expected: EC_SIGN_SECP256K1_SHA256,
                actual: descriptor.algorithm,
            });
        }

        let identity = SignerIdentity::new(decode_public_key_pem(&descriptor.pem)?);

        info!(
            address = %identity.address(),
            "KMS signer initialized successfully"
        );

        Ok(Self {
            kms,
            key_ref,
            identity,
            chain_id,
        })
    }

    pub const fn identity(&self) -> &SignerIdentity {
        &self.identity
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn key_ref(&self) -> &str {
        &self.key_ref
    }

    /// Signs a copy of `tx` under this signer's chain id.
    ///
    /// Transactions without a chain id get it applied (EIP-155 for legacy
    /// transactions). A transaction bound to another chain is rejected.
    pub async fn sign_transaction<T>(&self, tx: &T) -> Result<Signed<T>, SignerError>
    where
        T: SignableTransaction<Signature> + Clone + Send + Sync,
    {
        let mut tx = tx.clone();
        if !tx.set_chain_id_checked(self.chain_id) {
            return Err(SignerError::ChainIdMismatch {
                expected: self.chain_id,
                actual: tx.chain_id(),
            });
        }

        let signature = self.sign_hash(tx.signature_hash()).await?;
        Ok(tx.into_signed(signature))
    }
}

#[async_trait]
impl<K: KmsClient> Signer for KmsSigner<K> {
    fn address(&self) -> Address {
        self.identity.address
    }

    async fn sign_hash(&self, digest: B256) -> Result<Signature, SignerError> {
        debug!(digest = %digest, keyRef = %self.key_ref, "signing with KMS");

        let der = self
            .kms
            .asymmetric_sign(&self.key_ref, KmsDigest::Sha256(digest.0))
            .await
            .map_err(|source| SignerError::Kms {
                operation: "AsymmetricSign",
                key_ref: self.key_ref.clone(),
                source,
            })?;

        let signature = EcdsaSignature::from_der(&der)
            .map_err(|e| SignerError::MalformedSignature(e.to_string()))?;

        recover_and_match(&digest, &normalize_s(signature), self.identity.address).ok_or_else(
            || {
                error!(
                    address = %self.identity.address,
                    digest = %digest,
                    "KMS signature does not recover to the signer address"
                );
                SignerError::RecoveryFailed {
                    address: self.identity.address,
                }
            },
        )
    }
}

/// Decodes a PEM wrapped `SubjectPublicKeyInfo` holding an uncompressed
/// secp256k1 point.
pub fn decode_public_key_pem(encoded: &str) -> Result<PublicKey, SignerError> {
    let (label, der) = pem::decode_vec(encoded.as_bytes())
        .map_err(|e| SignerError::MalformedPublicKey(e.to_string()))?;
    if label != "PUBLIC KEY" {
        return Err(SignerError::MalformedPublicKey(format!(
            "unexpected PEM label `{label}`"
        )));
    }

    let spki = SubjectPublicKeyInfoRef::from_der(&der)
        .map_err(|e| SignerError::MalformedPublicKey(e.to_string()))?;

    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(SignerError::UnexpectedKeyType(spki.algorithm.oid.to_string()));
    }

    let point = spki.subject_public_key.as_bytes().ok_or_else(|| {
        SignerError::MalformedPublicKey("public key bit string is not octet aligned".to_string())
    })?;
    if point.first() != Some(&SEC1_UNCOMPRESSED_TAG) {
        return Err(SignerError::MalformedPublicKey(
            "expected an uncompressed curve point".to_string(),
        ));
    }

    PublicKey::from_sec1_bytes(point).map_err(|e| SignerError::MalformedPublicKey(e.to_string()))
}
