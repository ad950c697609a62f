use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::B256;
use async_trait::async_trait;
use k256::{
    ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey},
    pkcs8::{EncodePublicKey, LineEnding},
    PublicKey,
};
use serde::Deserialize;
use tracing::info;

use super::{
    KmsBuilder, KmsClient, KmsDigest, KmsError, PublicKeyDescriptor, EC_SIGN_SECP256K1_SHA256,
};

/// Default key file name
pub const DEFAULT_KEY_FILE_NAME: &str = "block-attestor.key";

/// Configuration for building a local KMS
#[derive(Clone, Debug, Deserialize)]
pub struct LocalKmsConfig {
    /// Path to a hex encoded secp256k1 private key, or a directory holding
    /// [`DEFAULT_KEY_FILE_NAME`]
    pub key_path: PathBuf,
}

/// In-process stand-in for a remote KMS
///
/// Holds the private key in memory but answers with the same PEM public key
/// and DER signature shapes a remote KMS produces, so the signer path is
/// identical for both backends.
pub struct LocalKms {
    key: SigningKey,
}

impl LocalKms {
    /// Creates a new instance of [`LocalKms`]
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generates a fresh random key
    pub fn random() -> Self {
        loop {
            if let Ok(key) = SigningKey::from_slice(B256::random().as_slice()) {
                return Self::new(key);
            }
        }
    }

    /// Parses a hex encoded private key, with or without a `0x` prefix
    pub fn from_hex(encoded: &str) -> Result<Self, KmsError> {
        let trimmed = encoded.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| KmsError::LocalKey(e.to_string()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| KmsError::LocalKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    /// Reads a hex encoded private key from `path`
    pub fn read_from_file(path: &Path) -> Result<Self, KmsError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| KmsError::LocalKey(format!("{}: {e}", path.display())))?;
        Self::from_hex(&contents)
    }

    /// Writes the private key to `path` as hex. Refuses to overwrite.
    pub fn write_to_file(&self, path: &Path) -> Result<(), KmsError> {
        if path.exists() {
            return Err(KmsError::LocalKey(format!(
                "key already found at {}; aborting",
                path.display()
            )));
        }
        fs::write(path, hex::encode(self.key.to_bytes()))
            .map_err(|e| KmsError::LocalKey(format!("{}: {e}", path.display())))
    }

    /// Public half of the held key
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.key.verifying_key())
    }
}

fn home_dir() -> Result<PathBuf, KmsError> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| {
            KmsError::ConfigError("unable to determine home directory from environment".to_string())
        })
}

fn resolve_key_path(key_path: PathBuf) -> Result<PathBuf, KmsError> {
    resolve_key_path_with_home(key_path, home_dir)
}

/// Expands a leading `~`, then points directories at [`DEFAULT_KEY_FILE_NAME`]
fn resolve_key_path_with_home(
    key_path: PathBuf,
    home: impl FnOnce() -> Result<PathBuf, KmsError>,
) -> Result<PathBuf, KmsError> {
    let expanded = match key_path.strip_prefix("~") {
        Ok(rest) => home()?.join(rest),
        Err(_) => key_path,
    };

    if expanded.is_dir() {
        Ok(expanded.join(DEFAULT_KEY_FILE_NAME))
    } else {
        Ok(expanded)
    }
}

impl KmsBuilder for LocalKms {
    type Config = LocalKmsConfig;
    type Client = Self;

    fn kms_name() -> &'static str {
        "local"
    }

    fn key_ref(config: &Self::Config) -> String {
        config.key_path.display().to_string()
    }

    fn build(config: Self::Config) -> Result<Self::Client, KmsError> {
        let key_path = resolve_key_path(config.key_path)?;

        info!(keyPath = %key_path.display(), "initializing local KMS");
        let kms = Self::read_from_file(&key_path)?;
        info!(keyPath = %key_path.display(), "local KMS initialized successfully");

        Ok(kms)
    }
}

#[async_trait]
impl KmsClient for LocalKms {
    async fn get_public_key(&self, _key_ref: &str) -> Result<PublicKeyDescriptor, KmsError> {
        let pem = self
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KmsError::LocalKey(e.to_string()))?;

        Ok(PublicKeyDescriptor {
            pem,
            algorithm: EC_SIGN_SECP256K1_SHA256.to_string(),
        })
    }

    async fn asymmetric_sign(
        &self,
        _key_ref: &str,
        digest: KmsDigest,
    ) -> Result<Vec<u8>, KmsError> {
        let signature: Signature = self
            .key
            .sign_prehash(digest.as_bytes())
            .map_err(|e| KmsError::LocalKey(e.to_string()))?;

        Ok(signature.to_der().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "4242424242424242424242424242424242424242424242424242424242424242";

    #[tokio::test]
    async fn public_key_is_pem_spki() {
        let kms = LocalKms::from_hex(KEY_HEX).unwrap();
        let descriptor = kms.get_public_key("local").await.unwrap();

        assert!(descriptor.pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(descriptor.algorithm, EC_SIGN_SECP256K1_SHA256);
    }

    #[tokio::test]
    async fn signs_with_der_encoding() {
        let kms = LocalKms::from_hex(&format!("0x{KEY_HEX}\n")).unwrap();
        let der = kms
            .asymmetric_sign("local", KmsDigest::Sha256([7; 32]))
            .await
            .unwrap();

        assert_eq!(der[0], 0x30);
        assert!(Signature::from_der(&der).is_ok());
    }

    #[test]
    fn rejects_invalid_hex() {
        assert!(matches!(
            LocalKms::from_hex("not-hex"),
            Err(KmsError::LocalKey(_))
        ));
        assert!(matches!(
            LocalKms::from_hex("00"),
            Err(KmsError::LocalKey(_))
        ));
    }

    #[test]
    fn key_file_round_trip_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE_NAME);

        let kms = LocalKms::random();
        kms.write_to_file(&path).unwrap();
        assert!(kms.write_to_file(&path).is_err());

        let config = LocalKmsConfig {
            key_path: dir.path().to_path_buf(),
        };
        let loaded = LocalKms::build(config).unwrap();
        assert_eq!(loaded.public_key(), kms.public_key());
    }

    #[test]
    fn resolves_key_directory_under_home() {
        let home = tempfile::tempdir().unwrap();
        let key_dir = home.path().join(".block-attestor");
        fs::create_dir_all(&key_dir).unwrap();
        let kms = LocalKms::random();
        kms.write_to_file(&key_dir.join(DEFAULT_KEY_FILE_NAME)).unwrap();

        let resolved = resolve_key_path_with_home(PathBuf::from("~/.block-attestor"), || {
            Ok(home.path().to_path_buf())
        })
        .unwrap();

        assert_eq!(resolved, key_dir.join(DEFAULT_KEY_FILE_NAME));
        let loaded = LocalKms::read_from_file(&resolved).unwrap();
        assert_eq!(loaded.public_key(), kms.public_key());
    }

    #[test]
    fn keeps_explicit_file_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("signer.hex");

        let resolved =
            resolve_key_path_with_home(file.clone(), || panic!("home not needed")).unwrap();

        assert_eq!(resolved, file);
    }
}
