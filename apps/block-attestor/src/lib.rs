#![warn(clippy::nursery, clippy::pedantic, missing_docs)]

//! Block Attestor Library
//!
//! Signs statements of the form "block N of chain C has been mined" with a
//! secp256k1 key held in a KMS, and serves them over HTTP. Mined checks are
//! answered from a cached high-water mark, refreshed from an upstream node
//! through a shared rate limiter.

/// Signing of mined-block attestations
pub mod attestation;
/// ABI layout of the signed attestation payload
pub mod attestation_payload;
/// Configuration structures and loading
pub mod config;
/// KMS clients for remote and local keys
pub mod kms;
/// Logging and observability setup
pub mod logging;
/// Mined-block check with cached height and upstream rate limiting
pub mod mined;
/// HTTP server and route implementations
pub mod rpc;
/// Ethereum signers backed by a KMS
pub mod signer;
/// Upstream chain readers
pub mod upstream;

mod error;

pub use error::{error_fingerprint, AttestorError};
