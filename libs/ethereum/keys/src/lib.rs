//! Ethereum key helpers
//!
//! Address derivation and `(R, S, V)` signature assembly for secp256k1 keys
//! whose signing backend only hands back a bare ECDSA `(R, S)` pair.

/// EVM address derivation
pub mod address;
/// Low-S normalization, recovery-id search and `R || S || V` encoding
pub mod signature;
