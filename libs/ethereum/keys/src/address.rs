use alloy_primitives::Address;
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey};

/// Derives the EVM address of a secp256k1 public key.
///
/// The address is the last 20 bytes of `keccak256(X || Y)`, taken over the
/// uncompressed point without its `0x04` tag.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.to_encoded_point(false);
    Address::from_raw_public_key(&uncompressed.as_bytes()[1..])
}

/// Hex encoding of the 20 address bytes, without a `0x` prefix.
pub fn address_hex(address: &Address) -> String {
    hex::encode(address.as_slice())
}
