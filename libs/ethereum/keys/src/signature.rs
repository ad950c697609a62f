use alloy_primitives::{Address, Signature, B256, U256};
use k256::ecdsa::Signature as EcdsaSignature;

/// Length of an `R || S || V` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Returns the low-S form of `signature`.
///
/// `(R, S)` and `(R, n - S)` both verify for the same key and digest. EVM
/// consumers only accept the variant with `S <= n / 2`.
pub fn normalize_s(signature: EcdsaSignature) -> EcdsaSignature {
    signature.normalize_s().unwrap_or(signature)
}

/// Returns true if `signature` is already in low-S form.
pub fn is_low_s(signature: &EcdsaSignature) -> bool {
    signature.normalize_s().is_none()
}

/// Finds the recovery id for a bare `(R, S)` pair over `prehash`.
///
/// Both parities are tried in turn and the first whose recovered signer is
/// `expected` wins. Returns `None` when neither parity recovers `expected`,
/// which means the pair was not produced by that key over that digest.
pub fn recover_and_match(
    prehash: &B256,
    signature: &EcdsaSignature,
    expected: Address,
) -> Option<Signature> {
    let (r, s) = signature.split_bytes();
    let r = U256::from_be_slice(&r);
    let s = U256::from_be_slice(&s);

    [false, true]
        .into_iter()
        .map(|parity| Signature::new(r, s, parity))
        .find(|candidate| {
            candidate
                .recover_address_from_prehash(prehash)
                .is_ok_and(|recovered| recovered == expected)
        })
}

/// Serializes `signature` as `R || S || V` with `V` in `{0, 1}`.
pub fn to_rsv_bytes(signature: &Signature) -> [u8; SIGNATURE_LENGTH] {
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    out[64] = u8::from(signature.v());
    out
}

/// Parses an `R || S || V` signature. `V` must be 0 or 1.
pub fn from_rsv_bytes(bytes: &[u8]) -> Option<Signature> {
    if bytes.len() != SIGNATURE_LENGTH {
        return None;
    }
    let parity = match bytes[64] {
        0 => false,
        1 => true,
        _ => return None,
    };
    Some(Signature::new(
        U256::from_be_slice(&bytes[..32]),
        U256::from_be_slice(&bytes[32..64]),
        parity,
    ))
}

/// Hex encoding of `R || S || V`, without a `0x` prefix.
pub fn to_rsv_hex(signature: &Signature) -> String {
    hex::encode(to_rsv_bytes(signature))
}
