use alloy_primitives::Signature;
use ethereum_keys::signature::{to_rsv_bytes, to_rsv_hex, SIGNATURE_LENGTH};
use tracing::{debug, error};

use crate::{attestation_payload::BlockAttestation, signer::Signer, AttestorError};

/// Sign the mined-block attestation for `block_number` on `chain_id`
///
/// The caller is responsible for having checked that the block is mined.
#[tracing::instrument(skip_all, fields(blockNumber = block_number, chainId = chain_id))]
pub async fn sign_block_attestation(
    block_number: u64,
    chain_id: u64,
    signer: &impl Signer,
) -> Result<SignedAttestation, AttestorError> {
    let payload = BlockAttestation::new(block_number, chain_id).signing_payload();
    debug!(payloadLen = payload.len(), "signing block attestation");

    let signature = signer.sign_message(&payload).await.map_err(|e| {
        error!(error = %e, "failed to sign block attestation");
        AttestorError::SignerError(e)
    })?;

    debug!(
        signature = %to_rsv_hex(&signature),
        "block attestation signed successfully"
    );

    Ok(SignedAttestation {
        block_number,
        chain_id,
        payload,
        signature,
    })
}

/// Signed statement that a block has been mined
#[derive(Clone, Debug)]
pub struct SignedAttestation {
    /// Block number being attested
    pub block_number: u64,
    /// Chain the block belongs to
    pub chain_id: u64,
    /// `be256(block_number) || be256(chain_id)`
    pub payload: Vec<u8>,
    /// Signature over `keccak256(payload)`
    pub signature: Signature,
}

impl SignedAttestation {
    /// 65 byte `R || S || V` signature, `V` in `{0, 1}`
    pub fn signature_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        to_rsv_bytes(&self.signature)
    }

    pub fn signature_hex(&self) -> String {
        to_rsv_hex(&self.signature)
    }
}
