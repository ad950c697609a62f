use alloy_primitives::U256;
use alloy_sol_types::{sol, SolValue};

/// Length of the signed payload: two 32 byte words.
pub const PAYLOAD_LENGTH: usize = 64;

sol! {
    /// Statement that `blockNumber` has been mined on `chainId`.
    ///
    /// ABI encoding of this static struct is `be256(blockNumber) || be256(chainId)`,
    /// which is exactly what on-chain verifiers rebuild with `abi.encode`.
    #[derive(Debug, PartialEq, Eq)]
    struct BlockAttestation {
        uint256 blockNumber;
        uint256 chainId;
    }
}

impl BlockAttestation {
    /// Attestation for `block_number` on `chain_id`
    pub fn new(block_number: u64, chain_id: u64) -> Self {
        Self {
            blockNumber: U256::from(block_number),
            chainId: U256::from(chain_id),
        }
    }

    /// The exact bytes handed to the signer.
    pub fn signing_payload(&self) -> Vec<u8> {
        self.abi_encode()
    }
}
