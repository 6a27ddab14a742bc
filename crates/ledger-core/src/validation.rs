use crate::mine::ProofOfWork;
use crate::pow::count_leading_zero_bits;
use crate::Block;
use serde::Serialize;
use thiserror::Error;

/// First defect found in a chain. `position` is the slot in the chain, which
/// is not necessarily the block's own `index` once a slot has been replaced.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainFault {
    #[error("chain has no genesis block")]
    Empty,

    #[error("block at position {position}: stored hash {stored} does not match contents ({computed})")]
    SealMismatch {
        position: usize,
        stored: String,
        computed: String,
    },

    #[error("block at position {position}: previous_hash {found} does not link to {expected}")]
    BrokenLink {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("block at position {position}: {zero_bits} leading zero bits, {required} required")]
    InsufficientWork {
        position: usize,
        zero_bits: u32,
        required: u64,
    },
}

/// Walks the chain from position 1 and stops at the first fault.
pub fn verify_chain(chain: &[Block], proof: &ProofOfWork) -> Result<(), ChainFault> {
    if chain.is_empty() {
        return Err(ChainFault::Empty);
    }
    for (offset, pair) in chain.windows(2).enumerate() {
        let position = offset + 1;
        let (previous, current) = (&pair[0], &pair[1]);

        let computed = current.compute_hash();
        if current.hash() != computed {
            return Err(ChainFault::SealMismatch {
                position,
                stored: current.hash_hex(),
                computed: hex::encode(computed),
            });
        }
        if current.header.previous_hash != previous.hash() {
            return Err(ChainFault::BrokenLink {
                position,
                expected: previous.hash_hex(),
                found: hex::encode(current.header.previous_hash),
            });
        }
        if !proof.is_satisfied_by(&current.hash()) {
            return Err(ChainFault::InsufficientWork {
                position,
                zero_bits: count_leading_zero_bits(&current.hash()),
                required: proof.difficulty(),
            });
        }
    }
    Ok(())
}

pub fn is_valid(chain: &[Block], proof: &ProofOfWork) -> bool {
    verify_chain(chain, proof).is_ok()
}
