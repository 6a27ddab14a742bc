use crate::config::ProofMode;
use crate::constants::MAX_LEADING_ZERO_BITS;
use crate::error::{LedgerError, Result};
use crate::pow::{count_leading_zero_bits, meets_target};
use crate::{Block, Hash};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Shared flag for stopping an in-flight mining call.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// True when both handles refer to the same flag.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningReport {
    pub mode: ProofMode,
    /// Seal recomputations performed (rounds, or nonces tried).
    pub attempts: u64,
    pub nonce: u64,
    pub elapsed: Duration,
}

/// Validated proof-of-work settings: a mode plus a positive difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    mode: ProofMode,
    difficulty: u64,
}

impl ProofOfWork {
    pub fn new(mode: ProofMode, difficulty: u64) -> Result<Self> {
        let invalid = |reason| LedgerError::InvalidDifficulty {
            mode,
            difficulty,
            reason,
        };
        if difficulty == 0 {
            return Err(invalid("difficulty must be positive"));
        }
        if mode == ProofMode::LeadingZeroBits && difficulty > MAX_LEADING_ZERO_BITS {
            return Err(invalid("a 256-bit hash has at most 256 leading zero bits"));
        }
        Ok(Self { mode, difficulty })
    }

    pub fn rounds(rounds: u64) -> Result<Self> {
        Self::new(ProofMode::Rounds, rounds)
    }

    pub fn leading_zero_bits(bits: u64) -> Result<Self> {
        Self::new(ProofMode::LeadingZeroBits, bits)
    }

    pub fn mode(&self) -> ProofMode {
        self.mode
    }

    pub fn difficulty(&self) -> u64 {
        self.difficulty
    }

    /// Whether a seal carries enough work. Always true in rounds mode, which
    /// imposes no condition on the digest.
    pub fn is_satisfied_by(&self, hash: &Hash) -> bool {
        match self.mode {
            ProofMode::Rounds => true,
            ProofMode::LeadingZeroBits => meets_target(hash, self.difficulty),
        }
    }

    /// Seals `block` in place. Only `header.nonce` (leading-zero-bits mode) and
    /// the stored hash change. On error the block must not be appended.
    pub fn seal(&self, block: &mut Block, cancel: &CancelToken) -> Result<MiningReport> {
        let started = Instant::now();
        debug!(
            index = block.header.index,
            mode = %self.mode,
            difficulty = self.difficulty,
            "sealing block"
        );
        let attempts = match self.mode {
            ProofMode::Rounds => seal_rounds(block, self.difficulty, cancel)?,
            ProofMode::LeadingZeroBits => seal_leading_zeros(block, self.difficulty, cancel)?,
        };
        let report = MiningReport {
            mode: self.mode,
            attempts,
            nonce: block.header.nonce,
            elapsed: started.elapsed(),
        };
        info!(
            "Mined block {} with nonce {} after {} attempts in {:?}, hash {}",
            block.header.index,
            report.nonce,
            report.attempts,
            report.elapsed,
            block.hash_hex()
        );
        Ok(report)
    }
}

fn seal_rounds(block: &mut Block, rounds: u64, cancel: &CancelToken) -> Result<u64> {
    for _ in 0..rounds {
        if cancel.is_cancelled() {
            return Err(LedgerError::MiningCancelled {
                index: block.header.index,
            });
        }
        let hash = block.compute_hash();
        block.seal(hash);
    }
    Ok(rounds)
}

/// Searches nonces in parallel until a header hash has at least `target`
/// leading zero bits.
fn seal_leading_zeros(block: &mut Block, target: u64, cancel: &CancelToken) -> Result<u64> {
    let index = block.header.index;
    // Only the nonce varies per attempt; the merkle root is computed once.
    let merkle = block.merkle_root();
    let tx_count = block.txs.len() as u64;
    let base_header = block.header;
    let attempts = AtomicU64::new(0);

    let found = (0u64..u64::MAX).into_par_iter().find_any(|nonce| {
        if cancel.is_cancelled() {
            return true;
        }
        attempts.fetch_add(1, Ordering::Relaxed);
        let mut header = base_header;
        header.nonce = *nonce;
        meets_target(&header.digest(&merkle, tx_count), target)
    });

    if cancel.is_cancelled() {
        return Err(LedgerError::MiningCancelled { index });
    }
    let nonce = found.ok_or(LedgerError::NonceSpaceExhausted { index })?;

    block.header.nonce = nonce;
    let hash = block.compute_hash();
    debug!(
        index,
        nonce,
        zero_bits = count_leading_zero_bits(&hash),
        "found nonce"
    );
    block.seal(hash);
    Ok(attempts.into_inner())
}
