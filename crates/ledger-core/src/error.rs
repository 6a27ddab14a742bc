use crate::config::ProofMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid difficulty {difficulty} for {mode} proof of work: {reason}")]
    InvalidDifficulty {
        mode: ProofMode,
        difficulty: u64,
        reason: &'static str,
    },

    #[error("mining of block {index} was cancelled")]
    MiningCancelled { index: u64 },

    #[error("nonce space exhausted while mining block {index}")]
    NonceSpaceExhausted { index: u64 },

    #[error("no block at position {position} (chain length {len})")]
    BlockOutOfRange { position: usize, len: usize },

    #[error("invalid account id {0}")]
    InvalidAccountId(String),

    #[error("invalid ledger config: {0}")]
    Config(#[source] serde_json::Error),

    #[error("failed to render ledger: {0}")]
    Render(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
