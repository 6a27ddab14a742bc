use crate::constants::{DEFAULT_REWARD, DEFAULT_ROUNDS, POW_TARGET_DIFFICULTY};
use crate::error::{LedgerError, Result};
use crate::mine::ProofOfWork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How `difficulty` is interpreted when sealing a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofMode {
    /// Recompute the seal exactly `difficulty` times. No input is varied, so
    /// the result equals the block's initial hash.
    #[default]
    Rounds,
    /// Search nonces until the seal has at least `difficulty` leading zero bits.
    LeadingZeroBits,
}

impl ProofMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofMode::Rounds => "rounds",
            ProofMode::LeadingZeroBits => "leading-zero-bits",
        }
    }

    pub fn default_difficulty(&self) -> u64 {
        match self {
            ProofMode::Rounds => DEFAULT_ROUNDS,
            ProofMode::LeadingZeroBits => POW_TARGET_DIFFICULTY,
        }
    }
}

impl fmt::Display for ProofMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rounds" => Ok(ProofMode::Rounds),
            "leading-zero-bits" => Ok(ProofMode::LeadingZeroBits),
            other => Err(format!(
                "unknown proof mode {other:?} (expected rounds or leading-zero-bits)"
            )),
        }
    }
}

/// Construction parameters for a [`crate::Ledger`]. Missing JSON fields take
/// their defaults, with `difficulty` defaulting per `proof` mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct LedgerConfig {
    pub difficulty: u64,
    /// Amount credited to the miner of every block.
    pub reward: u64,
    pub proof: ProofMode,
}

#[derive(Deserialize)]
struct ConfigFile {
    difficulty: Option<u64>,
    reward: Option<u64>,
    proof: Option<ProofMode>,
}

impl ConfigFile {
    fn resolve(self, proof_override: Option<ProofMode>) -> LedgerConfig {
        let proof = proof_override.or(self.proof).unwrap_or_default();
        LedgerConfig {
            difficulty: self.difficulty.unwrap_or(proof.default_difficulty()),
            reward: self.reward.unwrap_or(DEFAULT_REWARD),
            proof,
        }
    }
}

impl From<ConfigFile> for LedgerConfig {
    fn from(file: ConfigFile) -> Self {
        file.resolve(None)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_ROUNDS,
            reward: DEFAULT_REWARD,
            proof: ProofMode::Rounds,
        }
    }
}

impl LedgerConfig {
    /// Default difficulty and reward for `proof`.
    pub fn for_mode(proof: ProofMode) -> Self {
        Self {
            difficulty: proof.default_difficulty(),
            reward: DEFAULT_REWARD,
            proof,
        }
    }

    pub fn rounds(difficulty: u64, reward: u64) -> Self {
        Self {
            difficulty,
            reward,
            proof: ProofMode::Rounds,
        }
    }

    pub fn leading_zero_bits(difficulty: u64, reward: u64) -> Self {
        Self {
            difficulty,
            reward,
            proof: ProofMode::LeadingZeroBits,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(LedgerError::Config)
    }

    /// Like [`LedgerConfig::from_json`], but `proof` replaces the file's mode
    /// before a missing difficulty is defaulted.
    pub fn from_json_with_mode(json: &str, proof: Option<ProofMode>) -> Result<Self> {
        serde_json::from_str::<ConfigFile>(json)
            .map(|file| file.resolve(proof))
            .map_err(LedgerError::Config)
    }

    pub fn proof_of_work(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(self.proof, self.difficulty)
    }
}
