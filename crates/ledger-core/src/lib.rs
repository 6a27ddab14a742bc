pub mod account;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod mempool;
pub mod mine;
pub mod validation;

pub use account::AccountId;
pub use chain::{Ledger, MinedBlock};
pub use config::{LedgerConfig, ProofMode};
pub use error::{LedgerError, Result};
pub use mempool::Mempool;
pub use mine::{CancelToken, MiningReport, ProofOfWork};
pub use validation::{verify_chain, ChainFault};

use constants::{ACCOUNT_ID_SIZE, HASH_SIZE, HEADER_HASH_INPUT_SIZE, U64_SIZE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub type Hash = [u8; HASH_SIZE];

/// Back-link carried by the genesis block.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// Milliseconds since the unix epoch, clamped to 0 on a clock set before 1970.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// A transfer between two accounts. Sender and recipient are not authenticated
/// and amounts are not checked against any balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
}

impl Transaction {
    pub const CANONICAL_SIZE: usize = ACCOUNT_ID_SIZE * 2 + U64_SIZE;

    pub fn new(from: AccountId, to: AccountId, amount: u64) -> Self {
        Self { from, to, amount }
    }

    /// Issuance from the system account, used to pay the miner of a block.
    pub fn reward(to: AccountId, amount: u64) -> Self {
        Self::new(AccountId::SYSTEM, to, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.from.is_system()
    }

    /// `from || to || amount (LE)`; the form that feeds the merkle root.
    pub fn canonical_bytes(&self) -> [u8; Self::CANONICAL_SIZE] {
        let mut bytes = [0u8; Self::CANONICAL_SIZE];
        bytes[..ACCOUNT_ID_SIZE].copy_from_slice(self.from.as_bytes());
        bytes[ACCOUNT_ID_SIZE..ACCOUNT_ID_SIZE * 2].copy_from_slice(self.to.as_bytes());
        bytes[ACCOUNT_ID_SIZE * 2..].copy_from_slice(&self.amount.to_le_bytes());
        bytes
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.amount)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: u64,
    #[serde(with = "hex")]
    pub previous_hash: Hash,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn new(index: u64, previous_hash: Hash, timestamp: u64) -> Self {
        Self {
            index,
            timestamp,
            previous_hash,
            nonce: 0,
        }
    }

    /// Canonical hash input for a header committing to `tx_count` transactions
    /// with the given merkle root.
    pub fn hash_bytes(&self, merkle_root: &Hash, tx_count: u64) -> [u8; HEADER_HASH_INPUT_SIZE] {
        let mut bytes = [0u8; HEADER_HASH_INPUT_SIZE];
        let mut at = 0;
        for part in [
            &self.index.to_le_bytes()[..],
            &self.previous_hash[..],
            &merkle_root[..],
            &tx_count.to_le_bytes()[..],
            &self.timestamp.to_le_bytes()[..],
            &self.nonce.to_le_bytes()[..],
        ] {
            bytes[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        bytes
    }

    pub fn digest(&self, merkle_root: &Hash, tx_count: u64) -> Hash {
        sha256(&[&self.hash_bytes(merkle_root, tx_count)])
    }
}

/// A batch of transactions linked to its predecessor by `previous_hash`.
///
/// Everything except the stored seal is fixed at construction. The seal is
/// only rewritten by the miner, so a block taken from the ledger satisfies
/// `hash() == compute_hash()` unless it was tampered with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    #[serde(rename = "transactions")]
    pub txs: Vec<Transaction>,
    #[serde(with = "hex")]
    hash: Hash,
}

impl Block {
    /// Builds the successor of `previous`, or a genesis block when there is none.
    pub fn new(previous: Option<&Block>, txs: Vec<Transaction>) -> Self {
        Self::new_at(previous, txs, unix_millis())
    }

    pub fn new_at(previous: Option<&Block>, txs: Vec<Transaction>, timestamp: u64) -> Self {
        let (index, previous_hash) = match previous {
            Some(prev) => (prev.header.index + 1, prev.hash),
            None => (0, ZERO_HASH),
        };
        let mut block = Self {
            header: BlockHeader::new(index, previous_hash, timestamp),
            txs,
            hash: ZERO_HASH,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The stored seal.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Recomputes the seal from the block's current contents.
    pub fn compute_hash(&self) -> Hash {
        self.header
            .digest(&self.merkle_root(), self.txs.len() as u64)
    }

    pub fn merkle_root(&self) -> Hash {
        merkle_root(&self.txs)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.index == 0 && self.header.previous_hash == ZERO_HASH
    }

    pub(crate) fn seal(&mut self, hash: Hash) {
        self.hash = hash;
    }
}

pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return ZERO_HASH;
    }
    let mut level: Vec<Hash> = txs
        .iter()
        .map(|t| sha256(&[&t.canonical_bytes()]))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let (a, b) = if pair.len() == 2 {
                (pair[0], pair[1])
            } else {
                (pair[0], pair[0])
            };
            next.push(sha256(&[&a, &b]));
        }
        level = next;
    }
    level[0]
}

pub mod pow {
    use super::Hash;

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    pub fn meets_target(hash: &Hash, target_zeros: u64) -> bool {
        u64::from(count_leading_zero_bits(hash)) >= target_zeros
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId::from_bytes([byte; ACCOUNT_ID_SIZE])
    }

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::new(account(1), account(2), 10),
            Transaction::new(account(2), account(3), 5),
        ]
    }

    fn sample_block() -> Block {
        let genesis = Block::new_at(None, vec![], 1_600_000_000);
        Block::new_at(Some(&genesis), sample_txs(), 1_600_000_200)
    }

    #[test]
    fn leading_zero_bits_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::count_leading_zero_bits(&h), 256);
        h[0] = 0x0F; // 00001111
        assert_eq!(pow::count_leading_zero_bits(&h), 4);
        h = [0u8; 32];
        h[1] = 0x80; // 00000000 10000000
        assert_eq!(pow::count_leading_zero_bits(&h), 8);
        h[1] = 0x40; // 01000000
        assert_eq!(pow::count_leading_zero_bits(&h), 9);
        assert!(pow::meets_target(&h, 9));
        assert!(!pow::meets_target(&h, 10));
    }

    #[test]
    fn canonical_bytes_layout() {
        let tx = Transaction::new(account(1), account(2), 42);
        let bytes = tx.canonical_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[0..16], &[1u8; 16]);
        assert_eq!(&bytes[16..32], &[2u8; 16]);
        assert_eq!(&bytes[32..40], &42u64.to_le_bytes());
    }

    #[test]
    fn reward_transaction_comes_from_system() {
        let tx = Transaction::reward(account(9), 1);
        assert!(tx.is_reward());
        assert_eq!(tx.from, AccountId::SYSTEM);
        assert!(!Transaction::new(account(1), account(9), 1).is_reward());
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new(account(1), account(2), 10);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"from":"01010101010101010101010101010101","to":"02020202020202020202020202020202","amount":10}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn merkle_root_empty_txs() {
        assert_eq!(merkle_root(&[]), ZERO_HASH);
    }

    #[test]
    fn merkle_root_single_tx() {
        let txs = sample_txs();
        let root = merkle_root(&txs[..1]);
        assert_eq!(root, sha256(&[&txs[0].canonical_bytes()]));
    }

    #[test]
    fn merkle_root_two_txs() {
        let txs = sample_txs();
        let h1 = sha256(&[&txs[0].canonical_bytes()]);
        let h2 = sha256(&[&txs[1].canonical_bytes()]);
        assert_eq!(merkle_root(&txs), sha256(&[&h1, &h2]));
    }

    #[test]
    fn merkle_root_depends_on_order() {
        let txs = sample_txs();
        let reversed: Vec<_> = txs.iter().rev().copied().collect();
        assert_ne!(merkle_root(&txs), merkle_root(&reversed));
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::new(None, vec![]);
        assert_eq!(genesis.header.index, 0);
        assert_eq!(genesis.header.previous_hash, ZERO_HASH);
        assert!(genesis.txs.is_empty());
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash(), genesis.compute_hash());
    }

    #[test]
    fn successor_links_to_previous() {
        let genesis = Block::new(None, vec![]);
        let next = Block::new(Some(&genesis), sample_txs());
        assert_eq!(next.header.index, 1);
        assert_eq!(next.header.previous_hash, genesis.hash());
        assert!(!next.is_genesis());
    }

    #[test]
    fn block_hash_example() {
        let block = sample_block();
        let expected_hex = "e673927f23c9a3535e31ae5e49a48e2902eda319920d794fdedecf4b9b8a87e2";
        assert_eq!(block.hash_hex(), expected_hex);
        assert_eq!(hex::encode(block.compute_hash()), expected_hex);
    }

    #[test]
    fn block_hash_consistency() {
        let block = sample_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
        assert_eq!(block.hash(), block.compute_hash());
        assert_eq!(block.hash_hex().len(), constants::HASH_HEX_SIZE);
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let mut block = sample_block();
        let hash1 = block.compute_hash();
        block.header.nonce += 1;
        assert_ne!(hash1, block.compute_hash());
        // The stored seal is untouched until the miner reseals.
        assert_eq!(block.hash(), hash1);
    }

    #[test]
    fn block_hash_changes_with_amount() {
        let mut block = sample_block();
        block.txs[0].amount += 1;
        assert_ne!(block.hash(), block.compute_hash());
    }

    #[test]
    fn duplicated_last_leaf_changes_hash() {
        let genesis = Block::new_at(None, vec![], 0);
        let mut txs = sample_txs();
        txs.push(Transaction::new(account(3), account(4), 1));
        let three = Block::new_at(Some(&genesis), txs.clone(), 7);
        txs.push(txs[2]);
        let four = Block::new_at(Some(&genesis), txs, 7);
        assert_eq!(three.merkle_root(), four.merkle_root());
        assert_ne!(three.compute_hash(), four.compute_hash());
    }

    #[test]
    fn block_header_hash_bytes_example() {
        let mut header = BlockHeader::new(1, ZERO_HASH, 1_600_000_000);
        header.nonce = 42;
        let bytes = header.hash_bytes(&[1u8; 32], 3);
        assert_eq!(bytes.len(), 96);
        assert_eq!(&bytes[0..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..40], &[0u8; 32]);
        assert_eq!(&bytes[40..72], &[1u8; 32]);
        assert_eq!(&bytes[72..80], &3u64.to_le_bytes());
        assert_eq!(&bytes[80..88], &1_600_000_000u64.to_le_bytes());
        assert_eq!(&bytes[88..96], &42u64.to_le_bytes());
    }

    #[test]
    fn block_serialization_example() {
        let block = sample_block();
        let value = serde_json::to_value(&block).unwrap();
        for field in ["index", "timestamp", "previous_hash", "nonce", "transactions", "hash"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["hash"], block.hash_hex());
        let deserialized: Block = serde_json::from_value(value).unwrap();
        assert_eq!(block, deserialized);
    }
}
