use crate::config::{LedgerConfig, ProofMode};
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::mine::{CancelToken, MiningReport, ProofOfWork};
use crate::validation::{is_valid, verify_chain, ChainFault};
use crate::{AccountId, Block, Hash, Transaction, ZERO_HASH};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// A zero-transaction genesis block with a zeroed back-link.
pub fn genesis_block() -> Block {
    Block::new(None, vec![])
}

/// A block appended by a successful mining cycle.
#[derive(Clone, Debug)]
pub struct MinedBlock {
    pub block: Block,
    pub report: MiningReport,
}

/// Single linear chain of sealed blocks plus the pool feeding the next one.
///
/// Mining cycles are the only way to append. They are serialized by an
/// internal gate, while submissions only touch the pool and never wait on a
/// running cycle.
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    pending: Mempool,
    proof: ProofOfWork,
    reward: u64,
    mining: Mutex<()>,
}

#[derive(Serialize)]
struct LedgerView<'a> {
    chain: &'a [Block],
    pending: Vec<Transaction>,
    difficulty: u64,
    proof: ProofMode,
    reward: u64,
    valid: bool,
}

impl Ledger {
    /// Fails when the configured difficulty cannot drive the chosen proof mode.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        Ok(Self::with_proof(config.proof_of_work()?, config.reward))
    }

    pub fn with_proof(proof: ProofOfWork, reward: u64) -> Self {
        let genesis = genesis_block();
        info!(hash = %genesis.hash_hex(), mode = %proof.mode(), difficulty = proof.difficulty(), reward, "ledger created");
        Self {
            chain: RwLock::new(vec![genesis]),
            pending: Mempool::new(),
            proof,
            reward,
            mining: Mutex::new(()),
        }
    }

    pub fn submit(&self, tx: Transaction) {
        info!(from = %tx.from, to = %tx.to, amount = tx.amount, "transaction submitted");
        self.pending.add(tx);
    }

    /// Drains the pool plus a reward for `miner` into a new block on top of
    /// the tip, seals it and appends it.
    pub fn mine_cycle(&self, miner: AccountId) -> Result<MinedBlock> {
        self.mine_cycle_cancellable(miner, &CancelToken::new())
    }

    /// As [`Ledger::mine_cycle`]. If `cancel` fires before sealing completes,
    /// nothing is appended and the drained transactions go back to the front
    /// of the pool.
    pub fn mine_cycle_cancellable(
        &self,
        miner: AccountId,
        cancel: &CancelToken,
    ) -> Result<MinedBlock> {
        let _gate = self.mining.lock();
        info!(%miner, "mining started");

        let reward = Transaction::reward(miner, self.reward);
        info!(from = %reward.from, to = %reward.to, amount = reward.amount, "transaction submitted");
        let mut txs = self.pending.drain_all();
        txs.push(reward);

        let mut block = {
            let chain = self.chain.read();
            Block::new(chain.last(), txs)
        };

        let report = match self.proof.seal(&mut block, cancel) {
            Ok(report) => report,
            Err(err) => {
                let mut txs = block.txs;
                txs.pop();
                warn!(%err, restored = txs.len(), "mining aborted");
                self.pending.restore_front(txs);
                return Err(err);
            }
        };

        self.chain.write().push(block.clone());
        info!(index = block.header.index, hash = %block.hash_hex(), "mining finished");
        Ok(MinedBlock { block, report })
    }

    /// True when every block after genesis is correctly sealed and linked.
    pub fn validate(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(fault) => {
                warn!(%fault, "ledger failed validation");
                false
            }
        }
    }

    pub fn verify(&self) -> std::result::Result<(), ChainFault> {
        verify_chain(&self.chain.read(), &self.proof)
    }

    /// Pretty JSON of the chain, the pending pool and the validation outcome.
    pub fn render(&self) -> Result<String> {
        let chain = self.chain.read();
        let view = LedgerView {
            chain: &chain,
            pending: self.pending.snapshot(),
            difficulty: self.proof.difficulty(),
            proof: self.proof.mode(),
            reward: self.reward,
            valid: is_valid(&chain, &self.proof),
        };
        serde_json::to_string_pretty(&view).map_err(LedgerError::Render)
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Never true: the genesis block is always present.
    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    /// Index and seal of the last block.
    pub fn head(&self) -> (u64, Hash) {
        self.chain
            .read()
            .last()
            .map(|b| (b.header.index, b.hash()))
            .unwrap_or((0, ZERO_HASH))
    }

    pub fn block(&self, position: usize) -> Option<Block> {
        self.chain.read().get(position).cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.snapshot()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn reward(&self) -> u64 {
        self.reward
    }

    pub fn proof(&self) -> ProofOfWork {
        self.proof
    }

    /// Replaces the block at `position` in place and returns the old one.
    ///
    /// This bypasses every invariant the ledger keeps. It models out-of-band
    /// corruption of stored blocks, which [`Ledger::validate`] must then catch.
    pub fn overwrite_block(&self, position: usize, block: Block) -> Result<Block> {
        let mut chain = self.chain.write();
        let len = chain.len();
        let slot = chain
            .get_mut(position)
            .ok_or(LedgerError::BlockOutOfRange { position, len })?;
        warn!(position, hash = %block.hash_hex(), "chain slot overwritten");
        Ok(std::mem::replace(slot, block))
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render().map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId::from_bytes([byte; 16])
    }

    fn ledger() -> Ledger {
        Ledger::new(&LedgerConfig::rounds(10, 1)).unwrap()
    }

    #[test]
    fn starts_with_genesis_only() {
        let ledger = ledger();
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
        let genesis = ledger.block(0).unwrap();
        assert!(genesis.is_genesis());
        assert!(genesis.txs.is_empty());
        assert_eq!(ledger.head(), (0, genesis.hash()));
        assert!(ledger.validate());
    }

    #[test]
    fn rejects_invalid_difficulty() {
        assert!(matches!(
            Ledger::new(&LedgerConfig::rounds(0, 1)),
            Err(LedgerError::InvalidDifficulty { .. })
        ));
        assert!(Ledger::new(&LedgerConfig::leading_zero_bits(300, 1)).is_err());
    }

    #[test]
    fn mining_appends_reward_last() {
        let ledger = ledger();
        let tx = Transaction::new(account(1), account(2), 10);
        ledger.submit(tx);
        assert_eq!(ledger.pending_len(), 1);

        let mined = ledger.mine_cycle(account(9)).unwrap();
        assert_eq!(mined.block.txs, vec![tx, Transaction::reward(account(9), 1)]);
        assert_eq!(mined.report.attempts, 10);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(ledger.head(), (1, mined.block.hash()));
    }

    #[test]
    fn mining_an_empty_pool_still_pays_reward() {
        let ledger = ledger();
        let mined = ledger.mine_cycle(account(9)).unwrap();
        assert_eq!(mined.block.txs.len(), 1);
        assert!(mined.block.txs[0].is_reward());
        assert!(ledger.validate());
    }

    #[test]
    fn cancelled_cycle_restores_pool() {
        let ledger = ledger();
        ledger.submit(Transaction::new(account(1), account(2), 1));
        ledger.submit(Transaction::new(account(1), account(2), 2));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = ledger
            .mine_cycle_cancellable(account(9), &cancel)
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { index: 1 }));
        assert_eq!(ledger.len(), 1);
        let amounts: Vec<u64> = ledger.pending().iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![1, 2]);
    }

    #[test]
    fn overwrite_out_of_range_is_rejected() {
        let ledger = ledger();
        let err = ledger.overwrite_block(3, genesis_block()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BlockOutOfRange { position: 3, len: 1 }
        ));
    }

    #[test]
    fn overwrite_returns_previous_block() {
        let ledger = ledger();
        ledger.mine_cycle(account(9)).unwrap();
        let original = ledger.block(1).unwrap();
        let forged = Block::new(ledger.block(0).as_ref(), vec![]);
        let old = ledger.overwrite_block(1, forged.clone()).unwrap();
        assert_eq!(old, original);
        assert_eq!(ledger.block(1).unwrap(), forged);
    }

    #[test]
    fn render_lists_every_block_field() {
        let ledger = ledger();
        ledger.submit(Transaction::new(account(1), account(2), 10));
        ledger.mine_cycle(account(9)).unwrap();
        ledger.submit(Transaction::new(account(2), account(3), 4));

        let rendered: serde_json::Value = serde_json::from_str(&ledger.render().unwrap()).unwrap();
        assert_eq!(rendered["valid"], true);
        assert_eq!(rendered["reward"], 1);
        assert_eq!(rendered["difficulty"], 10);
        assert_eq!(rendered["proof"], "rounds");
        assert_eq!(rendered["pending"].as_array().unwrap().len(), 1);

        let block = &rendered["chain"][1];
        for field in ["index", "timestamp", "transactions", "previous_hash", "hash"] {
            assert!(block.get(field).is_some(), "missing {field}");
        }
        let tx = &block["transactions"][0];
        assert_eq!(tx["from"], account(1).to_string());
        assert_eq!(tx["to"], account(2).to_string());
        assert_eq!(tx["amount"], 10);
        assert_eq!(ledger.to_string(), ledger.render().unwrap());
    }
}
