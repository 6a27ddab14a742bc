use crate::Transaction;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Transactions waiting for the next block, in submission order.
///
/// All access goes through one lock, so a drain never races an add: a
/// transaction lands either in the drained batch or in the pool, never both.
#[derive(Debug, Default)]
pub struct Mempool {
    queue: Mutex<VecDeque<Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tx: Transaction) {
        self.queue.lock().push_back(tx);
    }

    /// Takes every pending transaction, leaving the pool empty.
    pub fn drain_all(&self) -> Vec<Transaction> {
        self.queue.lock().drain(..).collect()
    }

    /// Puts a previously drained batch back ahead of anything submitted since.
    pub fn restore_front(&self, txs: Vec<Transaction>) {
        let mut queue = self.queue.lock();
        for tx in txs.into_iter().rev() {
            queue.push_front(tx);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.queue.lock().iter().copied().collect()
    }
}
