//! Mempool: the set of unconfirmed transactions.
//!
//! Keyed by `tx_id` so resubmission is naturally idempotent. All
//! operations serialize under the single mutex the caller wraps this type
//! in (see [`crate::node::Node`]); this type itself is not internally
//! synchronized — short, synchronous methods only.

use std::collections::{HashMap, HashSet};

use crate::types::Transaction;

/// In-memory, `tx_id`-keyed set of unconfirmed transactions.
///
/// `seen` records every `tx_id` that has ever been committed in a block on
/// this replica, so that stale gossip (a `TX`/`MEMPOOL_SYNC` for a
/// transaction already included in a committed block) cannot re-add it.
#[derive(Default)]
pub struct Mempool {
    txs: HashMap<String, Transaction>,
    seen: HashSet<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tx`. Returns `false` (no-op) if `tx_id` is already present
    /// or was already committed in a prior block on this replica.
    pub fn add(&mut self, tx: Transaction) -> bool {
        if self.seen.contains(&tx.tx_id) || self.txs.contains_key(&tx.tx_id) {
            return false;
        }
        self.txs.insert(tx.tx_id.clone(), tx);
        true
    }

    /// Removes every transaction whose id is in `ids`, e.g. after the
    /// block containing them commits, and marks each as seen so stale
    /// gossip for the same ids cannot re-add it.
    pub fn remove_many(&mut self, ids: &[&str]) {
        for id in ids {
            self.txs.remove(*id);
            self.seen.insert(id.to_string());
        }
    }

    /// Returns up to `limit` transactions for inclusion in a proposal.
    /// Ordering is unspecified but stable within a single call.
    pub fn take(&self, limit: usize) -> Vec<Transaction> {
        self.txs.values().take(limit).cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.txs.len()
    }

    pub fn get(&self, tx_id: &str) -> Option<&Transaction> {
        self.txs.get(tx_id)
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.txs.values().cloned().collect()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.txs.contains_key(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sender: &str) -> Transaction {
        Transaction::new(sender.into(), "bob".into(), 5, 1000.0)
    }

    #[test]
    fn add_is_idempotent_for_same_tx_id() {
        let mut pool = Mempool::new();
        let t = tx("alice");
        assert!(pool.add(t.clone()));
        assert!(!pool.add(t));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn remove_many_clears_committed_txs() {
        let mut pool = Mempool::new();
        let t1 = tx("alice");
        let t2 = tx("carol");
        pool.add(t1.clone());
        pool.add(t2.clone());
        pool.remove_many(&[t1.tx_id.as_str()]);
        assert_eq!(pool.size(), 1);
        assert!(pool.get(&t2.tx_id).is_some());
        assert!(pool.get(&t1.tx_id).is_none());
    }

    #[test]
    fn committed_tx_is_not_readded_from_stale_gossip() {
        let mut pool = Mempool::new();
        let t = tx("alice");
        pool.add(t.clone());
        pool.remove_many(&[t.tx_id.as_str()]);
        assert!(!pool.add(t), "a committed tx_id must stay rejected");
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn take_respects_limit() {
        let mut pool = Mempool::new();
        for i in 0..5u64 {
            pool.add(Transaction::new(format!("s{i}"), "bob".into(), i, 1000.0 + i as f64));
        }
        assert_eq!(pool.take(3).len(), 3);
        assert_eq!(pool.take(100).len(), 5);
    }
}
