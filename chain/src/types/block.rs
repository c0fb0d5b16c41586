// chain/src/types/block.rs

//! Block type and canonical hashing.
//!
//! This module defines the block data structure used by the replication
//! engine together with the canonical `block_hash` routine. All hashing
//! that depends on a "canonical" form goes through [`Block::compute_hash`]
//! so that every replica agrees on the hash for a given block (invariants
//! I3/I4).

use serde::{Deserialize, Serialize};

use super::{Hash256, Transaction};
use crate::codec;

/// Validator identifier used for the deterministic genesis block.
pub const GENESIS_PROPOSER_ID: &str = "genesis";

/// A block in the replicated log.
///
/// `height` increases by exactly 1 from its parent; `prev_hash` links to
/// the parent's `block_hash`; `block_hash` is the content hash over
/// `{height, prev_hash, concat(tx_hashes), timestamp, proposer_id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub prev_hash: Hash256,
    pub timestamp: f64,
    pub proposer_id: String,
    pub transactions: Vec<Transaction>,
    pub block_hash: Hash256,
    /// Signature bytes, hex-encoded on the wire; may be absent.
    #[serde(default)]
    pub signature: Option<Vec<u8>>,
}

impl Block {
    /// Builds a block from its content fields and fills in `block_hash`.
    ///
    /// Callers should not construct a `Block` value directly with a
    /// hand-computed hash; this constructor is the single place the hash
    /// formula is applied when proposing a new block.
    pub fn new(
        height: u64,
        prev_hash: Hash256,
        timestamp: f64,
        proposer_id: String,
        transactions: Vec<Transaction>,
    ) -> Self {
        let tx_hashes: Vec<&str> = transactions.iter().map(|t| t.tx_id.as_str()).collect();
        let block_hash = codec::block_hash(height, &prev_hash, &tx_hashes, timestamp, &proposer_id);
        Block {
            height,
            prev_hash,
            timestamp,
            proposer_id,
            transactions,
            block_hash,
            signature: None,
        }
    }

    /// The deterministic genesis block: `height=0`, all-zero `prev_hash`,
    /// `timestamp=0.0`, `proposer_id="genesis"`, no transactions. Every
    /// replica with the same codec produces the same `block_hash` for it.
    pub fn genesis() -> Self {
        Block::new(0, Hash256::ZERO, 0.0, GENESIS_PROPOSER_ID.to_string(), Vec::new())
    }

    /// Recomputes `block_hash` from this block's content fields and
    /// compares it against the stored value (invariant I3).
    pub fn compute_hash(&self) -> Hash256 {
        let tx_hashes: Vec<&str> = self.transactions.iter().map(|t| t.tx_id.as_str()).collect();
        codec::block_hash(
            self.height,
            &self.prev_hash,
            &tx_hashes,
            self.timestamp,
            &self.proposer_id,
        )
    }

    /// Returns `true` if `block_hash` matches the recomputed content hash.
    pub fn hash_is_consistent(&self) -> bool {
        self.compute_hash() == self.block_hash
    }

    /// Returns `true` if this block directly follows `parent` in the
    /// chain: height is exactly one greater, and `prev_hash` matches the
    /// parent's `block_hash` (invariants I1/I2).
    pub fn links_to(&self, parent: &Block) -> bool {
        self.height == parent.height + 1 && self.prev_hash == parent.block_hash
    }

    /// Ids of all transactions in this block, for mempool removal.
    pub fn tx_ids(&self) -> Vec<&str> {
        self.transactions.iter().map(|t| t.tx_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_block_is_deterministic() {
        let g1 = Block::genesis();
        let g2 = Block::genesis();
        assert_eq!(g1.block_hash, g2.block_hash);
        assert_eq!(g1.height, 0);
        assert_eq!(g1.prev_hash, Hash256::ZERO);
        assert_eq!(g1.proposer_id, GENESIS_PROPOSER_ID);
        assert!(g1.transactions.is_empty());
    }

    #[test]
    fn block_hash_is_stable_for_same_content() {
        let tx = Transaction::new("alice".into(), "bob".into(), 5, 1000.0);
        let b1 = Block::new(1, Hash256::ZERO, 1001.0, "A".into(), vec![tx.clone()]);
        let b2 = Block::new(1, Hash256::ZERO, 1001.0, "A".into(), vec![tx]);
        assert_eq!(b1.block_hash, b2.block_hash);
    }

    #[test]
    fn block_hash_changes_with_tx_list() {
        let tx1 = Transaction::new("alice".into(), "bob".into(), 5, 1000.0);
        let tx2 = Transaction::new("alice".into(), "carol".into(), 5, 1000.0);
        let b1 = Block::new(1, Hash256::ZERO, 1001.0, "A".into(), vec![tx1]);
        let b2 = Block::new(1, Hash256::ZERO, 1001.0, "A".into(), vec![tx2]);
        assert_ne!(b1.block_hash, b2.block_hash);
    }

    #[test]
    fn links_to_checks_height_and_prev_hash() {
        let genesis = Block::genesis();
        let child = Block::new(1, genesis.block_hash, 1001.0, "A".into(), Vec::new());
        assert!(child.links_to(&genesis));

        let bad_height = Block::new(2, genesis.block_hash, 1001.0, "A".into(), Vec::new());
        assert!(!bad_height.links_to(&genesis));

        let bad_parent = Block::new(1, Hash256([9u8; super::HASH_LEN]), 1001.0, "A".into(), Vec::new());
        assert!(!bad_parent.links_to(&genesis));
    }

    #[test]
    fn tampered_block_fails_hash_consistency() {
        let mut block = Block::genesis();
        block.timestamp = 1.0;
        assert!(!block.hash_is_consistent());
    }

    #[test]
    fn json_roundtrip_preserves_fields() {
        let tx = Transaction::new("alice".into(), "bob".into(), 5, 1000.0);
        let block = Block::new(1, Hash256::ZERO, 1001.0, "A".into(), vec![tx]);
        let encoded = serde_json::to_vec(&block).expect("encode");
        let decoded: Block = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(block, decoded);
    }
}
