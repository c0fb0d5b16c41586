//! In-memory chain store, for tests and simulation.

use super::{ChainStore, StoreError, validate_append};
use crate::types::{Block, Hash256};

/// In-memory implementation of [`ChainStore`]. Starts from genesis and
/// keeps every block in a `Vec` indexed by height.
pub struct MemChainStore {
    blocks: Vec<Block>,
}

impl MemChainStore {
    /// Creates a new store seeded with the deterministic genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    fn tip(&self) -> &Block {
        self.blocks.last().expect("store always has at least genesis")
    }
}

impl Default for MemChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore for MemChainStore {
    fn height(&self) -> u64 {
        self.tip().height
    }

    fn head_hash(&self) -> Hash256 {
        self.tip().block_hash
    }

    fn get(&self, height: u64) -> Option<Block> {
        self.blocks.get(height as usize).cloned()
    }

    fn append(&mut self, block: Block) -> Result<(), StoreError> {
        validate_append(self.tip(), &block)?;
        self.blocks.push(block);
        Ok(())
    }
}
