//! Chain Store: the append-only, hash-chained block log.
//!
//! [`ChainStore`] is the abstract contract the consensus core depends on;
//! [`MemChainStore`] is an in-memory implementation for tests, and
//! [`JsonChainStore`] (in [`json`]) is the durable, file-backed production
//! backend described by the persistent state layout.

pub mod json;
mod mem;

pub use json::JsonChainStore;
pub use mem::MemChainStore;

use crate::types::{Block, Hash256};

/// Reason a store operation failed, returned alongside `ok=false` rather
/// than thrown, per the explicit-result-over-exceptions redesign.
#[derive(Debug)]
pub enum StoreError {
    /// `append` was called with a block that does not extend the
    /// current tip (bad height, bad `prev_hash`, or bad `block_hash`).
    InvalidAppend(&'static str),
    /// The underlying file could not be read or written.
    Io(std::io::Error),
    /// The on-disk chain file could not be parsed as JSON.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidAppend(reason) => write!(f, "invalid append: {reason}"),
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Corrupt(msg) => write!(f, "corrupt chain file: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Append-only, durable, recoverable block log.
///
/// Implementations must enforce I1 (link), I2 (height), and I3 (integrity)
/// on every `append`; a failed append must leave the store unchanged.
pub trait ChainStore: Send {
    /// Height of the tip (0 for a store containing only genesis).
    fn height(&self) -> u64;

    /// `block_hash` of the tip.
    fn head_hash(&self) -> Hash256;

    /// Fetches the block at `height`, if present.
    fn get(&self, height: u64) -> Option<Block>;

    /// Validates `block` against the current tip (I1-I3) and, on success,
    /// durably persists it and advances the tip. On failure the store is
    /// left unchanged and the reason is returned.
    fn append(&mut self, block: Block) -> Result<(), StoreError>;

    /// Inclusive range of block headers (full blocks here, since this
    /// profile does not separate a lighter header type) for `from..=to`.
    /// Heights outside the stored range are simply omitted.
    fn headers_range(&self, from: u64, to: u64) -> Vec<Block> {
        self.blocks_range(from, to)
    }

    /// Inclusive range of full blocks for `from..=to`.
    fn blocks_range(&self, from: u64, to: u64) -> Vec<Block> {
        (from..=to).filter_map(|h| self.get(h)).collect()
    }
}

/// Validates that `block` may be appended on top of `tip`, returning the
/// reason if not. Shared by every [`ChainStore`] implementation so the
/// I1-I3 checks cannot drift between backends.
pub(crate) fn validate_append(tip: &Block, block: &Block) -> Result<(), StoreError> {
    if !block.links_to(tip) {
        return Err(StoreError::InvalidAppend(
            "height/prev_hash does not extend the current tip",
        ));
    }
    if !block.hash_is_consistent() {
        return Err(StoreError::InvalidAppend(
            "block_hash does not match recomputed content hash",
        ));
    }
    Ok(())
}
