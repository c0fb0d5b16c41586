//! Consensus-level error taxonomy.
//!
//! Per the error-handling design, these are never thrown across loop
//! boundaries: every consensus handler returns a `Result`, and the node
//! orchestrator logs `Err` and moves on rather than unwinding.

use std::fmt;

use crate::store::StoreError;

/// Reasons a consensus handler rejects or aborts an operation.
#[derive(Debug)]
pub enum ConsensusError {
    /// A message failed structural or protocol validation (bad prev-hash,
    /// bad height, wrong leader, bad hash, bad signature). The message is
    /// dropped; consensus state is not mutated.
    Validation(&'static str),
    /// The chain store rejected or failed an append.
    Store(StoreError),
    /// An internal invariant was violated (height went backwards, quorum
    /// reached with no pending proposal, etc). The specific operation
    /// aborts; the node keeps running.
    InvariantViolation(String),
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::Validation(reason) => write!(f, "validation error: {reason}"),
            ConsensusError::Store(e) => write!(f, "store error: {e}"),
            ConsensusError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for ConsensusError {}

impl From<StoreError> for ConsensusError {
    fn from(e: StoreError) -> Self {
        ConsensusError::Store(e)
    }
}
