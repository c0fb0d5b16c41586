//! Mutable consensus state.
//!
//! Every field here is protected by the single logical mutex the
//! concurrency model calls for: one [`ConsensusState`] instance lives
//! behind one `tokio::sync::Mutex`, and the engine's handlers never hold
//! a second lock on it re-entrantly. `active`/`failed` live in this same
//! record (rather than a separate `ValidatorSet`-owned lock) specifically
//! so the view-change path never has to acquire two locks in a racy
//! order.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use crate::types::{Block, ValidatorId};

/// A block a replica is currently collecting ACKs for (leader) or holding
/// pending commit (follower).
#[derive(Clone, Debug)]
pub struct PendingProposal {
    pub height: u64,
    pub block: Block,
    pub leader: ValidatorId,
}

/// All per-replica consensus bookkeeping.
pub struct ConsensusState {
    pub current_view: u64,
    pub active: BTreeSet<ValidatorId>,
    pub failed: BTreeSet<ValidatorId>,
    pub pending_proposal: Option<PendingProposal>,
    pub acks_received: HashMap<u64, HashSet<ValidatorId>>,
    /// Dedupes ACK emission, keyed by `(height, leader)` so a new leader
    /// after a view change gets a fresh ACK even at the same height.
    pub acks_sent: HashSet<(u64, ValidatorId)>,
    /// CAS guard: set when a leader starts appending on quorum, cleared
    /// on success or failure, preventing a double commit under
    /// concurrent ACK delivery.
    pub committing: HashSet<u64>,
    pub commits_processing: HashSet<u64>,
    pub commits_broadcast: HashSet<u64>,
    pub view_change_votes: HashMap<u64, HashSet<ValidatorId>>,
    pub view_change_initiated_for: HashSet<ValidatorId>,
    pub last_view_change_initiation: Option<Instant>,
    pub last_block_time: Instant,
}

impl ConsensusState {
    /// Seeds state for a freshly started replica: every validator starts
    /// active, nobody has failed yet, view 0.
    pub fn new(initial_active: impl IntoIterator<Item = ValidatorId>) -> Self {
        Self {
            current_view: 0,
            active: initial_active.into_iter().collect(),
            failed: BTreeSet::new(),
            pending_proposal: None,
            acks_received: HashMap::new(),
            acks_sent: HashSet::new(),
            committing: HashSet::new(),
            commits_processing: HashSet::new(),
            commits_broadcast: HashSet::new(),
            view_change_votes: HashMap::new(),
            view_change_initiated_for: HashSet::new(),
            last_view_change_initiation: None,
            last_block_time: Instant::now(),
        }
    }

    /// `active_validators` sorted, falling back to the full validator set
    /// if `active` has been emptied (every validator individually
    /// believed failed by this replica).
    pub fn active_sorted(&self, full_set: &[ValidatorId]) -> Vec<ValidatorId> {
        if self.active.is_empty() {
            full_set.to_vec()
        } else {
            self.active.iter().cloned().collect()
        }
    }

    /// Dynamic ACK quorum: `|active_validators|`, using the same
    /// full-set fallback as leader selection.
    pub fn ack_quorum(&self, full_set: &[ValidatorId]) -> usize {
        self.active_sorted(full_set).len()
    }
}
