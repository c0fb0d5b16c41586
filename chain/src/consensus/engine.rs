//! Consensus Core: leader rotation, proposal lifecycle, quorum, view
//! change, and sync.
//!
//! [`ConsensusEngine`] is deliberately not wired to the network or to the
//! node orchestrator: every handler takes the inputs it needs, mutates
//! the shared [`ConsensusState`]/[`crate::store::ChainStore`]/
//! [`crate::mempool::Mempool`] under their respective locks, and returns
//! the outbound messages the caller should send. This replaces the
//! original's `Node`-back-reference with an explicit action list the
//! orchestrator drains and applies — the engine never calls back into
//! the node.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::codec;
use crate::mempool::Mempool;
use crate::net::Message;
use crate::store::ChainStore;
use crate::types::{Block, Hash256, Transaction, ValidatorId};

use super::config::ConsensusTiming;
use super::error::ConsensusError;
use super::state::{ConsensusState, PendingProposal};
use super::validator_set::ValidatorSet;

/// One message this replica should send as a result of handling some
/// input. The orchestrator is responsible for wrapping these in an
/// [`crate::net::Envelope`] and handing them to [`crate::net::Connections`].
#[derive(Clone, Debug)]
pub enum OutboundAction {
    Broadcast(Message),
    SendTo(ValidatorId, Message),
    /// Dedup'd against multiple live connections to the same leader.
    SendToLeader(ValidatorId, Message),
}

/// Pre-shared signing key material for the simplified (HMAC) signature
/// profile. Key derivation itself is out of scope; this is just the
/// opaque key bytes loaded from config.
#[derive(Clone)]
pub struct SigningKey(pub Vec<u8>);

/// The consensus core for one replica.
pub struct ConsensusEngine {
    local_id: ValidatorId,
    validators: Arc<ValidatorSet>,
    timing: ConsensusTiming,
    signing_key: Option<SigningKey>,
    store: Arc<Mutex<Box<dyn ChainStore>>>,
    mempool: Arc<Mutex<Mempool>>,
    state: Arc<Mutex<ConsensusState>>,
}

impl ConsensusEngine {
    pub fn new(
        local_id: ValidatorId,
        validators: Arc<ValidatorSet>,
        timing: ConsensusTiming,
        signing_key: Option<SigningKey>,
        store: Arc<Mutex<Box<dyn ChainStore>>>,
        mempool: Arc<Mutex<Mempool>>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ConsensusState::new(validators.all().to_vec())));
        Self {
            local_id,
            validators,
            timing,
            signing_key,
            store,
            mempool,
            state,
        }
    }

    pub fn local_id(&self) -> &ValidatorId {
        &self.local_id
    }

    pub fn timing(&self) -> &ConsensusTiming {
        &self.timing
    }

    pub fn validators(&self) -> &Arc<ValidatorSet> {
        &self.validators
    }

    pub fn store(&self) -> &Arc<Mutex<Box<dyn ChainStore>>> {
        &self.store
    }

    pub fn mempool(&self) -> &Arc<Mutex<Mempool>> {
        &self.mempool
    }

    // ---- admin accessors (§6 administrative read API) ----

    pub async fn current_view(&self) -> u64 {
        self.state.lock().await.current_view
    }

    pub async fn active_validators(&self) -> Vec<ValidatorId> {
        let state = self.state.lock().await;
        state.active_sorted(self.validators.all())
    }

    pub async fn failed_validators(&self) -> Vec<ValidatorId> {
        self.state.lock().await.failed.iter().cloned().collect()
    }

    pub async fn effective_leader(&self, height: u64) -> ValidatorId {
        let state = self.state.lock().await;
        let active = state.active_sorted(self.validators.all());
        let n = active.len() as u64;
        active[((height + state.current_view) % n) as usize].clone()
    }

    pub async fn is_effective_leader(&self, height: u64) -> bool {
        self.effective_leader(height).await == self.local_id
    }

    // ---- signing helpers ----

    fn maybe_sign_block(&self, mut block: Block) -> Block {
        if let Some(key) = &self.signing_key {
            block.signature = Some(codec::sign(&key.0, block.block_hash.as_bytes()));
        }
        block
    }

    fn verify_block_signature(&self, block: &Block) -> bool {
        if !self.timing.signatures_enabled {
            return true;
        }
        match (&self.signing_key, &block.signature) {
            (Some(key), Some(sig)) => codec::verify(&key.0, block.block_hash.as_bytes(), sig),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    fn verify_tx_signatures(&self, txs: &[Transaction]) -> bool {
        if !self.timing.signatures_enabled {
            return true;
        }
        let Some(key) = &self.signing_key else {
            return true;
        };
        txs.iter()
            .all(|tx| codec::verify(&key.0, tx.tx_id.as_bytes(), &tx.signature))
    }

    // ---- proposal lifecycle (§4.6.2) ----

    /// Fires from the node's proposal loop. Builds and broadcasts a new
    /// block if this replica is the effective leader for the next height,
    /// the minimum block interval has elapsed, and a proposal for that
    /// height isn't already pending.
    pub async fn leader_tick(&self, now_ts: f64) -> Result<Vec<OutboundAction>, ConsensusError> {
        let next_height = { self.store.lock().await.height() + 1 };
        if !self.is_effective_leader(next_height).await {
            return Ok(vec![]);
        }
        {
            let state = self.state.lock().await;
            if state.last_block_time.elapsed() < self.timing.block_interval {
                return Ok(vec![]);
            }
            if matches!(&state.pending_proposal, Some(p) if p.height == next_height) {
                return Ok(vec![]);
            }
        }

        let txs = {
            let mut pool = self.mempool.lock().await;
            pool.take(self.timing.max_block_size)
        };
        if txs.is_empty() {
            return Ok(vec![]);
        }

        let prev_hash = self.store.lock().await.head_hash();
        let block = Block::new(next_height, prev_hash, now_ts, self.local_id.0.clone(), txs);
        let block = self.maybe_sign_block(block);

        let mut state = self.state.lock().await;
        state.pending_proposal = Some(PendingProposal {
            height: next_height,
            block: block.clone(),
            leader: self.local_id.clone(),
        });
        state
            .acks_received
            .entry(next_height)
            .or_default()
            .insert(self.local_id.clone());
        state.acks_sent.insert((next_height, self.local_id.clone()));
        state.last_block_time = Instant::now();
        drop(state);

        Ok(vec![OutboundAction::Broadcast(Message::Propose { block })])
    }

    /// Handles an inbound PROPOSE from `proposer` (the leader as claimed
    /// by the message's own `proposer_id` field).
    pub async fn on_propose(&self, block: Block) -> Result<Vec<OutboundAction>, ConsensusError> {
        let (store_height, head_hash) = {
            let store = self.store.lock().await;
            (store.height(), store.head_hash())
        };
        if block.height != store_height + 1 {
            return Err(ConsensusError::Validation("height does not extend the tip"));
        }
        if block.prev_hash != head_hash {
            return Err(ConsensusError::Validation("prev_hash does not match local tip"));
        }
        if !block.hash_is_consistent() {
            return Err(ConsensusError::Validation("block_hash does not match recomputed hash"));
        }

        let expected_leader = self.effective_leader(block.height).await;
        let claimed_leader = self.validators.normalize(&block.proposer_id);
        if claimed_leader != expected_leader {
            return Err(ConsensusError::Validation("proposer is not the effective leader"));
        }
        if !self.verify_block_signature(&block) {
            return Err(ConsensusError::Validation("bad leader signature"));
        }
        if !self.verify_tx_signatures(&block.transactions) {
            return Err(ConsensusError::Validation("bad transaction signature"));
        }

        let height = block.height;
        let mut state = self.state.lock().await;
        state.pending_proposal = Some(PendingProposal {
            height,
            block: block.clone(),
            leader: expected_leader.clone(),
        });

        let first_time = state.acks_sent.insert((height, expected_leader.clone()));
        drop(state);

        if first_time {
            let ack = Message::Ack {
                height,
                block_hash: block.block_hash,
                voter_id: self.local_id.0.clone(),
            };
            Ok(vec![OutboundAction::SendToLeader(expected_leader, ack)])
        } else {
            // Duplicate PROPOSE from the same leader: idempotent, no
            // second ACK.
            Ok(vec![])
        }
    }

    /// Handles an inbound ACK. Only meaningful on the leader of `height`;
    /// every other replica drops it.
    pub async fn on_ack(
        &self,
        height: u64,
        block_hash: Hash256,
        voter_id: ValidatorId,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        if !self.is_effective_leader(height).await {
            return Ok(vec![]);
        }
        let voter_id = self.validators.normalize(voter_id.as_str());

        let reached_quorum = {
            let mut state = self.state.lock().await;
            let matches_pending = state
                .pending_proposal
                .as_ref()
                .is_some_and(|p| p.height == height && p.block.block_hash == block_hash);
            if !matches_pending {
                // Stored anyway per the source's tolerance for ACKs
                // arriving for a block this replica has not (yet) seen,
                // but there is nothing to commit without a local proposal.
                state.acks_received.entry(height).or_default().insert(voter_id);
                return Ok(vec![]);
            }
            let quorum = state.ack_quorum(self.validators.all());
            let votes = state.acks_received.entry(height).or_default();
            votes.insert(voter_id);
            votes.len() >= quorum
        };
        if !reached_quorum {
            return Ok(vec![]);
        }

        // committing[height] CAS guard: only one caller proceeds to append.
        let should_commit = self.state.lock().await.committing.insert(height);
        if !should_commit {
            return Ok(vec![]);
        }

        let block = {
            let state = self.state.lock().await;
            match &state.pending_proposal {
                Some(p) if p.height == height => p.block.clone(),
                _ => {
                    drop(state);
                    self.state.lock().await.committing.remove(&height);
                    return Err(ConsensusError::InvariantViolation(
                        "quorum reached with no matching pending proposal".into(),
                    ));
                }
            }
        };

        let append_result = self.store.lock().await.append(block.clone());
        match append_result {
            Ok(()) => {
                let tx_ids = block.tx_ids();
                self.mempool.lock().await.remove_many(&tx_ids);

                let mut state = self.state.lock().await;
                state.pending_proposal = None;
                state.acks_received.remove(&height);
                state.acks_sent.retain(|(h, _)| *h != height);
                state.committing.remove(&height);
                let should_broadcast = state.commits_broadcast.insert(height);
                state.last_block_time = Instant::now();
                drop(state);

                if should_broadcast {
                    Ok(vec![OutboundAction::Broadcast(Message::Commit {
                        height,
                        block_hash: block.block_hash,
                        leader_id: self.local_id.0.clone(),
                    })])
                } else {
                    Ok(vec![])
                }
            }
            Err(e) => {
                self.state.lock().await.committing.remove(&height);
                Err(ConsensusError::Store(e))
            }
        }
    }

    /// Handles an inbound COMMIT. A no-op if this replica already has the
    /// block; discards (awaiting sync) if its pending proposal doesn't
    /// match.
    pub async fn on_commit(
        &self,
        height: u64,
        block_hash: Hash256,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        if self.store.lock().await.height() >= height {
            return Ok(vec![]);
        }

        let should_process = self.state.lock().await.commits_processing.insert(height);
        if !should_process {
            return Ok(vec![]);
        }

        let matching_block = {
            let state = self.state.lock().await;
            state
                .pending_proposal
                .as_ref()
                .filter(|p| p.height == height && p.block.block_hash == block_hash)
                .map(|p| p.block.clone())
        };

        let Some(block) = matching_block else {
            self.state.lock().await.commits_processing.remove(&height);
            return Ok(vec![]);
        };

        let append_result = self.store.lock().await.append(block.clone());
        self.state.lock().await.commits_processing.remove(&height);

        match append_result {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.pending_proposal = None;
                state.acks_sent.retain(|(h, _)| *h != height);
                state.last_block_time = Instant::now();
                drop(state);

                let tx_ids = block.tx_ids();
                self.mempool.lock().await.remove_many(&tx_ids);
                Ok(vec![])
            }
            Err(e) => Err(ConsensusError::Store(e)),
        }
    }

    // ---- view change (§4.6.3) ----

    /// Initiates a view change nominating `failed_leader` as failed, if
    /// this replica hasn't already initiated one for that leader and the
    /// cooldown has elapsed.
    pub async fn initiate_view_change(
        &self,
        failed_leader: ValidatorId,
        height: u64,
        reason: &str,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        let mut state = self.state.lock().await;
        if state.view_change_initiated_for.contains(&failed_leader) {
            return Ok(vec![]);
        }
        if let Some(last) = state.last_view_change_initiation {
            if last.elapsed() < self.timing.view_change_cooldown {
                return Ok(vec![]);
            }
        }
        state.view_change_initiated_for.insert(failed_leader.clone());
        state.last_view_change_initiation = Some(Instant::now());
        let new_view = state.current_view + 1;
        state
            .view_change_votes
            .entry(new_view)
            .or_default()
            .insert(self.local_id.clone());
        drop(state);

        Ok(vec![OutboundAction::Broadcast(Message::ViewChange {
            new_view,
            height,
            failed_leader: failed_leader.0,
            reason: reason.to_string(),
        })])
    }

    /// Handles an inbound VIEWCHANGE vote.
    pub async fn on_view_change(
        &self,
        new_view: u64,
        failed_leader: ValidatorId,
        sender: ValidatorId,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        let current_height = self.store.lock().await.height();
        let mut state = self.state.lock().await;

        if new_view <= state.current_view || new_view > state.current_view + 1 {
            return Ok(vec![]);
        }

        let sender = self.validators.normalize(sender.as_str());
        let agrees = state.failed.contains(&failed_leader) || state.active.is_empty();
        let votes = state.view_change_votes.entry(new_view).or_default();
        votes.insert(sender);
        if agrees {
            votes.insert(self.local_id.clone());
        }

        if votes.len() < self.validators.view_change_quorum() {
            return Ok(vec![]);
        }

        // Quorum reached: apply the view change.
        state.current_view = new_view;
        state.active.remove(&failed_leader);
        state.failed.insert(failed_leader);
        state.acks_sent.retain(|(h, _)| *h <= current_height);
        state.pending_proposal = None;
        state.committing.retain(|h| *h <= current_height);
        state.commits_processing.retain(|h| *h <= current_height);
        state.commits_broadcast.retain(|h| *h <= current_height);
        state.view_change_votes.remove(&new_view);
        Ok(vec![])
    }

    /// Periodic check from the health-check loop: if the expected leader
    /// for the next height is marked failed and the proposal has stalled
    /// past `block_interval + proposal_timeout`, initiate a view change.
    pub async fn check_proposal_timeout(&self) -> Result<Vec<OutboundAction>, ConsensusError> {
        let current_height = self.store.lock().await.height();
        let stalled = {
            let state = self.state.lock().await;
            state.last_block_time.elapsed() > self.timing.block_interval + self.timing.proposal_timeout
        };
        if !stalled {
            return Ok(vec![]);
        }
        let next_height = current_height + 1;
        let expected_leader = self.effective_leader(next_height).await;
        let leader_is_failed = self.state.lock().await.failed.contains(&expected_leader);
        if !leader_is_failed {
            return Ok(vec![]);
        }
        self.initiate_view_change(expected_leader, next_height, "proposal_timeout").await
    }

    // ---- peer health integration ----

    pub async fn on_peer_failed(&self, peer: ValidatorId) -> Result<Vec<OutboundAction>, ConsensusError> {
        let next_height = self.store.lock().await.height() + 1;
        // Determine whether `peer` was the expected leader before marking
        // it failed: leader selection after removal would answer a
        // different question (who leads now that it's gone).
        let was_leader = self.effective_leader(next_height).await == peer;
        {
            let mut state = self.state.lock().await;
            state.active.remove(&peer);
            state.failed.insert(peer.clone());
        }
        if was_leader {
            self.initiate_view_change(peer, next_height, "peer_health_failure").await
        } else {
            Ok(vec![])
        }
    }

    pub async fn on_peer_recovered(&self, peer: ValidatorId) -> Result<Vec<OutboundAction>, ConsensusError> {
        let mut state = self.state.lock().await;
        state.failed.remove(&peer);
        state.active.insert(peer.clone());
        state.view_change_initiated_for.remove(&peer);
        Ok(vec![])
    }

    // ---- heartbeats ----

    pub async fn build_heartbeat(&self) -> Message {
        let (height, last_block_hash) = {
            let store = self.store.lock().await;
            (store.height(), store.head_hash())
        };
        let state = self.state.lock().await;
        Message::Heartbeat {
            height,
            last_block_hash,
            current_view: state.current_view,
            failed_validators: state.failed.iter().map(|v| v.0.clone()).collect(),
        }
    }

    /// Handles an inbound heartbeat: re-activates a previously-failed
    /// sender (outside recovery) and triggers a sync request if the peer
    /// is reported at a significantly greater height.
    pub async fn on_heartbeat(
        &self,
        sender: ValidatorId,
        peer_height: u64,
        recovering: bool,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        let sender = self.validators.normalize(sender.as_str());
        if !recovering {
            let mut state = self.state.lock().await;
            if state.failed.remove(&sender) {
                state.active.insert(sender.clone());
                state.view_change_initiated_for.remove(&sender);
            }
        }

        let my_height = self.store.lock().await.height();
        if peer_height > my_height + 1 {
            let (height, latest_hash) = {
                let store = self.store.lock().await;
                (store.height(), store.head_hash())
            };
            return Ok(vec![OutboundAction::Broadcast(Message::SyncRequest {
                height,
                latest_hash,
            })]);
        }
        Ok(vec![])
    }

    // ---- sync / recovery (§4.6.4) ----

    pub async fn on_sync_request(
        &self,
        requester: ValidatorId,
        their_height: u64,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        let (my_height, my_hash, blocks) = {
            let store = self.store.lock().await;
            let h = store.height();
            (h, store.head_hash(), store.blocks_range(their_height + 1, h))
        };
        let (view, failed) = {
            let state = self.state.lock().await;
            (
                state.current_view,
                state.failed.iter().map(|v| v.0.clone()).collect::<Vec<_>>(),
            )
        };

        let mut actions = vec![OutboundAction::SendTo(
            requester.clone(),
            Message::SyncResponse {
                height: my_height,
                latest_hash: my_hash,
                blocks,
                current_view: view,
                failed_validators: failed,
            },
        )];

        let pending_txs = self.mempool.lock().await.all();
        if !pending_txs.is_empty() {
            actions.push(OutboundAction::SendTo(
                requester,
                Message::MempoolSync { transactions: pending_txs },
            ));
        }
        Ok(actions)
    }

    /// Applies a SYNC_RESPONSE: adopts the peer's view if it is ahead,
    /// validates and appends each block in order (discarding any that
    /// don't link), and — unless still `RECOVERING` — adopts the peer's
    /// failed-validator list.
    pub async fn on_sync_response(
        &self,
        peer_view: u64,
        blocks: Vec<Block>,
        peer_failed: Vec<ValidatorId>,
        recovering: bool,
    ) -> Result<Vec<OutboundAction>, ConsensusError> {
        {
            let mut state = self.state.lock().await;
            if peer_view > state.current_view {
                state.current_view = peer_view;
            }
            if !recovering {
                for v in &peer_failed {
                    state.active.remove(v);
                    state.failed.insert(v.clone());
                }
            }
        }

        let mut applied_ids: Vec<&str> = Vec::new();
        let mut owned_blocks = Vec::new();
        for block in blocks {
            let ok = self.store.lock().await.append(block.clone()).is_ok();
            if !ok {
                break;
            }
            owned_blocks.push(block);
        }
        for block in &owned_blocks {
            applied_ids.extend(block.tx_ids());
        }
        if !applied_ids.is_empty() {
            self.mempool.lock().await.remove_many(&applied_ids);
        }
        if !owned_blocks.is_empty() {
            self.state.lock().await.last_block_time = Instant::now();
        }
        Ok(vec![])
    }

    pub async fn on_mempool_sync(&self, transactions: Vec<Transaction>) {
        let mut pool = self.mempool.lock().await;
        for tx in transactions {
            if tx.tx_id_is_consistent() {
                pool.add(tx);
            }
        }
    }

    pub async fn on_submit_transaction(&self, tx: Transaction) -> bool {
        if !tx.tx_id_is_consistent() {
            return false;
        }
        self.mempool.lock().await.add(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemChainStore;
    use crate::types::Transaction;

    fn engine(id: &str, all: &[&str]) -> ConsensusEngine {
        let validators = Arc::new(ValidatorSet::new(all.iter().copied()));
        let store: Arc<Mutex<Box<dyn ChainStore>>> =
            Arc::new(Mutex::new(Box::new(MemChainStore::new())));
        let mempool = Arc::new(Mutex::new(Mempool::new()));
        ConsensusEngine::new(
            ValidatorId::from(id),
            validators,
            ConsensusTiming {
                block_interval: std::time::Duration::from_millis(0),
                ..ConsensusTiming::default()
            },
            None,
            store,
            mempool,
        )
    }

    fn tx(sender: &str) -> Transaction {
        Transaction::new(sender.into(), "bob".into(), 5, 1000.0)
    }

    #[tokio::test]
    async fn leader_tick_skips_when_mempool_empty() {
        let e = engine("a", &["a", "b", "c"]);
        let actions = e.leader_tick(1.0).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn leader_tick_proposes_and_self_acks() {
        // Validators sort to [a, b, c]; at height 1, view 0, the leader is
        // the one at index (1 + 0) % 3 = 1, i.e. "b".
        let e = engine("b", &["a", "b", "c"]);
        e.on_submit_transaction(tx("alice")).await;
        let actions = e.leader_tick(1000.0).await.unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            OutboundAction::Broadcast(Message::Propose { block }) => {
                assert_eq!(block.height, 1);
                assert_eq!(block.proposer_id, "b");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn happy_path_commit_with_full_quorum() {
        // "b" is the leader at height 1, view 0, with {a, b, c}.
        let b = engine("b", &["a", "b", "c"]);
        b.on_submit_transaction(tx("alice")).await;
        let actions = b.leader_tick(1001.0).await.unwrap();
        let block = match &actions[0] {
            OutboundAction::Broadcast(Message::Propose { block }) => block.clone(),
            _ => panic!("expected PROPOSE"),
        };

        // a and c ack (self-ack from b already recorded).
        let ack_a = b
            .on_ack(1, block.block_hash, ValidatorId::from("a"))
            .await
            .unwrap();
        assert!(ack_a.is_empty(), "quorum not yet reached with 2/3");

        let ack_c = b
            .on_ack(1, block.block_hash, ValidatorId::from("c"))
            .await
            .unwrap();
        assert_eq!(ack_c.len(), 1);
        assert!(matches!(&ack_c[0], OutboundAction::Broadcast(Message::Commit { height, .. }) if *height == 1));

        assert_eq!(b.store.lock().await.height(), 1);
        assert_eq!(b.mempool.lock().await.size(), 0);
    }

    #[tokio::test]
    async fn duplicate_propose_is_idempotent() {
        let a = engine("a", &["a", "b", "c"]);
        let block = Block::new(1, Hash256::ZERO, 1001.0, "b".into(), vec![tx("alice")]);

        let first = a.on_propose(block.clone()).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = a.on_propose(block).await.unwrap();
        assert!(second.is_empty(), "second identical PROPOSE emits no ACK");
    }

    #[tokio::test]
    async fn bad_prev_hash_is_rejected_without_state_mutation() {
        let a = engine("a", &["a", "b", "c"]);
        let bad = Block::new(1, Hash256([9u8; 32]), 1001.0, "b".into(), vec![]);
        assert!(a.on_propose(bad).await.is_err());
        assert!(a.state.lock().await.pending_proposal.is_none());
    }

    #[tokio::test]
    async fn view_change_quorum_of_two_of_three_advances_view() {
        let c = engine("c", &["a", "b", "c"]);
        // c locally believes "a" has failed, so it will agree with any
        // VIEWCHANGE nominating "a".
        c.state.lock().await.failed.insert(ValidatorId::from("a"));

        c.on_view_change(1, ValidatorId::from("a"), ValidatorId::from("b"))
            .await
            .unwrap();

        // c's own implicit agreement plus b's explicit vote reaches the
        // quorum of 2 required over the 3-validator set, so the single
        // inbound VIEWCHANGE from b is enough to advance the view.
        assert_eq!(c.current_view().await, 1);
        assert!(c.state.lock().await.failed.contains(&ValidatorId::from("a")));
    }

    #[tokio::test]
    async fn view_change_cannot_be_won_by_a_single_partitioned_validator() {
        let a = engine("a", &["a", "b", "c"]);
        assert_eq!(a.validators.view_change_quorum(), 2);

        // "a" nominates "b" as failed but nobody else corroborates.
        let actions = a.initiate_view_change(ValidatorId::from("b"), 1, "suspected").await.unwrap();
        assert_eq!(actions.len(), 1, "a still broadcasts its own VIEWCHANGE");
        assert_eq!(a.current_view().await, 0, "a lone vote cannot reach quorum");
    }

    #[tokio::test]
    async fn commit_without_matching_pending_proposal_is_ignored() {
        let b = engine("b", &["a", "b", "c"]);
        let actions = b.on_commit(1, Hash256([1u8; 32])).await.unwrap();
        assert!(actions.is_empty());
        assert_eq!(b.store.lock().await.height(), 0);
    }

    #[tokio::test]
    async fn commit_already_in_chain_is_a_no_op() {
        let b = engine("b", &["a", "b", "c"]);
        b.on_submit_transaction(tx("alice")).await;
        let actions = b.leader_tick(1001.0).await.unwrap();
        let block = match &actions[0] {
            OutboundAction::Broadcast(Message::Propose { block }) => block.clone(),
            _ => unreachable!(),
        };
        b.on_ack(1, block.block_hash, ValidatorId::from("a")).await.unwrap();
        b.on_ack(1, block.block_hash, ValidatorId::from("c")).await.unwrap();
        assert_eq!(b.store.lock().await.height(), 1);

        // A COMMIT for a height already held is a no-op.
        let noop = b.on_commit(1, block.block_hash).await.unwrap();
        assert!(noop.is_empty());
        assert_eq!(b.store.lock().await.height(), 1);
    }
}
