//! Node Orchestrator.
//!
//! Owns every other component, runs the proposal/heartbeat/health-check
//! loops plus the accept and reconnector loops, and drains
//! [`OutboundAction`]s the consensus core emits rather than the core
//! holding a reference back to this type.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::consensus::{ConsensusEngine, OutboundAction};
use crate::health::{HealthEvent, HealthTracker};
use crate::mempool::Mempool;
use crate::net::{Connections, Envelope, Message, read_frame};
use crate::store::{ChainStore, JsonChainStore, StoreError};
use crate::types::{Block, Hash256, Transaction, ValidatorId};

#[derive(Debug)]
pub enum NodeError {
    Store(StoreError),
    Io(std::io::Error),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Store(e) => write!(f, "chain store error: {e}"),
            NodeError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<StoreError> for NodeError {
    fn from(e: StoreError) -> Self {
        NodeError::Store(e)
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e)
    }
}

fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// One running replica: consensus engine, network plumbing, and the loops
/// that drive both.
pub struct Node {
    node_id: ValidatorId,
    bind_addr: SocketAddr,
    peers: Vec<String>,
    engine: Arc<ConsensusEngine>,
    connections: Arc<Connections>,
    health: Arc<Mutex<HealthTracker>>,
    connected_addrs: Arc<Mutex<HashSet<String>>>,
    running: Arc<AtomicBool>,
    started_at: Instant,
    recovery_grace_period: Duration,
    reconnect_interval: Duration,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        let store: Box<dyn ChainStore> = Box::new(JsonChainStore::open(&config.data_dir)?);
        let store = Arc::new(Mutex::new(store));
        let mempool = Arc::new(Mutex::new(Mempool::new()));
        let engine = Arc::new(ConsensusEngine::new(
            config.node_id.clone(),
            config.validators.clone(),
            config.timing.clone(),
            config.signing_key.clone(),
            store,
            mempool,
        ));
        let health = Arc::new(Mutex::new(HealthTracker::new(config.timing.heartbeat_timeout)));

        Ok(Arc::new(Self {
            node_id: config.node_id,
            bind_addr: config.bind_addr,
            peers: config.peers,
            engine,
            connections: Arc::new(Connections::new()),
            health,
            connected_addrs: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(true)),
            started_at: Instant::now(),
            recovery_grace_period: config.timing.recovery_grace_period,
            reconnect_interval: config.timing.reconnect_interval,
        }))
    }

    pub fn is_recovering(&self) -> bool {
        self.started_at.elapsed() < self.recovery_grace_period
    }

    /// Clears the running flag. The accept loop and every per-connection
    /// receive loop poll `accept`/`read_frame` under a bounded timeout, so
    /// each unblocks and exits within that poll interval instead of
    /// waiting on an indefinitely blocked socket read.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn envelope(&self, message: Message) -> Envelope {
        Envelope::new(self.node_id.clone(), now_ts(), message)
    }

    /// Runs every long-running loop until `stop()` is called. Returns once
    /// the listener is bound and the loops are spawned; callers that want
    /// to block until shutdown should await the returned handle's join, or
    /// simply hold the `Arc<Node>` and await this future directly.
    pub async fn run(self: Arc<Self>) -> Result<(), NodeError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, node_id = %self.node_id, "node listening");

        let accept = tokio::spawn(self.clone().accept_loop(listener));
        let proposal = tokio::spawn(self.clone().proposal_loop());
        let heartbeat = tokio::spawn(self.clone().heartbeat_loop());
        let health_check = tokio::spawn(self.clone().health_check_loop());
        let reconnector = tokio::spawn(self.clone().reconnector_loop());

        let _ = tokio::join!(accept, proposal, heartbeat, health_check, reconnector);
        Ok(())
    }

    // ---- loops ----

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(Duration::from_millis(500), listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    tracing::debug!(%addr, "accepted inbound connection");
                    let node = self.clone();
                    tokio::spawn(async move { node.run_connection(stream, None).await });
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "accept failed"),
                Err(_) => {} // timed out: loop back around to recheck `running`
            }
        }
    }

    async fn proposal_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(200));
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.is_recovering() {
                continue;
            }
            match self.engine.leader_tick(now_ts()).await {
                Ok(actions) => self.apply_actions(actions).await,
                Err(e) => tracing::error!(error = %e, "leader_tick failed"),
            }
            match self.engine.check_proposal_timeout().await {
                Ok(actions) => self.apply_actions(actions).await,
                Err(e) => tracing::error!(error = %e, "check_proposal_timeout failed"),
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.engine.timing().heartbeat_interval);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.is_recovering() {
                self.broadcast_sync_request().await;
            }
            let hb = self.engine.build_heartbeat().await;
            let env = self.envelope(hb);
            self.connections.broadcast(&env).await;
        }
    }

    async fn health_check_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.is_recovering() {
                // Failure detection is suppressed during recovery: the
                // node's own view of peer liveness is not yet trustworthy.
                continue;
            }
            let events = self.health.lock().await.sweep();
            for event in events {
                let result = match event {
                    HealthEvent::Failed(peer) => self.engine.on_peer_failed(peer).await,
                    HealthEvent::Recovered(peer) => self.engine.on_peer_recovered(peer).await,
                };
                match result {
                    Ok(actions) => self.apply_actions(actions).await,
                    Err(e) => tracing::error!(error = %e, "peer health transition failed"),
                }
            }
        }
    }

    async fn reconnector_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.reconnect_interval);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            for addr in self.peers.clone() {
                if self.connected_addrs.lock().await.contains(&addr) {
                    continue;
                }
                self.clone().dial(addr).await;
            }
        }
    }

    async fn dial(self: Arc<Self>, addr: String) {
        let attempt = tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(addr.as_str())).await;
        match attempt {
            Ok(Ok(stream)) => {
                self.connected_addrs.lock().await.insert(addr.clone());
                let host = addr.split(':').next().unwrap_or(&addr);
                let hinted = self.engine.validators().normalize(host);
                let node = self.clone();
                let addr_for_cleanup = addr.clone();
                tokio::spawn(async move {
                    node.clone().run_connection(stream, Some(hinted)).await;
                    node.connected_addrs.lock().await.remove(&addr_for_cleanup);
                });
            }
            Ok(Err(e)) => tracing::debug!(%addr, error = %e, "dial failed"),
            Err(_) => tracing::debug!(%addr, "dial timed out"),
        }
    }

    async fn broadcast_sync_request(&self) {
        let (height, latest_hash) = {
            let store = self.engine.store().lock().await;
            (store.height(), store.head_hash())
        };
        let env = self.envelope(Message::SyncRequest { height, latest_hash });
        self.connections.broadcast(&env).await;
    }

    // ---- per-connection receive loop ----

    /// Drives one TCP connection: registers it in the connection table on
    /// the first frame seen (or immediately, for an outbound dial, so a
    /// HELLO can be sent before anything is received), then dispatches
    /// every subsequent frame into the consensus core.
    async fn run_connection(self: Arc<Self>, stream: TcpStream, outbound_hint: Option<ValidatorId>) {
        let _ = stream.set_nodelay(true);
        let (mut read_half, write_half) = stream.into_split();
        let mut writer_half = Some(write_half);
        let mut conn_id: Option<u64> = None;

        if let Some(hint) = outbound_hint {
            let w = writer_half.take().expect("writer present for a fresh outbound connection");
            conn_id = Some(self.connections.insert(hint.clone(), w).await);
            let hello = Message::Hello {
                version: 1,
                listening_port: self.bind_addr.port(),
            };
            let env = self.envelope(hello);
            self.connections.send_to(&hint, &env).await;
        }

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            // Bounded so a blocked read unblocks within the poll interval
            // and gives shutdown a chance to observe `running` going false.
            match tokio::time::timeout(Duration::from_millis(500), read_frame(&mut read_half)).await {
                Ok(Ok(env)) => {
                    let sender = self.engine.validators().normalize(&env.sender_id);
                    if conn_id.is_none() {
                        if let Some(w) = writer_half.take() {
                            conn_id = Some(self.connections.insert(sender.clone(), w).await);
                        }
                    }
                    self.on_frame_received(&sender).await;
                    if let Err(e) = self.dispatch(sender, env.message).await {
                        tracing::warn!(error = %e, "message handling error");
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "connection closed");
                    break;
                }
                Err(_) => {} // timed out: loop back around to recheck `running`
            }
        }

        if let Some(id) = conn_id {
            self.connections.remove(id).await;
        }
    }

    async fn on_frame_received(&self, sender: &ValidatorId) {
        let event = self.health.lock().await.touch(sender);
        if let Some(HealthEvent::Recovered(peer)) = event {
            if let Ok(actions) = self.engine.on_peer_recovered(peer).await {
                self.apply_actions(actions).await;
            }
        }
    }

    async fn apply_actions(&self, actions: Vec<OutboundAction>) {
        for action in actions {
            match action {
                OutboundAction::Broadcast(msg) => {
                    let env = self.envelope(msg);
                    self.connections.broadcast(&env).await;
                }
                OutboundAction::SendTo(peer, msg) => {
                    let env = self.envelope(msg);
                    self.connections.send_to(&peer, &env).await;
                }
                OutboundAction::SendToLeader(peer, msg) => {
                    let env = self.envelope(msg);
                    self.connections.send_to_leader(&peer, &env).await;
                }
            }
        }
    }

    /// Exhaustive dispatch over the wire message kinds into the consensus
    /// core, replacing a string-typed `msg_type` dispatch table.
    async fn dispatch(
        &self,
        sender: ValidatorId,
        message: Message,
    ) -> Result<(), crate::consensus::ConsensusError> {
        let actions = match message {
            Message::Hello { listening_port, .. } => {
                tracing::debug!(%sender, listening_port, "HELLO received");
                vec![]
            }
            Message::Heartbeat { height, .. } => {
                self.engine.on_heartbeat(sender, height, self.is_recovering()).await?
            }
            Message::Tx { tx } => {
                if self.engine.on_submit_transaction(tx.clone()).await {
                    vec![OutboundAction::Broadcast(Message::Tx { tx })]
                } else {
                    vec![]
                }
            }
            Message::Propose { block } => self.engine.on_propose(block).await?,
            Message::Ack { height, block_hash, voter_id } => {
                self.engine.on_ack(height, block_hash, ValidatorId::from(voter_id)).await?
            }
            Message::Commit { height, block_hash, .. } => self.engine.on_commit(height, block_hash).await?,
            Message::ViewChange { new_view, failed_leader, .. } => {
                self.engine
                    .on_view_change(new_view, ValidatorId::from(failed_leader), sender)
                    .await?
            }
            Message::SyncRequest { height, .. } => self.engine.on_sync_request(sender, height).await?,
            Message::SyncResponse { current_view, blocks, failed_validators, .. } => {
                let failed: Vec<ValidatorId> = failed_validators.into_iter().map(ValidatorId::from).collect();
                self.engine
                    .on_sync_response(current_view, blocks, failed, self.is_recovering())
                    .await?
            }
            Message::MempoolSync { transactions } => {
                self.engine.on_mempool_sync(transactions).await;
                vec![]
            }
            Message::GetHeaders { from_height, to_height } => {
                let headers = self.engine.store().lock().await.headers_range(from_height, to_height);
                vec![OutboundAction::SendTo(sender, Message::Headers { headers })]
            }
            Message::Headers { .. } => vec![],
            Message::GetBlocks { from_height, to_height } => {
                let blocks = self.engine.store().lock().await.blocks_range(from_height, to_height);
                vec![OutboundAction::SendTo(sender, Message::Blocks { blocks })]
            }
            Message::Blocks { blocks } => {
                let view = self.engine.current_view().await;
                self.engine.on_sync_response(view, blocks, vec![], self.is_recovering()).await?
            }
        };
        self.apply_actions(actions).await;
        Ok(())
    }

    // ---- administrative read API (spec.md §6) ----

    pub fn node_id(&self) -> &ValidatorId {
        &self.node_id
    }

    pub async fn height(&self) -> u64 {
        self.engine.store().lock().await.height()
    }

    pub async fn head_hash(&self) -> Hash256 {
        self.engine.store().lock().await.head_hash()
    }

    pub async fn block_at(&self, height: u64) -> Option<Block> {
        self.engine.store().lock().await.get(height)
    }

    pub async fn mempool_size(&self) -> usize {
        self.engine.mempool().lock().await.size()
    }

    pub async fn mempool_all(&self) -> Vec<Transaction> {
        self.engine.mempool().lock().await.all()
    }

    pub async fn leader_at(&self, height: u64) -> ValidatorId {
        self.engine.effective_leader(height).await
    }

    pub async fn active_validators(&self) -> Vec<ValidatorId> {
        self.engine.active_validators().await
    }

    pub async fn failed_validators(&self) -> Vec<ValidatorId> {
        self.engine.failed_validators().await
    }

    pub async fn current_view(&self) -> u64 {
        self.engine.current_view().await
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.count().await
    }

    /// Submits a client transaction: adds it to the local mempool and, if
    /// newly accepted, broadcasts it to peers.
    pub async fn submit_transaction(&self, tx: Transaction) -> bool {
        let accepted = self.engine.on_submit_transaction(tx.clone()).await;
        if accepted {
            let env = self.envelope(Message::Tx { tx });
            self.connections.broadcast(&env).await;
        }
        accepted
    }
}
