//! Message Layer: framed TCP transport and typed envelopes.
//!
//! Every inter-node exchange is a length-prefixed frame carrying a
//! length-prefixed [`Envelope`]. [`frame`]/[`deframe`] implement the wire
//! framing; [`Message`] is the closed, compile-checked tagged union
//! replacing the source's string-typed message enumeration (REDESIGN
//! FLAGS). [`Connections`] is the shared connection table used for
//! broadcast/unicast.

mod framing;
mod hexbytes;

pub use framing::{FrameError, read_frame, write_frame};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::types::{Block, Hash256, Transaction, ValidatorId};

/// Maximum accepted frame payload size (16 MiB). A larger declared length
/// closes the connection.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// The typed envelope carried inside every frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub sender_id: String,
    pub timestamp: f64,
    #[serde(with = "hexbytes")]
    pub signature: Vec<u8>,
    #[serde(flatten)]
    pub message: Message,
}

impl Envelope {
    pub fn new(sender_id: ValidatorId, timestamp: f64, message: Message) -> Self {
        Envelope {
            sender_id: sender_id.0,
            timestamp,
            signature: Vec::new(),
            message,
        }
    }
}

/// Closed, exhaustively-matched set of wire message kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    #[serde(rename = "HELLO")]
    Hello { version: u32, listening_port: u16 },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        height: u64,
        last_block_hash: Hash256,
        current_view: u64,
        failed_validators: Vec<String>,
    },
    #[serde(rename = "TX")]
    Tx { tx: Transaction },
    #[serde(rename = "PROPOSE")]
    Propose { block: Block },
    #[serde(rename = "ACK")]
    Ack {
        height: u64,
        block_hash: Hash256,
        voter_id: String,
    },
    #[serde(rename = "COMMIT")]
    Commit {
        height: u64,
        block_hash: Hash256,
        leader_id: String,
    },
    #[serde(rename = "VIEWCHANGE")]
    ViewChange {
        new_view: u64,
        height: u64,
        failed_leader: String,
        reason: String,
    },
    #[serde(rename = "SYNC_REQUEST")]
    SyncRequest {
        height: u64,
        latest_hash: Hash256,
    },
    #[serde(rename = "SYNC_RESPONSE")]
    SyncResponse {
        height: u64,
        latest_hash: Hash256,
        blocks: Vec<Block>,
        current_view: u64,
        failed_validators: Vec<String>,
    },
    #[serde(rename = "MEMPOOL_SYNC")]
    MempoolSync { transactions: Vec<Transaction> },
    #[serde(rename = "GETHEADERS")]
    GetHeaders { from_height: u64, to_height: u64 },
    #[serde(rename = "HEADERS")]
    Headers { headers: Vec<Block> },
    #[serde(rename = "GETBLOCKS")]
    GetBlocks { from_height: u64, to_height: u64 },
    #[serde(rename = "BLOCK")]
    Blocks { blocks: Vec<Block> },
}

impl Message {
    /// The wire type token, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "HELLO",
            Message::Heartbeat { .. } => "HEARTBEAT",
            Message::Tx { .. } => "TX",
            Message::Propose { .. } => "PROPOSE",
            Message::Ack { .. } => "ACK",
            Message::Commit { .. } => "COMMIT",
            Message::ViewChange { .. } => "VIEWCHANGE",
            Message::SyncRequest { .. } => "SYNC_REQUEST",
            Message::SyncResponse { .. } => "SYNC_RESPONSE",
            Message::MempoolSync { .. } => "MEMPOOL_SYNC",
            Message::GetHeaders { .. } => "GETHEADERS",
            Message::Headers { .. } => "HEADERS",
            Message::GetBlocks { .. } => "GETBLOCKS",
            Message::Blocks { .. } => "BLOCK",
        }
    }
}

/// One outbound connection: a write half plus the peer's canonical id.
struct Connection {
    validator_id: ValidatorId,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
}

/// Shared table of live outbound connections, keyed by a locally-assigned
/// connection id. Iteration for broadcast clones the (id, writer-handle)
/// list under the lock and then sends outside it, isolating slow/broken
/// peers from one another.
#[derive(Default)]
pub struct Connections {
    next_id: Mutex<u64>,
    table: Mutex<HashMap<u64, Arc<Connection>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new outbound write half under `validator_id`, returning
    /// a connection id that can later be used to remove it.
    pub async fn insert(&self, validator_id: ValidatorId, writer: OwnedWriteHalf) -> u64 {
        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let conn = Arc::new(Connection {
            validator_id,
            writer: Mutex::new(BufWriter::new(writer)),
        });
        self.table.lock().await.insert(id, conn);
        id
    }

    pub async fn remove(&self, id: u64) {
        self.table.lock().await.remove(&id);
    }

    pub async fn count(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Sends `env` to every live connection, dropping (but logging) any
    /// peer whose write fails; does not retry or close the connection
    /// here — the receive loop for that peer will observe the transport
    /// error and remove it.
    pub async fn broadcast(&self, env: &Envelope) {
        let conns: Vec<Arc<Connection>> = self.table.lock().await.values().cloned().collect();
        for conn in conns {
            if let Err(e) = send_on(&conn, env).await {
                tracing::warn!(peer = %conn.validator_id, error = %e, "broadcast send failed");
            }
        }
    }

    /// Sends `env` to every connection registered under `peer`.
    pub async fn send_to(&self, peer: &ValidatorId, env: &Envelope) {
        let conns: Vec<Arc<Connection>> = self
            .table
            .lock()
            .await
            .values()
            .filter(|c| &c.validator_id == peer)
            .cloned()
            .collect();
        for conn in conns {
            if let Err(e) = send_on(&conn, env).await {
                tracing::warn!(peer = %conn.validator_id, error = %e, "send_to failed");
            }
        }
    }

    /// Sends `env` to the leader, deduplicated: at most one physical send
    /// even if multiple connections happen to match `leader_id` (e.g. a
    /// stale connection alongside a freshly reconnected one).
    pub async fn send_to_leader(&self, leader_id: &ValidatorId, env: &Envelope) {
        let conn = {
            let table = self.table.lock().await;
            table.values().find(|c| &c.validator_id == leader_id).cloned()
        };
        if let Some(conn) = conn {
            if let Err(e) = send_on(&conn, env).await {
                tracing::warn!(peer = %conn.validator_id, error = %e, "send_to_leader failed");
            }
        }
    }
}

async fn send_on(conn: &Connection, env: &Envelope) -> Result<(), FrameError> {
    let mut w = conn.writer.lock().await;
    write_frame(&mut *w, env).await?;
    w.flush().await.map_err(FrameError::Io)
}
