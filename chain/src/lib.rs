//! Chain library crate.
//!
//! This crate provides the replicated state-machine engine described by
//! the node specification: an ordered, hash-chained transaction log kept
//! in sync across a fixed set of authorized replicas via a round-robin
//! Proof-of-Authority protocol with leader-failure view changes and
//! catch-up synchronization.
//!
//! Modules, leaves first:
//!
//! - [`codec`] — canonical byte encoding, hashing, signing/verification.
//! - [`types`] — `Transaction`, `Block`, and the shared id/hash newtypes.
//! - [`store`] — the append-only, hash-chained chain store.
//! - [`mempool`] — the set of unconfirmed transactions.
//! - [`net`] — framed TCP transport and the typed wire envelope.
//! - [`health`] — heartbeat-driven peer liveness tracking.
//! - [`consensus`] — leader rotation, proposal lifecycle, quorum, view
//!   change, and sync: the core of this crate.
//! - [`node`] — the orchestrator wiring every other module together.
//! - [`config`] — configuration file/CLI loading and resolution.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod health;
pub mod mempool;
pub mod net;
pub mod node;
pub mod store;
pub mod types;

pub use config::{Cli, ConfigError, NodeConfig, NodeConfigBuilder};
pub use consensus::{
    ConsensusEngine, ConsensusError, ConsensusTiming, OutboundAction, SigningKey, ValidatorSet,
};
pub use health::{HealthEvent, HealthTracker, PeerState};
pub use mempool::Mempool;
pub use net::{Connections, Envelope, FrameError, Message};
pub use node::{Node, NodeError};
pub use store::{ChainStore, JsonChainStore, MemChainStore, StoreError};
pub use types::{Block, Hash256, Transaction, ValidatorId};
