//! Timing parameters for the consensus core.
//!
//! Every value here is configurable; the defaults match the reference
//! values from the timing-parameters table.

use std::time::Duration;

/// All timing knobs that govern leader rotation, view change, and
/// liveness detection.
#[derive(Clone, Debug)]
pub struct ConsensusTiming {
    /// Minimum gap between proposals by a leader.
    pub block_interval: Duration,
    /// Added to `block_interval` before a stalled leader triggers a view
    /// change.
    pub proposal_timeout: Duration,
    /// Gap between outbound heartbeats.
    pub heartbeat_interval: Duration,
    /// No-frame interval after which a peer is marked `FAILED`.
    pub heartbeat_timeout: Duration,
    /// Retry gap for failed reconnection dials.
    pub reconnect_interval: Duration,
    /// Duration a freshly (re)started node spends in `RECOVERING`.
    pub recovery_grace_period: Duration,
    /// Minimum gap between a node's own view-change initiations.
    pub view_change_cooldown: Duration,
    /// Transactions per proposed block.
    pub max_block_size: usize,
    /// Frames larger than this close the connection.
    pub max_frame_bytes: u32,
    /// Whether block/transaction signatures are verified at the
    /// validation boundary.
    pub signatures_enabled: bool,
}

impl Default for ConsensusTiming {
    fn default() -> Self {
        Self {
            block_interval: Duration::from_secs(5),
            proposal_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
            recovery_grace_period: Duration::from_secs(30),
            view_change_cooldown: Duration::from_secs(15),
            max_block_size: 100,
            max_frame_bytes: crate::net::MAX_FRAME_BYTES,
            signatures_enabled: false,
        }
    }
}
