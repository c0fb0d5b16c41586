//! Peer Health: heartbeat-driven liveness tracking and failure/recovery
//! detection.
//!
//! A peer's alive bit is authoritative from *any* received frame, not
//! only heartbeats — receiving anything from a peer is evidence it is up.
//! Failure/recovery callbacks fire outside the lock so a slow callback
//! cannot block the next `touch`/`sweep` call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::ValidatorId;

/// Liveness state of one peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeerState {
    Unknown,
    Alive,
    Failed,
}

struct PeerEntry {
    state: PeerState,
    last_seen: Instant,
}

/// Transition emitted by [`HealthTracker::sweep`] or [`HealthTracker::touch`],
/// for the caller to act on (mark failed in consensus state, log, etc.)
/// outside the tracker's lock.
#[derive(Debug, Eq, PartialEq)]
pub enum HealthEvent {
    Failed(ValidatorId),
    Recovered(ValidatorId),
}

/// Tracks last-heartbeat time and liveness state per peer.
pub struct HealthTracker {
    heartbeat_timeout: Duration,
    peers: HashMap<ValidatorId, PeerEntry>,
}

impl HealthTracker {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            heartbeat_timeout,
            peers: HashMap::new(),
        }
    }

    /// Records that a frame of any type was just received from `peer`.
    /// `UNKNOWN`/`FAILED` transition to `ALIVE`; a `FAILED -> ALIVE`
    /// transition emits [`HealthEvent::Recovered`].
    pub fn touch(&mut self, peer: &ValidatorId) -> Option<HealthEvent> {
        let now = Instant::now();
        let entry = self.peers.entry(peer.clone()).or_insert(PeerEntry {
            state: PeerState::Unknown,
            last_seen: now,
        });
        let was_failed = entry.state == PeerState::Failed;
        entry.state = PeerState::Alive;
        entry.last_seen = now;

        if was_failed {
            Some(HealthEvent::Recovered(peer.clone()))
        } else {
            None
        }
    }

    /// Scans every known peer and marks any `ALIVE` peer whose
    /// `heartbeat_timeout` has elapsed as `FAILED`, emitting one event per
    /// newly-failed peer. Call periodically from the health-check loop.
    pub fn sweep(&mut self) -> Vec<HealthEvent> {
        let now = Instant::now();
        let mut events = Vec::new();
        for (id, entry) in self.peers.iter_mut() {
            if entry.state == PeerState::Alive && now.duration_since(entry.last_seen) > self.heartbeat_timeout {
                entry.state = PeerState::Failed;
                events.push(HealthEvent::Failed(id.clone()));
            }
        }
        events
    }

    pub fn state(&self, peer: &ValidatorId) -> PeerState {
        self.peers.get(peer).map(|e| e.state).unwrap_or(PeerState::Unknown)
    }

    pub fn is_alive(&self, peer: &ValidatorId) -> bool {
        self.state(peer) == PeerState::Alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ValidatorId {
        ValidatorId::from(s)
    }

    #[test]
    fn unknown_peer_becomes_alive_on_first_frame() {
        let mut h = HealthTracker::new(Duration::from_secs(10));
        assert_eq!(h.state(&id("A")), PeerState::Unknown);
        let event = h.touch(&id("A"));
        assert!(event.is_none(), "UNKNOWN -> ALIVE emits no event");
        assert_eq!(h.state(&id("A")), PeerState::Alive);
    }

    #[test]
    fn sweep_marks_stale_peer_failed_exactly_once() {
        let mut h = HealthTracker::new(Duration::from_millis(1));
        h.touch(&id("A"));
        std::thread::sleep(Duration::from_millis(5));

        let events = h.sweep();
        assert_eq!(events, vec![HealthEvent::Failed(id("A"))]);
        assert_eq!(h.state(&id("A")), PeerState::Failed);

        // A second sweep without a new touch must not re-emit Failed.
        let events2 = h.sweep();
        assert!(events2.is_empty());
    }

    #[test]
    fn touch_after_failure_emits_recovered() {
        let mut h = HealthTracker::new(Duration::from_millis(1));
        h.touch(&id("A"));
        std::thread::sleep(Duration::from_millis(5));
        h.sweep();
        assert_eq!(h.state(&id("A")), PeerState::Failed);

        let event = h.touch(&id("A"));
        assert_eq!(event, Some(HealthEvent::Recovered(id("A"))));
        assert_eq!(h.state(&id("A")), PeerState::Alive);
    }
}
