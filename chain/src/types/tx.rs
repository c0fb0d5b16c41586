// chain/src/types/tx.rs

//! Transaction type for the replication engine.
//!
//! Per the single coherent transaction model specified for this profile
//! (balance/nonce accounting is explicitly not load-bearing here), a
//! transaction is a plain value transfer between two opaque identifiers.

use serde::{Deserialize, Serialize};

use crate::codec;

/// A client-submitted transaction.
///
/// `tx_id` is content-addressed: it is derived from `{sender, recipient,
/// amount, timestamp}` via [`codec::tx_id`], so re-submitting the same
/// logical transfer always yields the same id and the mempool naturally
/// deduplicates it. Transactions are immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hex-encoded content hash of `{sender, recipient, amount, timestamp}`.
    pub tx_id: String,
    /// Opaque sender identifier.
    pub sender: String,
    /// Opaque recipient identifier.
    pub recipient: String,
    /// Transfer amount. Never negative.
    pub amount: u64,
    /// Wall-clock timestamp, seconds since epoch (float, per the wire
    /// convention used by envelopes and blocks).
    pub timestamp: f64,
    /// Signature bytes, hex-encoded on the wire; may be empty when
    /// signature verification is disabled.
    #[serde(default)]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Builds a new transaction, computing `tx_id` from the content fields.
    pub fn new(sender: String, recipient: String, amount: u64, timestamp: f64) -> Self {
        let tx_id = codec::tx_id(&sender, &recipient, amount, timestamp);
        Transaction {
            tx_id,
            sender,
            recipient,
            amount,
            timestamp,
            signature: Vec::new(),
        }
    }

    /// Attaches a signature to an already-built transaction.
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Recomputes `tx_id` from this transaction's content fields and
    /// compares it against the stored value. Used to reject transactions
    /// whose `tx_id` does not match their content (e.g. received over the
    /// wire from an untrusted peer).
    pub fn tx_id_is_consistent(&self) -> bool {
        codec::tx_id(&self.sender, &self.recipient, self.amount, self.timestamp) == self.tx_id
    }
}
