//! Canonical encoding, hashing, and signing.
//!
//! Hashing here is deliberately **not** a generic struct serializer: the
//! hash inputs are built by concatenating a fixed, explicit list of fields
//! in a fixed order, exactly the set named by the data model (`tx_id` over
//! `{sender, recipient, amount, timestamp}`; `block_hash` over `{height,
//! prev_hash, concat(tx_hashes), timestamp, proposer_id}`). A derive-macro
//! struct serializer would also be order-stable, but an explicit
//! concatenation makes the exact hash input self-evident at the call site
//! and immune to field-reordering refactors elsewhere in the crate.
//!
//! General-purpose wire/persistence encoding (envelopes, the chain file)
//! goes through `serde_json` instead; only these two content hashes use
//! the concatenation routine below.

use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// Hashes an already-encoded byte buffer with SHA-256.
pub fn hash(bytes: &[u8]) -> Hash256 {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash256(out)
}

/// Canonical encoding of a transaction's content fields.
///
/// Field order is fixed: `sender`, `recipient`, `amount`, `timestamp`.
/// `tx_id` is deliberately excluded (it is derived *from* this encoding)
/// and `signature` is deliberately excluded (so an unsigned transaction
/// and its later-signed counterpart share a `tx_id`).
fn encode_tx_body(sender: &str, recipient: &str, amount: u64, timestamp: f64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(sender.as_bytes());
    buf.extend_from_slice(recipient.as_bytes());
    buf.extend_from_slice(&amount.to_be_bytes());
    buf.extend_from_slice(&timestamp.to_bits().to_be_bytes());
    buf
}

/// Computes `tx_id = hex(hash(encode({sender, recipient, amount, timestamp})))`.
pub fn tx_id(sender: &str, recipient: &str, amount: u64, timestamp: f64) -> String {
    let bytes = encode_tx_body(sender, recipient, amount, timestamp);
    hash(&bytes).to_hex()
}

/// Computes `block_hash` over `{height, prev_hash, concat(tx_hashes),
/// timestamp, proposer_id}`, in that field order.
pub fn block_hash(
    height: u64,
    prev_hash: &Hash256,
    tx_hashes: &[&str],
    timestamp: f64,
    proposer_id: &str,
) -> Hash256 {
    let mut buf = Vec::new();
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(prev_hash.as_bytes());
    for h in tx_hashes {
        buf.extend_from_slice(h.as_bytes());
    }
    buf.extend_from_slice(&timestamp.to_bits().to_be_bytes());
    buf.extend_from_slice(proposer_id.as_bytes());
    hash(&buf)
}

/// Signs `bytes` with an HMAC-SHA256 keyed by `private_key`.
///
/// Key derivation is out of scope here: callers supply opaque key bytes
/// obtained elsewhere (config, a keystore). Swapping in an asymmetric
/// scheme later only requires changing `sign`/`verify`; every caller
/// already treats signatures as opaque bytes.
pub fn sign(private_key: &[u8], bytes: &[u8]) -> Vec<u8> {
    use hmac::{Hmac, Mac};
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(private_key).expect("HMAC accepts any key length");
    mac.update(bytes);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies a signature produced by [`sign`].
pub fn verify(public_key: &[u8], bytes: &[u8], sig: &[u8]) -> bool {
    use hmac::{Hmac, Mac};
    type HmacSha256 = Hmac<Sha256>;

    let Ok(mut mac) = HmacSha256::new_from_slice(public_key) else {
        return false;
    };
    mac.update(bytes);
    mac.verify_slice(sig).is_ok()
}
