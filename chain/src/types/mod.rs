//! Core domain types shared across the chain.
//!
//! This module defines strongly-typed hashes and validator identifiers used
//! throughout the replication engine. The goal is to avoid "naked" byte
//! buffers and strings in public APIs and instead use domain-specific
//! newtypes.

use serde::{Deserialize, Serialize};

pub mod block;
pub mod tx;

pub use block::{Block, GENESIS_PROPOSER_ID};
pub use tx::Transaction;

/// Length in bytes of the hash type used throughout the chain.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (SHA-256).
///
/// This type backs all fixed-size content hashes in the chain: block
/// hashes, transaction ids, and the chained `prev_hash` link. It is always
/// exactly [`HASH_LEN`] bytes long and serializes as a lowercase hex string
/// so it can travel inside JSON envelopes and the on-disk chain file
/// unambiguously.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The all-zero hash used as `prev_hash` for the genesis block.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Returns the underlying 32-byte array as a borrowed slice.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hex-encodes this hash (lowercase, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a lowercase hex string into a [`Hash256`].
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s).map_err(|_| HashParseError::BadHex)?;
        if bytes.len() != HASH_LEN {
            return Err(HashParseError::WrongLength(bytes.len()));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Hash256(arr))
    }
}

/// Error returned when a hex string cannot be parsed into a [`Hash256`].
#[derive(Debug)]
pub enum HashParseError {
    BadHex,
    WrongLength(usize),
}

impl std::fmt::Display for HashParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashParseError::BadHex => write!(f, "invalid hex encoding"),
            HashParseError::WrongLength(n) => {
                write!(f, "expected {HASH_LEN}-byte hash, got {n} bytes")
            }
        }
    }
}

impl std::error::Error for HashParseError {}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Canonical identifier for a validator (a normalized hostname).
///
/// Per the consolidation of short-name vs fully-qualified-hostname
/// comparisons scattered through the message handlers, every validator
/// identifier entering the system is normalized once, at construction of
/// the [`crate::consensus::ValidatorSet`], to a single canonical string.
/// Everywhere else in the system compares `ValidatorId`s directly rather
/// than re-deriving a canonical form.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub String);

impl ValidatorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(s: &str) -> Self {
        ValidatorId(s.to_string())
    }
}

impl From<String> for ValidatorId {
    fn from(s: String) -> Self {
        ValidatorId(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_roundtrip() {
        let h = Hash256([7u8; HASH_LEN]);
        let hex = h.to_hex();
        let parsed = Hash256::from_hex(&hex).expect("valid hex");
        assert_eq!(h.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn hash_from_hex_rejects_wrong_length() {
        let err = Hash256::from_hex("aabb").unwrap_err();
        matches!(err, HashParseError::WrongLength(2));
    }

    #[test]
    fn zero_hash_is_all_zero_bytes() {
        assert_eq!(Hash256::ZERO.as_bytes(), &[0u8; HASH_LEN]);
    }
}
