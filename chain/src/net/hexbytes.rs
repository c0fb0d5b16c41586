//! Serde helper: encodes a `Vec<u8>` as a lowercase hex string.
//!
//! Used for the envelope `signature` field so binary payloads travel as
//! strings inside JSON, matching the hex-encoding convention used for
//! every other byte field on the wire.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    hex::decode(&s).map_err(serde::de::Error::custom)
}
