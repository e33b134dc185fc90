//! Identity System - Native document identities
//!
//! Identities have a native form and a canonical string form stored under the
//! document's `_id` key. Conversion between the two is lossless.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// A native identity type usable as a model's `Id`
pub trait Identity: Clone + fmt::Debug + fmt::Display + PartialEq + Send + Sync + 'static {
    /// Generate a fresh identity
    fn generate() -> Self;

    /// Parse the canonical string form
    fn parse_canonical(raw: &str) -> ModelResult<Self>;

    /// The canonical string form stored in documents
    fn canonical(&self) -> String {
        self.to_string()
    }
}

static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| rand::thread_rng().gen());
static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(rand::thread_rng().gen()));

/// 12-byte document identity: 4-byte big-endian Unix seconds, 5 random bytes
/// fixed per process and a 3-byte wrapping counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Time component, second precision
    pub fn timestamp(&self) -> DateTime<Utc> {
        let mut seconds = [0u8; 4];
        seconds.copy_from_slice(&self.0[..4]);
        Utc.timestamp_opt(i64::from(u32::from_be_bytes(seconds)), 0)
            .single()
            .unwrap_or_default()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn parse_str(raw: &str) -> ModelResult<Self> {
        if raw.len() != 24 {
            return Err(ModelError::InvalidIdentityFormat {
                input: raw.to_string(),
                reason: format!("expected 24 hex characters, got {}", raw.len()),
            });
        }
        let decoded = hex::decode(raw).map_err(|e| ModelError::InvalidIdentityFormat {
            input: raw.to_string(),
            reason: e.to_string(),
        })?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}

impl Identity for ObjectId {
    fn generate() -> Self {
        Self::new()
    }

    fn parse_canonical(raw: &str) -> ModelResult<Self> {
        Self::parse_str(raw)
    }
}

impl Identity for Uuid {
    fn generate() -> Self {
        Uuid::new_v4()
    }

    fn parse_canonical(raw: &str) -> ModelResult<Self> {
        Uuid::parse_str(raw).map_err(|e| ModelError::InvalidIdentityFormat {
            input: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex_round_trip() {
        let id = ObjectId::new();
        let parsed: ObjectId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_hex().len(), 24);
    }

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_id_timestamp_is_recent() {
        let id = ObjectId::new();
        let age = Utc::now() - id.timestamp();
        assert!(age.num_seconds() <= 1);
    }

    #[test]
    fn test_object_id_known_value() {
        let id = ObjectId::parse_str("5f1a2b3c4d5e6f7a8b9c0d1e").unwrap();
        assert_eq!(id.bytes()[0], 0x5f);
        assert_eq!(id.to_string(), "5f1a2b3c4d5e6f7a8b9c0d1e");
        assert_eq!(id.timestamp().timestamp(), 0x5f1a2b3c);
    }

    #[test]
    fn test_invalid_object_ids() {
        for raw in ["", "abc", "zz1a2b3c4d5e6f7a8b9c0d1e", "5f1a2b3c4d5e6f7a8b9c0d1e00"] {
            match ObjectId::parse_str(raw) {
                Err(ModelError::InvalidIdentityFormat { input, .. }) => assert_eq!(input, raw),
                other => panic!("Expected invalid identity for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_object_id_serde_as_string() {
        let id = ObjectId::parse_str("5f1a2b3c4d5e6f7a8b9c0d1e").unwrap();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!("5f1a2b3c4d5e6f7a8b9c0d1e"));
        let back: ObjectId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_value::<ObjectId>(serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_uuid_identity() {
        let id = <Uuid as Identity>::generate();
        assert_eq!(Uuid::parse_canonical(&id.canonical()).unwrap(), id);
        assert!(matches!(
            Uuid::parse_canonical("not-a-uuid"),
            Err(ModelError::InvalidIdentityFormat { .. })
        ));
    }
}
