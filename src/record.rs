//! # Record Model
//!
//! Value types for fetched or affected rows: the record [`Key`], its bins and
//! its metadata (time-to-live and generation).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bin name to value mapping of a single record.
pub type Bins = BTreeMap<String, serde_json::Value>;

/// Length of a record digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// User supplied part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserKey {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Int(value) => write!(f, "{value}"),
            UserKey::Str(value) => write!(f, "{value}"),
            UserKey::Bytes(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<i64> for UserKey {
    fn from(value: i64) -> Self {
        UserKey::Int(value)
    }
}

impl From<&str> for UserKey {
    fn from(value: &str) -> Self {
        UserKey::Str(value.to_string())
    }
}

impl From<String> for UserKey {
    fn from(value: String) -> Self {
        UserKey::Str(value)
    }
}

impl From<Vec<u8>> for UserKey {
    fn from(value: Vec<u8>) -> Self {
        UserKey::Bytes(value)
    }
}

/// Hash identifying a record within a namespace/set when the user key is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// Build a digest from a raw byte slice. Returns `None` on a length mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Digest(array))
    }
}

/// Record key: namespace, optional set, and a user key and/or digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub namespace: String,
    pub set: Option<String>,
    pub user_key: Option<UserKey>,
    pub digest: Option<Digest>,
}

impl Key {
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        user_key: impl Into<UserKey>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: Some(set.into()),
            user_key: Some(user_key.into()),
            digest: None,
        }
    }

    /// Key addressed only by digest (user key not stored on the server).
    pub fn from_digest(namespace: impl Into<String>, set: Option<String>, digest: Digest) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            user_key: None,
            digest: Some(digest),
        }
    }

    /// Reconstruct a key from the loose shape delivered by the transport.
    pub fn from_raw(raw: RawKey) -> Self {
        Self {
            namespace: raw.ns,
            set: raw.set,
            user_key: raw.key,
            digest: raw.digest.as_deref().and_then(Digest::from_slice),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.set.as_deref().unwrap_or("");
        match &self.user_key {
            Some(user_key) => write!(f, "{}:{}:{}", self.namespace, set, user_key),
            None => write!(f, "{}:{}:<digest>", self.namespace, set),
        }
    }
}

/// Key as delivered by the transport for streamed records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawKey {
    pub ns: String,
    pub set: Option<String>,
    pub key: Option<UserKey>,
    pub digest: Option<Vec<u8>>,
}

/// Time-to-live and generation of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub ttl: Option<u32>,
    pub gen: Option<u32>,
}

impl RecordMetadata {
    pub fn new(ttl: u32, gen: u32) -> Self {
        Self {
            ttl: Some(ttl),
            gen: Some(gen),
        }
    }
}

/// A fetched or affected database row.
///
/// `bins` is `None` only when value retrieval was intentionally suppressed,
/// as for existence checks; otherwise it is present and possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub bins: Option<Bins>,
    pub ttl: Option<u32>,
    pub gen: Option<u32>,
}

impl Record {
    pub fn new(key: Key, bins: Option<Bins>, meta: Option<RecordMetadata>) -> Self {
        let meta = meta.unwrap_or_default();
        Self {
            key,
            bins,
            ttl: meta.ttl,
            gen: meta.gen,
        }
    }

    /// Record carrying metadata only, as produced by existence checks.
    pub fn metadata_only(key: Key, meta: Option<RecordMetadata>) -> Self {
        Self::new(key, None, meta)
    }

    pub fn bin(&self, name: &str) -> Option<&serde_json::Value> {
        self.bins.as_ref().and_then(|bins| bins.get(name))
    }
}
