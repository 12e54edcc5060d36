//! Cache entries and their persisted encoding.
//!
//! In memory an entry carries real temporal values. The persisted form stores
//! RFC 3339 strings and a millisecond TTL; [`encode_entry`] and
//! [`decode_entry`] are the only places that translate between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::store::StoreError;

/// Persisted format version.
const ENTRY_VERSION: u32 = 1;

/// One cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub dependencies: Vec<String>,
    pub last_accessed: DateTime<Utc>,
    /// LRU rank; higher is more recent.
    pub access_seq: u64,
    /// False when the entry lives in memory only.
    pub persisted: bool,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        data: serde_json::Value,
        now: DateTime<Utc>,
        ttl: Duration,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            key: key.into(),
            data,
            created_at: now,
            ttl,
            dependencies,
            last_accessed: now,
            access_seq: 0,
            persisted: false,
        }
    }

    /// Age measured from creation; clock skew backwards counts as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) >= self.ttl
    }

    pub fn depends_on(&self, tag: &str) -> bool {
        self.dependencies.iter().any(|d| d == tag)
    }
}

/// Wire form of a [`CacheEntry`] in the persistent tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub version: u32,
    pub key: String,
    pub data: serde_json::Value,
    pub created_at: String,
    pub ttl_ms: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub last_accessed: String,
}

/// Serialize an entry for the persistent tier.
pub fn encode_entry(entry: &CacheEntry) -> Result<String, serde_json::Error> {
    let persisted = PersistedEntry {
        version: ENTRY_VERSION,
        key: entry.key.clone(),
        data: entry.data.clone(),
        created_at: entry.created_at.to_rfc3339(),
        ttl_ms: u64::try_from(entry.ttl.as_millis()).unwrap_or(u64::MAX),
        dependencies: entry.dependencies.clone(),
        last_accessed: entry.last_accessed.to_rfc3339(),
    };
    serde_json::to_string(&persisted)
}

fn parse_instant(key: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupted {
            key: key.to_string(),
        })
}

/// Parse a persisted entry back into memory form.
///
/// The decoded entry has `access_seq == 0`; the manager assigns a fresh
/// sequence number when it promotes the entry.
pub fn decode_entry(raw: &str) -> Result<CacheEntry, StoreError> {
    let persisted: PersistedEntry =
        serde_json::from_str(raw).map_err(|_| StoreError::Corrupted {
            key: "<unparseable>".to_string(),
        })?;
    if persisted.version != ENTRY_VERSION {
        return Err(StoreError::Corrupted { key: persisted.key });
    }
    let created_at = parse_instant(&persisted.key, &persisted.created_at)?;
    let last_accessed = parse_instant(&persisted.key, &persisted.last_accessed)?;

    Ok(CacheEntry {
        key: persisted.key,
        data: persisted.data,
        created_at,
        ttl: Duration::from_millis(persisted.ttl_ms),
        dependencies: persisted.dependencies,
        last_accessed,
        access_seq: 0,
        persisted: true,
    })
}
