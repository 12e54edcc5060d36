//! Two-tier result cache.
//!
//! - **Memory tier**: bounded map, LRU-evicted by a monotonic access sequence
//! - **Persistent tier**: an external async key-value store ([`PersistentStore`])
//!
//! Entries expire after their TTL and can be invalidated in bulk through
//! dependency tags. Writes go to the persistent tier first; an entry is only
//! admitted to memory once persistence succeeded or was degraded by a quota
//! failure.

mod entry;
mod manager;
mod store;

pub use entry::{decode_entry, encode_entry, CacheEntry, PersistedEntry};
pub use manager::{CacheManager, CacheStats, SetOptions};
pub use store::{FileStore, MemoryStore, PersistentStore, StoreError};
