//! Cache manager: memory tier in front of a [`PersistentStore`].
//!
//! All bookkeeping lives behind one synchronous mutex that is never held
//! across an `.await`. Keys being removed from the persistent tier are kept in
//! a `deleting` map for the duration of the removal, so a `get` that races an
//! expiry or an eviction reports a clean miss instead of reading a half
//! removed entry back from storage.
//!
//! Persistent writes and removals of one key are serialized by a per-key
//! async lock. Each scheduled removal carries a ticket; a write admitted
//! after the removal was scheduled retires the ticket, and the removal is
//! then skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use cider_common::Result;
use cider_config::CacheSettings;

use super::entry::{decode_entry, encode_entry, CacheEntry};
use super::store::PersistentStore;
use crate::clock::{Clock, SystemClock};

/// Per-write overrides for [`CacheManager::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Falls back to `CacheSettings::default_ttl_secs`.
    pub ttl: Option<Duration>,
    /// Tags used by [`CacheManager::invalidate`].
    pub dependencies: Vec<String>,
}

impl SetOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_dependency(mut self, tag: impl Into<String>) -> Self {
        self.dependencies.push(tag.into());
        self
    }
}

/// Counters since construction or the last [`CacheManager::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries currently in the memory tier.
    pub size: usize,
}

impl CacheStats {
    /// Fraction of lookups served, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Key -> ticket of the removal in flight.
    deleting: HashMap<String, u64>,
    delete_seq: u64,
    key_locks: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    access_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.access_seq += 1;
        self.access_seq
    }

    fn mark_deleting(&mut self, key: &str) -> u64 {
        self.delete_seq += 1;
        self.deleting.insert(key.to_string(), self.delete_seq);
        self.delete_seq
    }

    /// Make room for one more entry; returns the evicted keys with the
    /// tickets of their pending removals.
    fn evict_for_insert(&mut self, capacity: usize) -> Vec<(String, u64)> {
        let mut evicted = Vec::new();
        while !self.entries.is_empty() && self.entries.len() >= capacity {
            let victim = self
                .entries
                .values()
                .min_by_key(|e| e.access_seq)
                .map(|e| e.key.clone());
            let Some(victim) = victim else { break };
            self.entries.remove(&victim);
            self.evictions += 1;
            let ticket = self.mark_deleting(&victim);
            evicted.push((victim, ticket));
        }
        evicted
    }

    /// Insert (or replace) an entry with a fresh access sequence.
    fn admit(&mut self, mut entry: CacheEntry, capacity: usize) -> Vec<(String, u64)> {
        let evicted = if self.entries.contains_key(&entry.key) {
            Vec::new()
        } else {
            self.evict_for_insert(capacity)
        };
        entry.access_seq = self.next_seq();
        self.deleting.remove(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
        evicted
    }
}

enum MemoryLookup {
    Hit(serde_json::Value),
    Expired(u64),
    Deleting,
    Absent,
}

/// Two-tier cache with TTL expiry, LRU bounding and dependency invalidation.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CacheState>>,
    settings: CacheSettings,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("settings", &self.settings)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    pub fn new(store: Arc<dyn PersistentStore>, settings: CacheSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn PersistentStore>,
        settings: CacheSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            state: Arc::new(Mutex::new(CacheState::default())),
            settings,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_key(&self, key: &str) -> String {
        format!("{}{}", self.settings.key_prefix, key)
    }

    fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.default_ttl_secs)
    }

    /// Look up a typed value. Values that no longer deserialize as `T` are
    /// reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Look up a raw JSON value.
    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();
        let lookup = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let expired = state.entries.get(key).map(|e| e.is_expired(now));
            match expired {
                Some(true) => {
                    state.entries.remove(key);
                    state.misses += 1;
                    MemoryLookup::Expired(state.mark_deleting(key))
                }
                Some(false) => {
                    let seq = state.next_seq();
                    state.hits += 1;
                    match state.entries.get_mut(key) {
                        Some(entry) => {
                            entry.access_seq = seq;
                            entry.last_accessed = now;
                            MemoryLookup::Hit(entry.data.clone())
                        }
                        None => MemoryLookup::Absent,
                    }
                }
                None if state.deleting.contains_key(key) => {
                    state.misses += 1;
                    MemoryLookup::Deleting
                }
                None => MemoryLookup::Absent,
            }
        };

        match lookup {
            MemoryLookup::Hit(data) => {
                debug!(key, "cache hit (memory)");
                Some(data)
            }
            MemoryLookup::Expired(ticket) => {
                debug!(key, "cache entry expired");
                self.remove_persisted(key, ticket).await;
                None
            }
            MemoryLookup::Deleting => {
                debug!(key, "cache miss (deletion in flight)");
                None
            }
            MemoryLookup::Absent => self.get_from_store(key, now).await,
        }
    }

    async fn get_from_store(
        &self,
        key: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<serde_json::Value> {
        let raw = match self.store.get(&self.store_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.record_miss();
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                self.record_miss();
                warn!(key, error = %e, "persistent tier read failed");
                return None;
            }
        };

        let entry = match decode_entry(&raw) {
            Ok(entry) if entry.key == key => entry,
            Ok(_) | Err(_) => {
                self.record_miss();
                warn!(key, "discarding corrupted persisted entry");
                self.remove_stale(key).await;
                return None;
            }
        };

        if entry.is_expired(now) {
            self.record_miss();
            debug!(key, "persisted entry expired");
            self.remove_stale(key).await;
            return None;
        }

        let (data, evicted) = {
            let mut state = self.lock_state();
            if state.deleting.contains_key(key) {
                // Invalidated or evicted while the read was in flight.
                state.misses += 1;
                return None;
            }
            state.hits += 1;
            if self.settings.max_memory_entries == 0 {
                (entry.data, Vec::new())
            } else if let Some(current) = state.entries.get(key) {
                // A concurrent set already admitted a newer value.
                (current.data.clone(), Vec::new())
            } else {
                let data = entry.data.clone();
                let evicted = state.admit(entry, self.settings.max_memory_entries);
                (data, evicted)
            }
        };
        debug!(key, "cache hit (persistent, promoted)");
        self.spawn_evictions(evicted);
        Some(data)
    }

    /// Store a typed value.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value, options).await
    }

    /// Store a raw JSON value, persistent tier first.
    ///
    /// A quota failure in the persistent tier keeps the entry in memory only.
    /// Any other persistence failure is returned and the entry is not admitted.
    pub async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        options: SetOptions,
    ) -> Result<()> {
        let now = self.clock.now();
        let ttl = options.ttl.unwrap_or_else(|| self.default_ttl());
        let mut entry = CacheEntry::new(key, value, now, ttl, options.dependencies);
        let encoded = encode_entry(&entry)?;
        let store_key = self.store_key(key);

        let lock = self.key_lock(key);
        let _serial = lock.lock().await;

        entry.persisted = match self.store.set(&store_key, &encoded).await {
            Ok(()) => true,
            Err(e) if e.is_quota() => {
                warn!(key, error = %e, "persistent tier full, caching in memory only");
                // An older persisted copy must not outlive this write.
                if let Err(e) = self.store.remove(&store_key).await {
                    debug!(key, error = %e, "could not drop stale persisted copy");
                }
                false
            }
            Err(e) => {
                warn!(key, error = %e, "persistent tier write failed, entry rejected");
                return Err(e.into());
            }
        };

        let evicted = {
            let mut state = self.lock_state();
            // This write supersedes any removal scheduled before it.
            state.deleting.remove(key);
            if self.settings.max_memory_entries == 0 {
                return Ok(());
            }
            state.admit(entry, self.settings.max_memory_entries)
        };
        trace!(key, "cache set");
        self.spawn_evictions(evicted);
        Ok(())
    }

    /// Remove every entry tagged with `tag`; returns how many were removed.
    pub async fn invalidate(&self, tag: &str) -> usize {
        let mut doomed: Vec<(String, u64)> = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let keys: Vec<String> = state
                .entries
                .values()
                .filter(|e| e.depends_on(tag))
                .map(|e| e.key.clone())
                .collect();
            keys.into_iter()
                .map(|key| {
                    state.entries.remove(&key);
                    let ticket = state.mark_deleting(&key);
                    (key, ticket)
                })
                .collect()
        };

        // Entries that are only in the persistent tier (memory-evicted or
        // from a previous process) would otherwise resurface on the next get.
        for key in self.persisted_keys().await {
            if doomed.iter().any(|(k, _)| k == &key) {
                continue;
            }
            let depends = match self.store.get(&self.store_key(&key)).await {
                Ok(Some(raw)) => decode_entry(&raw).map(|e| e.depends_on(tag)).unwrap_or(false),
                _ => false,
            };
            if depends {
                if let Some(ticket) = self.mark_stale(&key) {
                    doomed.push((key, ticket));
                }
            }
        }

        for (key, ticket) in &doomed {
            self.remove_persisted(key, *ticket).await;
        }
        debug!(tag, removed = doomed.len(), "cache invalidated");
        doomed.len()
    }

    /// Empty both tiers and reset all counters and the access sequence.
    ///
    /// Only keys under the configured prefix are removed from the persistent
    /// tier.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            state.entries.clear();
            state.deleting.clear();
            state.access_seq = 0;
            state.hits = 0;
            state.misses = 0;
            state.evictions = 0;
        }
        let keys = self.store.list_keys().await?;
        for store_key in keys
            .iter()
            .filter(|k| k.starts_with(&self.settings.key_prefix))
        {
            if let Err(e) = self.store.remove(store_key).await {
                warn!(key = %store_key, error = %e, "failed to clear persisted entry");
            }
        }
        debug!("cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size: state.entries.len(),
        }
    }

    /// Whether `key` is in the memory tier, without touching its LRU rank.
    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.lock_state().entries.contains_key(key)
    }

    fn record_miss(&self) {
        self.lock_state().misses += 1;
    }

    /// Schedule removal of a persisted copy found stale, unless a newer value
    /// has been admitted to memory meanwhile.
    fn mark_stale(&self, key: &str) -> Option<u64> {
        let mut state = self.lock_state();
        if state.entries.contains_key(key) {
            None
        } else {
            Some(state.mark_deleting(key))
        }
    }

    async fn remove_stale(&self, key: &str) {
        if let Some(ticket) = self.mark_stale(key) {
            self.remove_persisted(key, ticket).await;
        }
    }

    /// Async lock serializing persistent writes and removals of `key`.
    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut state = self.lock_state();
        state
            .key_locks
            .retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        state.key_locks.entry(key.to_string()).or_default().clone()
    }

    /// Unprefixed keys currently held by the persistent tier.
    async fn persisted_keys(&self) -> Vec<String> {
        match self.store.list_keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| {
                    k.strip_prefix(&self.settings.key_prefix)
                        .map(str::to_string)
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list persistent tier keys");
                Vec::new()
            }
        }
    }

    /// Remove `key` from the persistent tier and clear its deleting mark,
    /// unless a write has retired `ticket` first.
    async fn remove_persisted(&self, key: &str, ticket: u64) {
        let lock = self.key_lock(key);
        let _serial = lock.lock().await;

        let current = self.lock_state().deleting.get(key).copied();
        if current != Some(ticket) {
            trace!(key, "persisted removal superseded by a newer write");
            return;
        }
        if let Err(e) = self.store.remove(&self.store_key(key)).await {
            warn!(key, error = %e, "persistent tier remove failed");
        }
        let mut state = self.lock_state();
        if state.deleting.get(key) == Some(&ticket) {
            state.deleting.remove(key);
        }
    }

    /// Best-effort background removal of evicted keys from the persistent
    /// tier. The caller never waits on these.
    fn spawn_evictions(&self, evicted: Vec<(String, u64)>) {
        for (key, ticket) in evicted {
            debug!(key = %key, "cache eviction");
            let this = self.clone();
            tokio::spawn(async move {
                this.remove_persisted(&key, ticket).await;
            });
        }
    }
}
