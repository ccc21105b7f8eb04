//! Cache Manager Module
//!
//! Main cache engine: an in-memory TTL map capped by entry count, an optional
//! durable mirror for `persistent` entries, and hit/miss accounting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::stats::Counters;
use crate::cache::{
    CacheEntry, CacheOptions, CacheStats, DurableStore, DEFAULT_MAX_ENTRIES, DEFAULT_TTL,
};
use crate::clock::{SharedClock, SystemClock};
use crate::error::StorageError;

/// Builds the full key `{prefix}:{key}`.
pub fn full_key(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}

// == Slot ==
/// A primary-tier entry plus its insertion sequence, which breaks timestamp
/// ties when choosing the eviction victim.
#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

// == Cache Manager ==
/// Two-tier TTL cache.
///
/// Reads never fail: a missing or expired key is `None`. Durable-tier errors
/// are logged and swallowed, the memory tier stays the source of truth.
#[derive(Debug)]
pub struct CacheManager {
    /// Primary tier, keyed by full key
    entries: HashMap<String, Slot>,
    /// Optional secondary tier
    durable: Option<Box<dyn DurableStore>>,
    counters: Counters,
    max_entries: usize,
    default_ttl: Duration,
    clock: SharedClock,
    next_seq: u64,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}

impl CacheManager {
    // == Constructor ==
    /// Creates a memory-only manager.
    ///
    /// # Arguments
    /// * `max_entries` - Primary-tier cap (at least 1)
    /// * `default_ttl` - TTL used when a set does not name one
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            durable: None,
            counters: Counters::default(),
            max_entries: max_entries.max(1),
            default_ttl,
            clock: Arc::new(SystemClock),
            next_seq: 0,
        }
    }

    /// Attaches a durable tier for `persistent` entries.
    pub fn with_durable(self, store: impl DurableStore + 'static) -> Self {
        self.with_boxed_durable(Box::new(store))
    }

    pub fn with_boxed_durable(mut self, store: Box<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Set ==
    /// Stores `value` under `{prefix}:{key}`.
    ///
    /// Overwrites reset the entry's age and TTL. If the primary tier grows
    /// past the cap, the entries with the oldest creation timestamp go first.
    pub fn set(&mut self, key: &str, value: Value, options: &CacheOptions) {
        let full = full_key(options.key_prefix(), key);
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);

        if options.persistent {
            self.write_durable(&full, &entry);
        }
        self.insert_primary(full, entry);
    }

    // == Get ==
    /// Looks up `{prefix}:{key}`, falling back to the durable tier when
    /// `persistent` is set.
    ///
    /// Every call records exactly one hit or one miss.
    pub fn get(&mut self, key: &str, options: &CacheOptions) -> Option<Value> {
        let full = full_key(options.key_prefix(), key);
        let now = self.clock.now_ms();

        if let Some(slot) = self.entries.get(&full) {
            if slot.entry.is_valid_at(now) {
                let data = slot.entry.data.clone();
                self.counters.record_hit();
                return Some(data);
            }

            debug!(key = %full, "Dropping expired cache entry on read");
            self.entries.remove(&full);
            if options.persistent {
                self.remove_durable(&full);
            }
            self.counters.record_miss();
            return None;
        }

        if options.persistent {
            if let Some(entry) = self.read_durable(&full) {
                if entry.is_valid_at(now) {
                    let data = entry.data.clone();
                    self.insert_primary(full, entry);
                    self.counters.record_hit();
                    return Some(data);
                }
                self.remove_durable(&full);
            }
        }

        self.counters.record_miss();
        None
    }

    // == Has ==
    /// Checks the primary tier for a valid entry. Does not touch the durable
    /// tier or the counters.
    pub fn has(&self, key: &str, options: &CacheOptions) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(&full_key(options.key_prefix(), key))
            .is_some_and(|slot| slot.entry.is_valid_at(now))
    }

    // == Remove ==
    /// Deletes `{prefix}:{key}`; absent keys are a no-op.
    pub fn remove(&mut self, key: &str, options: &CacheOptions) {
        let full = full_key(options.key_prefix(), key);
        self.entries.remove(&full);
        if options.persistent {
            self.remove_durable(&full);
        }
    }

    // == Clear Prefix ==
    /// Deletes every entry under `{prefix}:` in both tiers.
    ///
    /// Returns the number of primary-tier entries removed.
    pub fn clear_prefix(&mut self, prefix: &str) -> usize {
        let scope = format!("{prefix}:");
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&scope));
        let removed = before - self.entries.len();

        if let Some(store) = self.durable.as_mut() {
            if let Err(e) = store.remove_prefix(&scope) {
                warn!(prefix, store = store.name(), error = %e, "Failed to clear durable cache prefix");
            }
        }

        debug!(prefix, removed, "Cleared cache prefix");
        removed
    }

    // == Clear All ==
    /// Empties both tiers and resets the statistics.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.counters.reset();
        if let Some(store) = self.durable.as_mut() {
            if let Err(e) = store.clear() {
                warn!(store = store.name(), error = %e, "Failed to clear durable cache");
            }
        }
    }

    // == Cleanup ==
    /// Removes all expired primary-tier entries; the durable tier is left
    /// alone.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.entry.is_valid_at(now));
        before - self.entries.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    // == Length ==
    /// Returns the current number of primary-tier entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    /// Inserts `entry` and evicts down to the cap. The key just inserted is
    /// never the victim, even when its timestamp is the oldest (an entry
    /// restored from the durable tier).
    fn insert_primary(&mut self, full: String, entry: CacheEntry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(full.clone(), Slot { entry, seq });

        while self.entries.len() > self.max_entries {
            let Some(victim) = self
                .entries
                .iter()
                .filter(|(key, _)| **key != full)
                .min_by_key(|(_, slot)| (slot.entry.timestamp, slot.seq))
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.entries.remove(&victim);
            self.counters.record_eviction();
            debug!(key = %victim, "Evicted oldest cache entry");
        }
    }

    fn write_durable(&mut self, full: &str, entry: &CacheEntry) {
        let Some(store) = self.durable.as_mut() else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(StorageError::from)
            .and_then(|raw| store.set(full, raw));
        if let Err(e) = result {
            warn!(key = %full, store = store.name(), error = %e, "Failed to persist cache entry");
        }
    }

    fn read_durable(&self, full: &str) -> Option<CacheEntry> {
        let store = self.durable.as_ref()?;
        match store.get(full) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key = %full, error = %e, "Discarding unreadable durable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %full, store = store.name(), error = %e, "Failed to read durable cache entry");
                None
            }
        }
    }

    fn remove_durable(&mut self, full: &str) {
        if let Some(store) = self.durable.as_mut() {
            if let Err(e) = store.remove(full) {
                warn!(key = %full, store = store.name(), error = %e, "Failed to remove durable cache entry");
            }
        }
    }
}
