//! Memoized transform results keyed by (content hash, options hash)

use crate::contract::{CacheStats, FilterMode, FilterOptions, PostId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    content: u64,
    options: u64,
}

impl CacheKey {
    pub fn new(raw: &str, mode: FilterMode, options: &FilterOptions) -> Self {
        let mut hasher = Xxh3::new();
        mode.hash(&mut hasher);
        options.hash(&mut hasher);
        Self {
            content: xxh3_64(raw.as_bytes()),
            options: hasher.finish(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    post_id: Option<PostId>,
    expires_at: Instant,
}

/// Inserts between sweeps of expired entries
const SWEEP_INTERVAL: u64 = 256;

/// Entry cap used by `TransformCache::new`
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    by_post: HashMap<PostId, HashSet<CacheKey>>,
    inserts_since_sweep: u64,
}

impl CacheState {
    fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Drop the soonest-expiring tenth of the entries
    fn remove_soonest(&mut self) -> usize {
        let mut keys: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.expires_at, *key))
            .collect();
        keys.sort_unstable_by_key(|(expires_at, _)| *expires_at);
        let count = (keys.len() / 10).max(1);
        for (_, key) in keys.iter().take(count) {
            self.remove(key);
        }
        count.min(keys.len())
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        if let Some(post_id) = entry.post_id {
            if let Some(keys) = self.by_post.get_mut(&post_id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_post.remove(&post_id);
                }
            }
        }
        true
    }
}

/// In-process transform cache with per-entry TTL
///
/// Expired entries are swept every few hundred inserts, and the entry count
/// never exceeds `max_entries`.
#[derive(Debug)]
pub struct TransformCache {
    state: Mutex<CacheState>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fresh entry for `key`, dropping it when expired
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                state.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, post_id: Option<PostId>, value: String, ttl: Duration) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.remove(&key);

        state.inserts_since_sweep += 1;
        let mut evicted = 0;
        if state.inserts_since_sweep >= SWEEP_INTERVAL || state.entries.len() >= self.max_entries {
            state.inserts_since_sweep = 0;
            evicted += state.remove_expired(now);
        }
        if state.entries.len() >= self.max_entries {
            evicted += state.remove_soonest();
            tracing::debug!(max_entries = self.max_entries, "Transform cache full; evicted soonest-expiring entries");
        }
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }

        if let Some(post_id) = post_id {
            state.by_post.entry(post_id).or_default().insert(key);
        }
        state.entries.insert(
            key,
            CacheEntry {
                value,
                post_id,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every entry produced for `post_id`
    pub fn clear_post(&self, post_id: PostId) -> usize {
        let mut state = self.state.lock();
        let keys = state.by_post.remove(&post_id).unwrap_or_default();
        let removed = keys.iter().filter(|key| state.entries.remove(key).is_some()).count();
        tracing::debug!(post_id, removed, "Cleared cached transforms for post");
        removed
    }

    /// Drop everything
    pub fn clear_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.by_post.clear();
        removed
    }


    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.state.lock().entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
