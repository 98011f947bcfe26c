//! Size-bounded LRU store for rendered artifacts.
//!
//! Keys follow a fixed scheme:
//! - `"<electionId>"` holds the PDF + bubbles pair
//! - `"<electionId>.png"` holds the PNG preview
//!
//! Entries are never mutated in place; writers overwrite or invalidate whole
//! keys. Nothing expires on its own.
//!
//! Every key also carries a generation that only [`ArtifactCache::invalidate`]
//! advances. A render started before an invalidation stores its result with
//! [`ArtifactCache::put_if_current`], which refuses it once the generation
//! has moved on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::body::Bytes;
use lru::LruCache;
use tracing::debug;

use crate::render::Ballot;

/// A cached render output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Ballot(Ballot),
    Png(Bytes),
}

impl Artifact {
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Ballot(ballot) => ballot.size_bytes(),
            Self::Png(png) => png.len(),
        }
    }
}

pub fn ballot_key(election_id: i64) -> String {
    election_id.to_string()
}

pub fn png_key(election_id: i64) -> String {
    format!("{election_id}.png")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub capacity_bytes: usize,
}

struct CacheEntry {
    value: Artifact,
    size: usize,
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    /// Keys never invalidated are at generation 0 and have no slot here.
    generations: HashMap<String, u64>,
    used: usize,
    capacity: usize,
}

impl CacheInner {
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn insert(&mut self, key: String, value: Artifact, size_bytes: usize) {
        if let Some(previous) = self.entries.pop(&key) {
            self.used -= previous.size;
        }

        if size_bytes > self.capacity {
            debug!(%key, size_bytes, capacity = self.capacity, "artifact larger than cache, not stored");
            return;
        }

        self.entries.put(
            key,
            CacheEntry {
                value,
                size: size_bytes,
            },
        );
        self.used += size_bytes;

        // The fresh entry sits at the most recent end, so it is reached last.
        while self.used > self.capacity {
            let Some((evicted, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.used -= entry.size;
            debug!(key = %evicted, size_bytes = entry.size, "evicted artifact");
        }
    }
}

/// Shared artifact cache. One mutex guards lookups, inserts and removals so
/// size accounting and recency order always move together.
pub struct ArtifactCache {
    inner: Mutex<CacheInner>,
}

impl ArtifactCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                generations: HashMap::new(),
                used: 0,
                capacity: capacity_bytes,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Every critical section leaves the accounting consistent before it can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<Artifact> {
        let mut inner = self.lock();
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Inserts or overwrites `key`, then evicts least recently used entries
    /// until the total fits the capacity.
    ///
    /// A value larger than the whole capacity is not kept, and any previous
    /// value under the same key is dropped with it.
    pub fn put(&self, key: impl Into<String>, value: Artifact, size_bytes: usize) {
        self.lock().insert(key.into(), value, size_bytes);
    }

    /// Current generation of `key`. Read it before fetching the data a value
    /// is derived from, then hand it to [`Self::put_if_current`].
    pub fn generation(&self, key: &str) -> u64 {
        self.lock().generation(key)
    }

    /// Like [`Self::put`], but only while `key` is still at `generation`.
    /// Returns whether the value was stored.
    pub fn put_if_current(
        &self,
        key: impl Into<String>,
        value: Artifact,
        size_bytes: usize,
        generation: u64,
    ) -> bool {
        let key = key.into();
        let mut inner = self.lock();
        if inner.generation(&key) != generation {
            debug!(%key, generation, "artifact invalidated while rendering, not stored");
            return false;
        }
        inner.insert(key, value, size_bytes);
        true
    }

    /// Removes `key` if present and advances its generation either way.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.pop(key) {
            inner.used -= entry.size;
        }
        *inner.generations.entry(key.to_owned()).or_insert(0) += 1;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            used_bytes: inner.used,
            capacity_bytes: inner.capacity,
        }
    }
}
