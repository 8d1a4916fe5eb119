//! In-memory chunk cache.
//!
//! Holds the files the transcoder uploads, as the ordered list of body chunks
//! received so far, so that downloads can start before an upload finishes.
//! Each entry is append-only between resets. Temp-cached entries are evicted a
//! fixed delay after they are marked done.

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::classify::classify;
use crate::error::{Error, Result};

/// Entry in the chunk store.
struct CacheEntry {
    chunks: Vec<Bytes>,
    done: bool,
    generation: u64,
    bytes: usize,
}

impl CacheEntry {
    fn new(generation: u64) -> Self {
        Self {
            chunks: Vec::new(),
            done: false,
            generation,
            bytes: 0,
        }
    }
}

/// Consistent snapshot of the chunks appended since some index.
#[derive(Debug, Clone)]
pub struct ChunkSlice {
    /// Chunks from the requested index to the current end.
    pub chunks: Vec<Bytes>,
    /// Index to pass to the next read.
    pub next_index: usize,
    /// Whether the entry was done when the snapshot was taken.
    pub done: bool,
    /// Generation of the entry the snapshot was taken from.
    pub generation: u64,
}

impl ChunkSlice {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate the slice into a single buffer.
    pub fn concat(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => {
                let len = chunks.iter().map(Bytes::len).sum();
                let mut buf = BytesMut::with_capacity(len);
                for chunk in chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub done_entries: usize,
    pub total_bytes: usize,
}

struct Inner {
    entries: DashMap<String, CacheEntry>,
    next_generation: AtomicU64,
    eviction_delay: Duration,
}

/// Thread-safe keyed store of chunk sequences.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone)]
pub struct ChunkStore {
    inner: Arc<Inner>,
}

impl ChunkStore {
    /// Create a store whose temp-cached entries live `eviction_delay` past completion.
    pub fn new(eviction_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                next_generation: AtomicU64::new(1),
                eviction_delay,
            }),
        }
    }

    /// Create or overwrite the entry with an empty, not-done chunk list.
    ///
    /// Returns the generation stamped on the new entry. A pending eviction for
    /// an earlier generation will not remove it.
    pub fn reset(&self, filename: &str) -> u64 {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .insert(filename.to_string(), CacheEntry::new(generation));
        tracing::trace!(filename = %filename, generation, "Reset cache entry");
        generation
    }

    /// Append a chunk to an existing entry.
    pub fn append(&self, filename: &str, chunk: Bytes) -> Result<()> {
        let mut entry = self
            .inner
            .entries
            .get_mut(filename)
            .ok_or_else(|| Error::not_found(filename))?;
        entry.bytes += chunk.len();
        entry.chunks.push(chunk);
        Ok(())
    }

    /// Mark an entry complete.
    ///
    /// Idempotent. The first call on a temp-cached entry schedules its eviction.
    pub fn mark_done(&self, filename: &str) -> Result<()> {
        let generation = {
            let mut entry = self
                .inner
                .entries
                .get_mut(filename)
                .ok_or_else(|| Error::not_found(filename))?;
            if entry.done {
                return Ok(());
            }
            entry.done = true;
            tracing::trace!(
                filename = %filename,
                chunks = entry.chunks.len(),
                bytes = entry.bytes,
                "Cache entry done"
            );
            entry.generation
        };

        if classify(filename).temp_cached {
            self.schedule_eviction(filename, generation);
        }
        Ok(())
    }

    /// Snapshot the chunks from `from_index` onward.
    ///
    /// An index past the end yields an empty slice.
    pub fn read(&self, filename: &str, from_index: usize) -> Result<ChunkSlice> {
        let entry = self
            .inner
            .entries
            .get(filename)
            .ok_or_else(|| Error::not_found(filename))?;
        let start = from_index.min(entry.chunks.len());
        Ok(ChunkSlice {
            chunks: entry.chunks[start..].to_vec(),
            next_index: entry.chunks.len(),
            done: entry.done,
            generation: entry.generation,
        })
    }

    pub fn is_cached(&self, filename: &str) -> bool {
        self.inner.entries.contains_key(filename)
    }

    pub fn is_done(&self, filename: &str) -> bool {
        self.inner
            .entries
            .get(filename)
            .map(|entry| entry.done)
            .unwrap_or(false)
    }

    /// Remove an entry regardless of its state. Returns whether one existed.
    pub fn evict(&self, filename: &str) -> bool {
        let removed = self.inner.entries.remove(filename).is_some();
        if removed {
            tracing::debug!(filename = %filename, "Evicted cache entry");
        }
        removed
    }

    pub fn stats(&self) -> StoreStats {
        self.inner
            .entries
            .iter()
            .fold(StoreStats::default(), |mut stats, entry| {
                stats.entries += 1;
                stats.total_bytes += entry.bytes;
                if entry.done {
                    stats.done_entries += 1;
                }
                stats
            })
    }

    /// Live handles to this store. Scheduled evictions hold weak ones.
    #[cfg(test)]
    pub(crate) fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn schedule_eviction(&self, filename: &str, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(filename = %filename, "No runtime available, eviction not scheduled");
            return;
        };

        let deadline = tokio::time::Instant::now() + self.inner.eviction_delay;
        let store: Weak<Inner> = Arc::downgrade(&self.inner);
        let filename = filename.to_string();

        tracing::debug!(
            filename = %filename,
            delay_secs = self.inner.eviction_delay.as_secs(),
            "Scheduled cache eviction"
        );

        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(inner) = store.upgrade() else {
                return;
            };
            let removed = inner
                .entries
                .remove_if(&filename, |_, entry| entry.generation == generation)
                .is_some();
            if removed {
                tracing::debug!(filename = %filename, "Evicted expired cache entry");
            }
        });
    }
}

impl Default for ChunkStore {
    fn default() -> Self {
        // Default: 3000 second retention for temp-cached entries
        Self::new(Duration::from_secs(3000))
    }
}
