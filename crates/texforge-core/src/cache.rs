//! Content-addressed result cache.
//!
//! Maps a [`Fingerprint`] to the completed upscale of that content.
//!
//! # Invariants
//!
//! 1. A fingerprint present in the cache always maps to a complete,
//!    successful result.  Failed or partial results are never inserted.
//! 2. `put` is all-or-nothing: storage is reserved before the map is
//!    touched, so an allocation failure leaves any prior entry intact.
//! 3. Re-inserting identical content for a fingerprint is an observable
//!    no-op.
//!
//! # Growth
//!
//! Under [`CachePolicy::Unbounded`] (the default) entries live until the
//! cache is dropped: memory grows with the number of distinct textures seen.
//! Hosts with a long tail of unique textures should configure
//! [`CachePolicy::Lru`], which evicts the least recently *read or written*
//! entry once `max_entries` is reached.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UpscaleError};
use crate::fingerprint::Fingerprint;
use crate::types::{TextureRef, UpscaledTexture, rgb_len};

/// Retention policy for cached results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Never evict.  Entries are released when the cache is dropped.
    #[default]
    Unbounded,
    /// Keep at most `max_entries`, evicting the least recently used.
    Lru { max_entries: NonZeroUsize },
}

/// Point-in-time cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
    pub bytes: usize,
}

/// Fingerprint → upscaled texture store.
///
/// Not internally synchronized: all mutation goes through `&mut self`.
pub struct ResultCache {
    entries: LruCache<Fingerprint, UpscaledTexture>,
    policy: CachePolicy,
    stats: CacheStats,
}

impl ResultCache {
    pub fn new(policy: CachePolicy) -> Self {
        let entries = match policy {
            CachePolicy::Unbounded => LruCache::unbounded(),
            CachePolicy::Lru { max_entries } => LruCache::new(max_entries),
        };
        Self {
            entries,
            policy,
            stats: CacheStats::default(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Whether a result exists.  Does not count as a read for LRU purposes.
    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.entries.contains(&fingerprint)
    }

    /// Borrow a cached result.
    ///
    /// The view is valid until the next mutating call on the cache.
    pub fn get(&mut self, fingerprint: Fingerprint) -> Option<TextureRef<'_>> {
        match self.entries.get(&fingerprint) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry.view())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Borrow a cached result without counting a hit or touching LRU order.
    ///
    /// For re-reading an entry whose lookup was already counted by
    /// [`ResultCache::get`] or that was just inserted.
    pub fn peek(&self, fingerprint: Fingerprint) -> Option<TextureRef<'_>> {
        self.entries.peek(&fingerprint).map(UpscaledTexture::view)
    }

    /// Copy `data` into cache-owned storage under `fingerprint`.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::BufferTooSmall`] if `data` is not exactly
    /// `width × height × 3` bytes, [`UpscaleError::Allocation`] if storage
    /// cannot be reserved.  The cache is unchanged on error.
    pub fn put(&mut self, fingerprint: Fingerprint, data: &[u8], width: u32, height: u32) -> Result<()> {
        let need = rgb_len(width, height).ok_or(UpscaleError::InvalidDimensions { width, height })?;
        if data.len() != need {
            return Err(UpscaleError::BufferTooSmall {
                need,
                have: data.len(),
            });
        }
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(need)
            .map_err(|_| UpscaleError::Allocation { bytes: need })?;
        owned.extend_from_slice(data);
        self.insert(fingerprint, UpscaledTexture::new(owned, width, height)?);
        Ok(())
    }

    /// Store an already-owned result without copying.
    pub fn insert(&mut self, fingerprint: Fingerprint, texture: UpscaledTexture) {
        self.stats.bytes += texture.data.len();
        self.stats.inserts += 1;
        if let Some((old_key, old)) = self.entries.push(fingerprint, texture) {
            self.stats.bytes -= old.data.len();
            if old_key != fingerprint {
                self.stats.evictions += 1;
                debug!(
                    evicted = %old_key,
                    bytes = old.data.len(),
                    "Result cache evicted least recently used entry"
                );
            }
        }
    }

    /// Drop every entry.  Counters other than `entries`/`bytes` are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
