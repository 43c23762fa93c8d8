//! Concurrent in-memory caches with sliding expiration.
//!
//! Two caches sit in front of the identity store: role id → claims and
//! user id → role ids. Both are [`ExpiringCache`]s backed by a `DashMap`,
//! so lookups on different keys never contend on a global lock.
//!
//! # Expiry
//!
//! Every entry carries its own TTL. A successful read pushes `expires_at`
//! forward by that TTL; an expired entry is dropped on the next lookup of
//! its key. Keys that are never looked up again are swept by
//! [`ExpiringCache::purge_expired`], which also runs every
//! [`SWEEP_INTERVAL`] inserts.
//!
//! # Invalidation and in-flight fills
//!
//! A fill reads from the store without holding any lock, so an invalidation
//! can land while the store query is running. Fills therefore take a
//! [`FillTicket`] before querying and hand it back on insert; `remove` bumps
//! the cache generation first, and a fill whose ticket predates the bump is
//! discarded. The caller that started the fill still gets its (possibly
//! stale) answer, but nothing stale is left behind for later lookups.

use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{ClaimSet, RoleIdSet};

/// Default sliding window for both engine caches.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(180);

/// Number of inserts between automatic sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 256;

/// Role id → resolved claim set.
pub type RoleClaimCache = ExpiringCache<String, Arc<ClaimSet>>;

/// User id → resolved role id set.
pub type PrincipalRoleCache = ExpiringCache<String, Arc<RoleIdSet>>;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    ttl: Duration,
    expires_at: Instant,
}

/// Generation snapshot taken before a cache fill starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Concurrent map with per-entry sliding expiration.
pub struct ExpiringCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    generation: AtomicU64,
    inserts: AtomicU64,
    default_ttl: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            default_ttl,
        }
    }

    /// Returns the cached value and slides its expiry, or `None` on a miss.
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        {
            let mut entry = self.entries.get_mut(key)?;
            if entry.expires_at > now {
                entry.expires_at = now + entry.ttl;
                return Some(entry.value.clone());
            }
        }
        // Another reader may have refreshed the entry in the meantime.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Inserts with the cache's default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts with an explicit TTL. The last writer for a key wins.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(key, Self::entry(value, ttl));
        self.note_insert();
    }

    /// Invalidates a key. Removing an absent key is a no-op.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        // Bump before removing so a racing fill cannot slip in afterwards.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(key);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    /// Takes a ticket to be passed to [`complete_fill`](Self::complete_fill).
    pub fn begin_fill(&self) -> FillTicket {
        FillTicket(self.generation.load(Ordering::SeqCst))
    }

    /// Stores a freshly loaded value unless an invalidation happened since
    /// `ticket` was taken. Returns whether the value was stored.
    pub fn complete_fill(&self, ticket: FillTicket, key: K, value: V) -> bool {
        let slot = self.entries.entry(key);
        if self.generation.load(Ordering::SeqCst) != ticket.0 {
            return false;
        }
        slot.insert(Self::entry(value, self.default_ttl));
        self.note_insert();
        true
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Must be called with no shard guard held.
    fn note_insert(&self) {
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
    }

    fn entry(value: V, ttl: Duration) -> CacheEntry<V> {
        CacheEntry {
            value,
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }
}

impl<K, V> Default for ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
