//! Cache store contract and the in-memory implementation.
//!
//! The store keeps rendered fragments keyed by (widget id, cache key) and
//! provides the advisory regeneration lock that serializes rebuilds of one
//! key. Lock acquisition is non-blocking; a held lock expires after a bound
//! so a crashed worker cannot deadlock future regenerations.
//!
//! Store I/O failures are absorbed by implementations: a failed read is a
//! miss, a failed acquisition is contention. The pipeline fails open to
//! regeneration rather than treating the store as fatal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::domain::WidgetId;

use super::entry::CacheEntry;
use super::lock::{LockToken, warn_stale_token};

/// Bound on how long a regeneration lock may be held when the caller does
/// not carry its own configured bound.
pub const DEFAULT_LOCK_HOLD: Duration = Duration::from_secs(10);

/// Key/value store for rendered fragments plus the regeneration lock
/// primitive.
pub trait CacheStore: Send + Sync {
    fn get(&self, widget_id: WidgetId, key: &str) -> Option<CacheEntry>;

    /// Write an entry, replacing any previous one atomically.
    ///
    /// When `lock` is supplied the store validates the token is still
    /// current before writing; a stale token skips the write and returns
    /// `false`. Release stays the caller's responsibility either way.
    fn set(&self, widget_id: WidgetId, key: &str, entry: CacheEntry, lock: Option<&LockToken>)
    -> bool;

    fn delete(&self, widget_id: WidgetId, key: &str);

    /// Non-blocking acquisition of the regeneration lock for one key.
    /// An acquired lock expires `hold` after acquisition even if release
    /// is missed.
    fn acquire_lock(&self, widget_id: WidgetId, key: &str, hold: Duration) -> Option<LockToken>;

    /// Idempotent; a token that already expired releases as a no-op.
    fn release_lock(&self, token: &LockToken);

    /// Hint that a key is about to be read, letting multi-get backends warm
    /// a batch. No-op by default.
    fn preload(&self, _widget_id: WidgetId, _key: &str) {}
}

struct LockSlot {
    id: u64,
    expires_at: Instant,
}

/// In-memory store backed by `DashMap`, suitable for single-process hosts
/// and tests. Entries live until replaced or deleted; eviction policy stays
/// with the host.
pub struct MemoryCacheStore {
    entries: DashMap<(WidgetId, String), CacheEntry>,
    locks: DashMap<(WidgetId, String), LockSlot>,
    next_lock_id: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            next_lock_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.locks.clear();
    }

    fn lock_is_current(&self, token: &LockToken) -> bool {
        self.locks
            .get(&(token.widget_id, token.key.clone()))
            .map(|slot| slot.id == token.id && slot.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, widget_id: WidgetId, key: &str) -> Option<CacheEntry> {
        self.entries
            .get(&(widget_id, key.to_string()))
            .map(|entry| entry.clone())
    }

    fn set(
        &self,
        widget_id: WidgetId,
        key: &str,
        entry: CacheEntry,
        lock: Option<&LockToken>,
    ) -> bool {
        if let Some(token) = lock {
            if !self.lock_is_current(token) {
                warn_stale_token(token);
                return false;
            }
        }
        self.entries.insert((widget_id, key.to_string()), entry);
        true
    }

    fn delete(&self, widget_id: WidgetId, key: &str) {
        self.entries.remove(&(widget_id, key.to_string()));
    }

    fn acquire_lock(&self, widget_id: WidgetId, key: &str, hold: Duration) -> Option<LockToken> {
        let now = Instant::now();
        let slot_key = (widget_id, key.to_string());
        let id = self.next_lock_id.fetch_add(1, Ordering::Relaxed);
        let slot = LockSlot {
            id,
            expires_at: now + hold,
        };

        match self.locks.entry(slot_key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    debug!(widget_id, cache_key = key, "regeneration lock contended");
                    return None;
                }
                // previous holder missed its release; the bound recovers it
                debug!(widget_id, cache_key = key, "expired regeneration lock reclaimed");
                occupied.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }

        Some(LockToken {
            widget_id,
            key: key.to_string(),
            id,
        })
    }

    fn release_lock(&self, token: &LockToken) {
        self.locks
            .remove_if(&(token.widget_id, token.key.clone()), |_, slot| {
                slot.id == token.id
            });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn entry_round_trip_and_delete() {
        let store = MemoryCacheStore::new();
        assert!(store.get(1, "sidebar").is_none());

        let entry = CacheEntry::new("<p>hi</p>", 100);
        assert!(store.set(1, "sidebar", entry.clone(), None));
        assert_eq!(store.get(1, "sidebar"), Some(entry));

        store.delete(1, "sidebar");
        assert!(store.get(1, "sidebar").is_none());
    }

    #[test]
    fn write_replaces_whole_entry() {
        let store = MemoryCacheStore::new();
        let mut first = CacheEntry::new("<p>old</p>", 100);
        first
            .extra
            .required_externals
            .insert("css".to_string(), vec!["x".to_string()]);
        store.set(1, "sidebar", first, None);

        store.set(1, "sidebar", CacheEntry::new("<p>new</p>", 200), None);
        let current = store.get(1, "sidebar").expect("entry");
        assert_eq!(current.html, "<p>new</p>");
        assert!(current.extra.is_empty());
    }

    #[test]
    fn lock_is_mutually_exclusive_per_key() {
        let store = MemoryCacheStore::new();
        let token = store
            .acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD)
            .expect("first acquire");
        assert!(store.acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD).is_none());

        store.release_lock(&token);
        assert!(store.acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD).is_some());
    }

    #[test]
    fn lock_release_is_idempotent() {
        let store = MemoryCacheStore::new();
        let token = store
            .acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD)
            .expect("acquire");
        store.release_lock(&token);
        store.release_lock(&token);

        // a release of an old token must not free the current holder
        let current = store
            .acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD)
            .expect("reacquire");
        store.release_lock(&token);
        assert!(store.acquire_lock(1, "sidebar", DEFAULT_LOCK_HOLD).is_none());
        store.release_lock(&current);
    }

    #[test]
    fn lock_expires_after_hold_bound() {
        let store = MemoryCacheStore::new();
        let hold = Duration::from_millis(20);
        let _leaked = store.acquire_lock(1, "sidebar", hold).expect("acquire");
        assert!(store.acquire_lock(1, "sidebar", hold).is_none());

        thread::sleep(Duration::from_millis(40));
        assert!(
            store.acquire_lock(1, "sidebar", hold).is_some(),
            "expired lock must be reclaimable"
        );
    }

    #[test]
    fn set_with_stale_token_is_refused() {
        let store = MemoryCacheStore::new();
        let token = store
            .acquire_lock(1, "sidebar", Duration::from_millis(20))
            .expect("acquire");
        thread::sleep(Duration::from_millis(40));

        assert!(!store.set(1, "sidebar", CacheEntry::new("late", 100), Some(&token)));
        assert!(store.get(1, "sidebar").is_none());

        // unlocked writes still land
        assert!(store.set(1, "sidebar", CacheEntry::new("ok", 100), None));
    }

    #[test]
    fn concurrent_acquisition_admits_exactly_one() {
        let store = Arc::new(MemoryCacheStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.acquire_lock(9, "cold_key", DEFAULT_LOCK_HOLD).is_some()
            }));
        }
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .filter(|acquired| *acquired)
            .count();
        assert_eq!(winners, 1);
    }
}
