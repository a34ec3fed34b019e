//! Fixed-capacity LFU store.
//!
//! The lock is not hidden behind the store's methods. Repositories take
//! [`Store::read`] or [`Store::write`] once and run a whole read-then-write
//! sequence under that guard.
//!
//! ```text
//!   set(new_id) on a full store
//!        │
//!        ▼
//!   oldest write expired? ── yes ──► reclaim it
//!        │ no
//!        ▼
//!   pop min (hits, insertion seq)   ← least used, then oldest
//!        │
//!        ▼
//!   read since ranked? ── yes ──► re-rank with current hits, pop again
//!        │ no
//!        ▼
//!      evict
//! ```
//!
//! Reads only bump an atomic counter under the shared lock. The ranking
//! index catches up lazily, when a stale key reaches the front.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use crate::models::Snowflake;

/// Thread-safe store with an explicit reader/writer lock.
pub struct Store<T> {
    inner: RwLock<StoreInner<T>>,
}

impl<T> Store<T> {
    /// Create a store holding at most `capacity` entries (0 = unbounded).
    pub fn new(capacity: usize, lifetime: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                by_use: BTreeSet::new(),
                by_age: BTreeSet::new(),
                capacity,
                lifetime,
                next_seq: 0,
            }),
        }
    }

    /// Acquire the shared lock.
    pub fn read(&self) -> RwLockReadGuard<'_, StoreInner<T>> {
        self.inner.read()
    }

    /// Acquire the exclusive lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, StoreInner<T>> {
        self.inner.write()
    }
}

struct Slot<T> {
    value: Arc<T>,
    hits: AtomicU64,
    /// `hits` as recorded in the entry's `by_use` key.
    ranked: u64,
    seq: u64,
    written: Instant,
}

/// Store contents, reachable only through a lock guard.
pub struct StoreInner<T> {
    entries: HashMap<Snowflake, Slot<T>>,
    /// `(hits, seq, id)`, smallest first. A key may lag behind its slot's
    /// counter but never runs ahead of it.
    by_use: BTreeSet<(u64, u64, Snowflake)>,
    /// `(written, seq, id)`, only kept when entries can expire.
    by_age: BTreeSet<(Instant, u64, Snowflake)>,
    capacity: usize,
    lifetime: Option<Duration>,
    next_seq: u64,
}

impl<T> StoreInner<T> {
    fn is_live(&self, slot: &Slot<T>) -> bool {
        match self.lifetime {
            Some(lifetime) => slot.written.elapsed() < lifetime,
            None => true,
        }
    }

    /// Look up a live entry and count the access.
    pub fn get(&self, id: Snowflake) -> Option<&Arc<T>> {
        let slot = self.entries.get(&id)?;
        if !self.is_live(slot) {
            return None;
        }
        slot.hits.fetch_add(1, Ordering::Relaxed);
        Some(&slot.value)
    }

    /// Check for a live entry without counting an access.
    pub fn contains(&self, id: Snowflake) -> bool {
        self.entries.get(&id).is_some_and(|slot| self.is_live(slot))
    }

    /// When a live entry was last written.
    pub fn written(&self, id: Snowflake) -> Option<Instant> {
        self.entries
            .get(&id)
            .filter(|slot| self.is_live(slot))
            .map(|slot| slot.written)
    }

    /// Mutable access to a live entry, counting the access.
    ///
    /// Detaches the value from any outstanding shared snapshot first. Does
    /// not restart the entry's lifetime; see [`StoreInner::touch`].
    pub fn get_mut(&mut self, id: Snowflake) -> Option<&mut T>
    where
        T: Clone,
    {
        let lifetime = self.lifetime;
        let slot = self.entries.get_mut(&id)?;
        if lifetime.is_some_and(|lifetime| slot.written.elapsed() >= lifetime) {
            return None;
        }
        *slot.hits.get_mut() += 1;
        Some(Arc::make_mut(&mut slot.value))
    }

    /// Mark an entry as written now, restarting its lifetime.
    pub fn touch(&mut self, id: Snowflake) -> bool {
        self.restamp(id).is_some()
    }

    fn restamp(&mut self, id: Snowflake) -> Option<&mut Slot<T>> {
        let slot = self.entries.get_mut(&id)?;
        let now = Instant::now();
        if self.lifetime.is_some() {
            self.by_age.remove(&(slot.written, slot.seq, id));
            self.by_age.insert((now, slot.seq, id));
        }
        slot.written = now;
        Some(slot)
    }

    /// Insert or replace the value for `id`.
    ///
    /// Replacing keeps the entry's frequency and insertion order. Inserting a
    /// new id into a full store evicts one entry first. Returns whichever
    /// value was displaced, if any.
    pub fn set(&mut self, id: Snowflake, value: T) -> Option<Arc<T>> {
        if let Some(slot) = self.restamp(id) {
            return Some(std::mem::replace(&mut slot.value, Arc::new(value)));
        }

        let evicted = if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.evict()
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        let written = Instant::now();

        self.by_use.insert((1, seq, id));
        if self.lifetime.is_some() {
            self.by_age.insert((written, seq, id));
        }
        self.entries.insert(
            id,
            Slot {
                value: Arc::new(value),
                hits: AtomicU64::new(1),
                ranked: 1,
                seq,
                written,
            },
        );

        evicted
    }

    fn evict(&mut self) -> Option<Arc<T>> {
        if let Some(lifetime) = self.lifetime {
            if let Some(&(written, _, id)) = self.by_age.first() {
                if written.elapsed() >= lifetime {
                    trace!("Reclaiming expired entry {}", id);
                    return self.unlink(id);
                }
            }
        }

        while let Some((ranked, seq, id)) = self.by_use.pop_first() {
            let Some(slot) = self.entries.get_mut(&id) else {
                continue;
            };
            let hits = *slot.hits.get_mut();
            if hits > ranked {
                slot.ranked = hits;
                self.by_use.insert((hits, seq, id));
                continue;
            }

            trace!("Evicting entry {}", id);
            return self.unlink(id);
        }

        None
    }

    fn unlink(&mut self, id: Snowflake) -> Option<Arc<T>> {
        let slot = self.entries.remove(&id)?;
        self.by_use.remove(&(slot.ranked, slot.seq, id));
        if self.lifetime.is_some() {
            self.by_age.remove(&(slot.written, slot.seq, id));
        }
        Some(slot.value)
    }

    /// Remove `id`, returning its value even if it had expired.
    pub fn delete(&mut self, id: Snowflake) -> Option<Arc<T>> {
        self.unlink(id)
    }

    /// Drop every expired entry and return the removed values.
    pub fn purge_expired(&mut self) -> Vec<Arc<T>> {
        let Some(lifetime) = self.lifetime else {
            return Vec::new();
        };

        let mut purged = Vec::new();
        while let Some(&(written, _, id)) = self.by_age.first() {
            if written.elapsed() < lifetime {
                break;
            }
            purged.extend(self.unlink(id));
        }
        purged
    }

    /// Number of stored entries, expired ones included until reclaimed.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Configured capacity (0 = unbounded).
    pub fn cap(&self) -> usize {
        self.capacity
    }

    /// Ids of all live entries, in no particular order.
    pub fn list_ids(&self) -> Vec<Snowflake> {
        self.entries
            .iter()
            .filter(|(_, slot)| self.is_live(slot))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Recorded use count of an entry.
    pub fn frequency(&self, id: Snowflake) -> Option<u64> {
        self.entries
            .get(&id)
            .map(|slot| slot.hits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> Snowflake {
        Snowflake(n)
    }

    #[test]
    fn test_eviction_keeps_capacity_and_drops_least_used() {
        let store: Store<u32> = Store::new(3, None);
        let mut inner = store.write();

        inner.set(id(1), 1);
        inner.set(id(2), 2);
        inner.set(id(3), 3);

        // 1 and 3 are used again, 2 stays at a single use
        inner.get(id(1));
        inner.get(id(3));

        let evicted = inner.set(id(4), 4);
        assert_eq!(evicted.as_deref(), Some(&2));
        assert_eq!(inner.size(), 3);
        assert!(!inner.contains(id(2)));
        assert!(inner.contains(id(4)));
    }

    #[test]
    fn test_eviction_tie_breaks_by_oldest_insertion() {
        let store: Store<u32> = Store::new(2, None);
        let mut inner = store.write();

        inner.set(id(10), 10);
        inner.set(id(20), 20);

        let evicted = inner.set(id(30), 30);
        assert_eq!(evicted.as_deref(), Some(&10));

        let mut ids = inner.list_ids();
        ids.sort();
        assert_eq!(ids, vec![id(20), id(30)]);
    }

    #[test]
    fn test_replace_keeps_frequency() {
        let store: Store<u32> = Store::new(2, None);
        let mut inner = store.write();

        inner.set(id(1), 1);
        inner.get(id(1));
        inner.get(id(1));
        let old = inner.set(id(1), 100);

        assert_eq!(old.as_deref(), Some(&1));
        assert_eq!(inner.frequency(id(1)), Some(3));
        assert_eq!(inner.get(id(1)).map(|v| **v), Some(100));
    }

    #[test]
    fn test_get_mut_counts_as_use() {
        let store: Store<u32> = Store::new(2, None);
        let mut inner = store.write();

        inner.set(id(1), 1);
        inner.set(id(2), 2);
        *inner.get_mut(id(1)).unwrap() += 1;

        inner.set(id(3), 3);
        assert!(inner.contains(id(1)));
        assert!(!inner.contains(id(2)));
        assert_eq!(inner.get(id(1)).map(|v| **v), Some(2));
    }

    #[test]
    fn test_get_mut_detaches_shared_snapshot() {
        let store: Store<String> = Store::new(0, None);
        let snapshot = {
            let mut inner = store.write();
            inner.set(id(1), "a".to_string());
            Arc::clone(inner.get(id(1)).unwrap())
        };

        store.write().get_mut(id(1)).unwrap().push('b');

        assert_eq!(*snapshot, "a");
        assert_eq!(store.read().get(id(1)).map(|v| v.as_str()), Some("ab"));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let store: Store<u64> = Store::new(0, None);
        let mut inner = store.write();

        for n in 1..=100 {
            assert!(inner.set(id(n), n).is_none());
        }
        assert_eq!(inner.size(), 100);
        assert_eq!(inner.cap(), 0);
    }

    #[test]
    fn test_lifetime_expiry() {
        let store: Store<u32> = Store::new(2, Some(Duration::ZERO));
        let mut inner = store.write();

        inner.set(id(1), 1);
        assert!(inner.get(id(1)).is_none());
        assert!(inner.get_mut(id(1)).is_none());
        assert!(inner.list_ids().is_empty());
        assert_eq!(inner.size(), 1);

        assert_eq!(inner.purge_expired().len(), 1);
        assert_eq!(inner.size(), 0);
    }

    #[test]
    fn test_expired_entries_are_evicted_first() {
        let store: Store<u32> = Store::new(2, Some(Duration::from_millis(50)));
        {
            let mut inner = store.write();
            inner.set(id(1), 1);
            inner.get(id(1));
            inner.get(id(1));
        }

        std::thread::sleep(Duration::from_millis(80));

        let mut inner = store.write();
        inner.set(id(2), 2);
        let evicted = inner.set(id(3), 3);
        assert_eq!(evicted.as_deref(), Some(&1));
    }

    #[test]
    fn test_delete() {
        let store: Store<u32> = Store::new(4, None);
        let mut inner = store.write();

        inner.set(id(1), 1);
        assert_eq!(inner.delete(id(1)).as_deref(), Some(&1));
        assert!(inner.delete(id(1)).is_none());
        assert_eq!(inner.size(), 0);
    }

    #[test]
    fn test_shared_reads_reorder_eviction() {
        let store: Store<u32> = Store::new(3, None);
        {
            let mut inner = store.write();
            inner.set(id(1), 1);
            inner.set(id(2), 2);
            inner.set(id(3), 3);
        }
        {
            let inner = store.read();
            inner.get(id(1));
            inner.get(id(1));
            inner.get(id(2));
        }

        let evicted = store.write().set(id(4), 4);
        assert_eq!(evicted.as_deref(), Some(&3));

        {
            let inner = store.read();
            for _ in 0..3 {
                inner.get(id(4));
            }
        }

        // 1 = 3 hits, 2 = 2 hits, 4 = 4 hits
        let evicted = store.write().set(id(5), 5);
        assert_eq!(evicted.as_deref(), Some(&2));
    }

    #[test]
    fn test_churn_on_full_store() {
        let store: Store<u64> = Store::new(64, None);
        let mut inner = store.write();

        for n in 1..=64 {
            inner.set(id(n), n);
        }
        for _ in 0..10 {
            inner.get(id(1));
        }

        for n in 65..=5_000 {
            assert!(inner.set(id(n), n).is_some());
            assert_eq!(inner.size(), 64);
        }

        assert!(inner.contains(id(1)));
        assert!(inner.contains(id(5_000)));
        assert_eq!(inner.frequency(id(1)), Some(11));
    }

    #[test]
    fn test_touch_restarts_lifetime() {
        let store: Store<u32> = Store::new(0, Some(Duration::from_millis(100)));
        store.write().set(id(1), 1);
        store.write().set(id(2), 2);
        let first = store.read().written(id(1)).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        assert!(store.write().touch(id(1)));
        assert!(store.read().written(id(1)).unwrap() > first);
        std::thread::sleep(Duration::from_millis(60));

        let mut inner = store.write();
        assert!(inner.written(id(2)).is_none());
        let purged = inner.purge_expired();
        assert_eq!(purged.len(), 1);
        assert_eq!(*purged[0], 2);
        assert!(inner.contains(id(1)));
        assert!(!inner.touch(id(2)));
    }
}
