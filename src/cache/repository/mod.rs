//! Entity cache repositories.
//!
//! One [`Repository`] per entity kind, each owning its own [`Store`] and
//! [`Pool`]. Entity-specific event handling lives in the per-kind modules as
//! [`Demultiplex`] implementations.

mod channels;
mod guilds;
mod presences;
mod users;

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{Flags, Pool, Store};
use crate::config::RepoConfig;
use crate::error::Result;
use crate::events::{EventKind, Feedback};
use crate::models::{Cached, Channel, Entity, Guild, Presence, Snowflake, User};

pub type UserRepo = Repository<User>;
pub type ChannelRepo = Repository<Channel>;
pub type GuildRepo = Repository<Guild>;
pub type PresenceRepo = Repository<Presence>;

/// Read-side contract every repository exposes to application code.
pub trait BasicCacheRepo {
    type Item;

    /// Number of stored entries.
    fn size(&self) -> usize;

    /// Maximum number of entries (0 = unbounded).
    fn cap(&self) -> usize;

    fn list_ids(&self) -> Vec<Snowflake>;

    /// An isolated copy of the entry, or `None` on a miss.
    ///
    /// Entries known by id only count as misses.
    fn get(&self, id: Snowflake) -> Option<Self::Item>;

    fn del(&self, id: Snowflake);

    /// [`BasicCacheRepo::get`] honouring [`Flags::IGNORE_CACHE`].
    fn get_flagged(&self, id: Snowflake, flags: Flags) -> Option<Self::Item> {
        if flags.contains(Flags::IGNORE_CACHE) {
            return None;
        }
        self.get(id)
    }
}

/// State shared with a repository while it applies one event.
pub(crate) struct UpdateCtx<'a> {
    pub feedback: &'a Feedback,
    pub shard_id: u32,
    /// Set for synthetic deletes: when the parent entity was removed.
    /// Entries written after that moment belong to a newer parent.
    pub cascade: Option<Instant>,
}

/// Internal update contract, called only by the router.
pub(crate) trait Demultiplex {
    fn update(
        &self,
        ctx: &UpdateCtx<'_>,
        event: EventKind,
        payload: &[u8],
        flags: Flags,
    ) -> Result<Option<Cached>>;
}

/// How a payload is applied to an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Apply {
    /// Field-level merge into the current value.
    Merge,
    /// Reset first. A repeated create is a full re-sync.
    Replace,
}

/// Cache for one entity kind.
pub struct Repository<T: Entity> {
    store: Store<T>,
    pool: Pool<T>,
    enabled: bool,
    mutable: bool,
}

impl<T: Entity> Repository<T> {
    pub fn new(config: &RepoConfig, mutable: bool) -> Self {
        debug!(
            "Creating {} repository: enabled={}, max_entries={}, lifetime={:?}",
            T::KIND,
            !config.disabled,
            config.max_entries,
            config.lifetime
        );

        Self {
            store: Store::new(config.max_entries, config.lifetime),
            pool: Pool::new(),
            enabled: !config.disabled,
            mutable,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pool the copies come from. Hand copies back here when done.
    pub fn pool(&self) -> &Pool<T> {
        &self.pool
    }

    /// Shared snapshot of the canonical value, without copying.
    ///
    /// Only available when the cache was built with `mutable = true`. The
    /// snapshot is frozen: later updates detach the stored value instead of
    /// writing through it.
    pub fn get_shared(&self, id: Snowflake) -> Option<Arc<T>> {
        if !self.mutable {
            return None;
        }
        let store = self.store.read();
        store
            .get(id)
            .filter(|value| !value.is_partial())
            .map(Arc::clone)
    }

    /// Reclaim expired entries now instead of waiting for capacity pressure.
    pub fn purge_expired(&self) -> usize {
        let expired = self.store.write().purge_expired();
        let count = expired.len();
        for value in expired {
            self.recycle(value);
        }
        count
    }

    /// Copy `value` into a pooled container.
    fn copy_out(&self, value: &T) -> T {
        let mut copy = self.pool.get();
        value.copy_into(&mut copy);
        copy
    }

    /// Return a value that left the store to the pool, unless a shared
    /// snapshot still holds it.
    fn recycle(&self, value: Arc<T>) {
        if let Ok(value) = Arc::try_unwrap(value) {
            self.pool.put(value);
        }
    }

    /// Apply `f` to the entry for `id`, creating it from the pool if absent.
    ///
    /// Returns a copy of the result unless [`Flags::IGNORE_CACHE`] is set.
    pub(crate) fn upsert(
        &self,
        id: Snowflake,
        mode: Apply,
        flags: Flags,
        f: impl FnOnce(&mut T),
    ) -> Option<T> {
        let want_copy = !flags.contains(Flags::IGNORE_CACHE);
        let mut store = self.store.write();

        let (copy, displaced) = match store.get_mut(id) {
            Some(existing) => {
                if mode == Apply::Replace {
                    existing.reset();
                }
                f(&mut *existing);
                existing.set_id(id);
                let copy = want_copy.then(|| self.copy_out(existing));
                store.touch(id);
                (copy, None)
            }
            None => {
                let mut fresh = self.pool.get();
                f(&mut fresh);
                fresh.set_id(id);
                let copy = want_copy.then(|| self.copy_out(&fresh));
                (copy, store.set(id, fresh))
            }
        };
        drop(store);

        if let Some(value) = displaced {
            self.recycle(value);
        }
        copy
    }

    /// Apply `f` only if `id` is cached. Never creates an entry.
    pub(crate) fn modify(&self, id: Snowflake, flags: Flags, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut store = self.store.write();
        let existing = store.get_mut(id)?;
        f(&mut *existing);
        (!flags.contains(Flags::IGNORE_CACHE)).then(|| self.copy_out(existing))
    }

    /// Remove `id`, handing the removed value to the caller.
    ///
    /// An expired entry is dropped as well but counts as a miss.
    pub(crate) fn remove(&self, id: Snowflake, flags: Flags) -> Option<T> {
        let (removed, live) = {
            let mut store = self.store.write();
            let live = store.contains(id);
            (store.delete(id)?, live)
        };
        if !live || flags.contains(Flags::IGNORE_CACHE) {
            self.recycle(removed);
            return None;
        }
        Some(Arc::unwrap_or_clone(removed))
    }

    /// Remove `id` whether or not it expired. The flag tells which.
    pub(crate) fn take(&self, id: Snowflake) -> Option<(T, bool)> {
        let (removed, live) = {
            let mut store = self.store.write();
            let live = store.contains(id);
            (store.delete(id)?, live)
        };
        Some((Arc::unwrap_or_clone(removed), live))
    }

    /// Remove `id` only if `pred` holds for the stored value and, when
    /// `written_before` is given, the entry has not been written since.
    pub(crate) fn remove_if(
        &self,
        id: Snowflake,
        written_before: Option<Instant>,
        pred: impl FnOnce(&T) -> bool,
    ) -> bool {
        let removed = {
            let mut store = self.store.write();
            let stale = match (store.written(id), written_before) {
                (Some(written), Some(before)) => written <= before,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !stale || !store.get(id).is_some_and(|value| pred(value.as_ref())) {
                return false;
            }
            store.delete(id)
        };
        if let Some(value) = removed {
            self.recycle(value);
        }
        true
    }

    /// A non-mutating reference by id: the cached copy, or an id-only stub.
    pub(crate) fn reference(&self, id: Snowflake, flags: Flags) -> Option<T> {
        if flags.contains(Flags::IGNORE_CACHE) {
            return None;
        }
        let cached = {
            let store = self.store.read();
            store.get(id).map(|value| self.copy_out(value))
        };
        Some(cached.unwrap_or_else(|| {
            let mut stub = self.pool.get();
            stub.set_id(id);
            stub
        }))
    }
}

impl<T: Entity> BasicCacheRepo for Repository<T> {
    type Item = T;

    fn size(&self) -> usize {
        self.store.read().size()
    }

    fn cap(&self) -> usize {
        self.store.read().cap()
    }

    fn list_ids(&self) -> Vec<Snowflake> {
        self.store.read().list_ids()
    }

    fn get(&self, id: Snowflake) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let mut item = self.pool.get();
        let found = {
            let store = self.store.read();
            match store.get(id) {
                Some(value) if !value.is_partial() => {
                    value.copy_into(&mut item);
                    true
                }
                _ => false,
            }
        };

        if found {
            Some(item)
        } else {
            self.pool.put(item);
            None
        }
    }

    fn del(&self, id: Snowflake) {
        let removed = self.store.write().delete(id);
        if let Some(value) = removed {
            self.recycle(value);
        }
    }
}

impl<T: Entity> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("kind", &T::KIND)
            .field("enabled", &self.enabled)
            .field("size", &self.size())
            .field("cap", &self.cap())
            .finish()
    }
}
