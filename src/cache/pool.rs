//! Object pool for entity containers.
//!
//! Recycling containers keeps the hot update path from allocating a fresh
//! `String`/`Vec` set for every copy handed to callers.

use std::sync::Arc;

use crossbeam::queue::SegQueue;

/// Types that can be cleared back to their zero value in place.
///
/// Implementations should keep heap capacity (`String::clear`, `Vec::clear`)
/// so a recycled item is cheaper than a new one.
pub trait Reset {
    fn reset(&mut self);
}

/// Unbounded, lock-free pool of reusable items.
///
/// Cloning is cheap and shares the same underlying queue.
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

struct PoolInner<T> {
    queue: SegQueue<T>,
    create: Box<dyn Fn() -> T + Send + Sync + 'static>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Pool<T>
where
    T: Reset + Default + 'static,
{
    /// Create a pool that builds new items with `T::default`.
    pub fn new() -> Self {
        Self::with_factory(T::default)
    }
}

impl<T> Default for Pool<T>
where
    T: Reset + Default + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reset> Pool<T> {
    /// Create a pool with a custom factory for new items.
    pub fn with_factory(create: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                queue: SegQueue::new(),
                create: Box::new(create),
            }),
        }
    }

    /// Take an item out of the pool, building one if none is free.
    ///
    /// Ownership moves to the caller.
    pub fn get(&self) -> T {
        self.inner
            .queue
            .pop()
            .unwrap_or_else(|| (self.inner.create)())
    }

    /// Reset `item` and make it available again.
    pub fn put(&self, mut item: T) {
        item.reset();
        self.inner.queue.push(item);
    }

    /// Number of idle items waiting for reuse.
    pub fn idle(&self) -> usize {
        self.inner.queue.len()
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.inner.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        name: String,
        tags: Vec<u32>,
    }

    impl Reset for Item {
        fn reset(&mut self) {
            self.name.clear();
            self.tags.clear();
        }
    }

    #[test]
    fn test_put_resets_item() {
        let pool: Pool<Item> = Pool::new();

        let mut item = pool.get();
        item.name.push_str("hello");
        item.tags.extend([1, 2, 3]);
        pool.put(item);

        assert_eq!(pool.idle(), 1);
        let item = pool.get();
        assert_eq!(item, Item::default());
        assert!(item.name.capacity() >= 5);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_factory_used_when_empty() {
        let pool = Pool::with_factory(|| Item {
            name: String::with_capacity(64),
            tags: Vec::new(),
        });

        let item = pool.get();
        assert!(item.name.capacity() >= 64);
    }

    #[test]
    fn test_clone_shares_queue() {
        let pool: Pool<Item> = Pool::new();
        let other = pool.clone();

        other.put(Item::default());
        assert_eq!(pool.idle(), 1);
    }
}
