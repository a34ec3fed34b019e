//! Cache module - gateway state mirror.
//!
//! ## Architecture
//!
//! - `Store` - LFU-evicting id -> value map behind one `RwLock`
//! - `Pool` - recycled entity containers
//! - `Repository` - one store and pool per entity kind, plus merge logic
//! - `Router` - event kind -> repositories table
//! - `Feedback` - queue of synthetic deletes fed back into the router
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use gateway_cache::{BasicCacheRepo, Cache, CacheConfig, Snowflake};
//! # async fn demo() -> gateway_cache::Result<()> {
//! let cache = Cache::new(CacheConfig::default());
//! cache.handle("CHANNEL_CREATE", br#"{"id":"1","name":"general"}"#, 0)?;
//!
//! let channel = cache.channels().get(Snowflake(1));
//! # Ok(())
//! # }
//! ```

mod flags;
mod pool;
pub mod repository;
mod store;

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use flags::Flags;
pub use pool::{Pool, Reset};
pub use repository::{
    BasicCacheRepo, ChannelRepo, GuildRepo, PresenceRepo, Repository, UserRepo,
};
pub use store::{Store, StoreInner};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::events::feedback::SyntheticEvent;
use crate::events::{Feedback, GatewayEvent, Router};
use crate::models::Cached;

struct CacheInner {
    router: Router,
}

/// Handle to the cache. Cheap to clone; all clones share state.
///
/// The invalidation loop stops once the last handle is dropped.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl Cache {
    /// Build the repositories and start the invalidation loop.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        let (feedback, rx) = Feedback::channel(config.feedback_capacity);
        let inner = Arc::new(CacheInner {
            router: Router::new(&config, feedback),
        });

        tokio::spawn(feedback_loop(Arc::downgrade(&inner), rx));
        info!(
            "Cache initialized (mutable={}, feedback_capacity={})",
            config.mutable, config.feedback_capacity
        );

        Self { inner }
    }

    pub fn users(&self) -> &UserRepo {
        self.inner.router.users()
    }

    pub fn channels(&self) -> &ChannelRepo {
        self.inner.router.channels()
    }

    pub fn guilds(&self) -> &GuildRepo {
        self.inner.router.guilds()
    }

    pub fn presences(&self) -> &PresenceRepo {
        self.inner.router.presences()
    }

    /// Apply one gateway event and return a copy of the primary entity it
    /// touched.
    pub fn handle(&self, name: &str, payload: &[u8], shard_id: u32) -> Result<Option<Cached>> {
        self.handle_with_flags(name, payload, shard_id, Flags::empty())
    }

    pub fn handle_with_flags(
        &self,
        name: &str,
        payload: &[u8],
        shard_id: u32,
        flags: Flags,
    ) -> Result<Option<Cached>> {
        self.inner.router.dispatch(name, payload, shard_id, flags)
    }

    /// Consume events until the sender side closes, one task per event.
    ///
    /// Results are not needed here, so every event runs with
    /// [`Flags::IGNORE_CACHE`]. Failures are logged and the stream goes on.
    pub async fn run(&self, mut events: mpsc::Receiver<GatewayEvent>) {
        let mut tasks = JoinSet::new();
        let mut handled: u64 = 0;

        while let Some(event) = events.recv().await {
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move {
                let result = inner.router.dispatch(
                    &event.name,
                    &event.payload,
                    event.shard_id,
                    Flags::IGNORE_CACHE,
                );
                if let Err(e) = result {
                    warn!("Dropping {} on shard {}: {}", event.name, event.shard_id, e);
                }
            });
            handled += 1;

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    warn!("Event task failed: {}", e);
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!("Event task failed: {}", e);
            }
        }
        info!("Event stream closed after {} events", handled);
    }

    /// Reclaim expired entries in every repository.
    pub fn purge_expired(&self) -> usize {
        let purged = self.users().purge_expired()
            + self.channels().purge_expired()
            + self.guilds().purge_expired()
            + self.presences().purge_expired();
        if purged > 0 {
            debug!("Purged {} expired entries", purged);
        }
        purged
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("router", &self.inner.router)
            .finish()
    }
}

/// Feed synthetic events back into the router.
async fn feedback_loop(cache: Weak<CacheInner>, mut rx: mpsc::Receiver<SyntheticEvent>) {
    debug!("Invalidation loop started");

    while let Some(event) = rx.recv().await {
        let Some(inner) = cache.upgrade() else {
            break;
        };
        if let Err(e) = inner.router.dispatch_synthetic(&event) {
            warn!("Failed to apply synthetic {}: {}", event.kind, e);
        }
    }

    info!("Invalidation loop stopped");
}
