//! gateway-cache - in-memory mirror of chat gateway state.
//!
//! Keeps guilds, channels, users and presences current from a stream of
//! gateway dispatch events.
//!
//! ## Architecture
//!
//! - `models` - Entity records and their payload patches
//! - `cache` - LFU stores, object pools and per-entity repositories
//! - `events` - Event routing and the cascading invalidation channel
//! - `config` - Environment configuration
//! - `error` - Error types
//! - `utils` - Utility functions

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod utils;

pub use cache::{
    BasicCacheRepo, Cache, ChannelRepo, Flags, GuildRepo, Pool, PresenceRepo, Reset, UserRepo,
};
pub use config::{CacheConfig, RepoConfig};
pub use error::{CacheError, Result};
pub use events::{EventKind, GatewayEvent};
pub use models::{
    Activity, Cached, Channel, ClientStatus, Entity, EntityKind, Guild, Presence, Role, Snowflake,
    User,
};
