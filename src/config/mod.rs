//! Cache configuration.
//!
//! Built in code with the builder methods, or loaded from environment
//! variables with [`CacheConfig::from_env`].

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::utils::{parse_bool, parse_duration};

/// Configuration for one entity repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Skip this repository entirely: events are not applied and `get`
    /// always misses.
    pub disabled: bool,

    /// Maximum number of entries. 0 means unbounded.
    pub max_entries: usize,

    /// Entries older than this (since their last write) count as misses.
    pub lifetime: Option<Duration>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            max_entries: 10_000,
            lifetime: None,
        }
    }
}

impl RepoConfig {
    /// Create a new repository config with the given max entries.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    /// Set max entries (builder pattern).
    #[must_use]
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the entry lifetime.
    #[must_use]
    pub fn lifetime(mut self, duration: Duration) -> Self {
        self.lifetime = Some(duration);
        self
    }

    /// Entries never expire based on time.
    #[must_use]
    pub fn no_lifetime(mut self) -> Self {
        self.lifetime = None;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Users: churn through member lists, refreshed hourly.
    pub fn users() -> Self {
        Self::with_capacity(10_000).lifetime(Duration::from_secs(3600))
    }

    /// Channels: kept until deleted or evicted.
    pub fn channels() -> Self {
        Self::with_capacity(10_000)
    }

    /// Guilds: few and long lived.
    pub fn guilds() -> Self {
        Self::with_capacity(1_000)
    }

    /// Presences: hot and short lived.
    pub fn presences() -> Self {
        Self::with_capacity(10_000).lifetime(Duration::from_secs(600))
    }

    /// Apply the `DISABLE_<NAME>_CACHING`, `<NAME>_CACHE_MAX_ENTRIES` and
    /// `<NAME>_CACHE_LIFETIME` variables on top of `self`.
    fn overlay(mut self, name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        if let Some(disabled) = read(lookup, &format!("DISABLE_{name}_CACHING"), parse_bool) {
            self.disabled = disabled;
        }
        if let Some(max) = read(lookup, &format!("{name}_CACHE_MAX_ENTRIES"), |v| {
            v.trim().parse::<usize>().ok()
        }) {
            self.max_entries = max;
        }
        let key = format!("{name}_CACHE_LIFETIME");
        match lookup(&key).as_deref().map(str::trim) {
            None => {}
            Some("" | "0" | "none") => self.lifetime = None,
            Some(value) => match parse_duration(value) {
                Some(duration) => self.lifetime = Some(duration),
                None => warn!("Invalid {}={:?}, using default", key, value),
            },
        }
        self
    }
}

/// Configuration for the whole cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub users: RepoConfig,
    pub channels: RepoConfig,
    pub guilds: RepoConfig,
    pub presences: RepoConfig,

    /// Enable shared snapshots through `get_shared`.
    pub mutable: bool,

    /// Bound of the invalidation queue.
    pub feedback_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            users: RepoConfig::users(),
            channels: RepoConfig::channels(),
            guilds: RepoConfig::guilds(),
            presences: RepoConfig::presences(),
            mutable: false,
            feedback_capacity: 1024,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    #[must_use]
    pub fn feedback_capacity(mut self, capacity: usize) -> Self {
        self.feedback_capacity = capacity;
        self
    }

    /// Everything unbounded and never expiring. Useful for replays.
    pub fn unbounded() -> Self {
        let repo = RepoConfig::with_capacity(0);
        Self {
            users: repo.clone(),
            channels: repo.clone(),
            guilds: repo.clone(),
            presences: repo,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `.env` first. Missing variables keep their defaults, and
    /// invalid ones are logged and ignored.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mutable = read(&lookup, "CACHE_MUTABLE", parse_bool).unwrap_or(defaults.mutable);
        let feedback_capacity = read(&lookup, "CACHE_FEEDBACK_CAPACITY", |v| {
            v.trim().parse::<usize>().ok().filter(|n| *n > 0)
        })
        .unwrap_or(defaults.feedback_capacity);

        Self {
            users: defaults.users.overlay("USER", &lookup),
            channels: defaults.channels.overlay("CHANNEL", &lookup),
            guilds: defaults.guilds.overlay("GUILD", &lookup),
            presences: defaults.presences.overlay("PRESENCE", &lookup),
            mutable,
            feedback_capacity,
        }
    }
}

/// Read and parse one variable, warning when it is set but unusable.
fn read<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let value = lookup(key)?;
    let parsed = parse(&value);
    if parsed.is_none() {
        warn!("Invalid {}={:?}, using default", key, value);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> CacheConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CacheConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.users.max_entries, 10_000);
        assert_eq!(config.users.lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(config.channels.lifetime, None);
        assert_eq!(config.guilds.max_entries, 1_000);
        assert_eq!(config.presences.lifetime, Some(Duration::from_secs(600)));
        assert_eq!(config.feedback_capacity, 1024);
        assert!(!config.mutable);

        assert_eq!(load(&[]), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            ("DISABLE_PRESENCE_CACHING", "true"),
            ("USER_CACHE_MAX_ENTRIES", "50"),
            ("USER_CACHE_LIFETIME", "30s"),
            ("CHANNEL_CACHE_LIFETIME", "1d"),
            ("GUILD_CACHE_MAX_ENTRIES", "0"),
            ("CACHE_MUTABLE", "1"),
            ("CACHE_FEEDBACK_CAPACITY", "16"),
        ]);

        assert!(config.presences.disabled);
        assert_eq!(config.users.max_entries, 50);
        assert_eq!(config.users.lifetime, Some(Duration::from_secs(30)));
        assert_eq!(config.channels.lifetime, Some(Duration::from_secs(86400)));
        assert_eq!(config.guilds.max_entries, 0);
        assert!(config.mutable);
        assert_eq!(config.feedback_capacity, 16);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("USER_CACHE_MAX_ENTRIES", "lots"),
            ("USER_CACHE_LIFETIME", "forever"),
            ("DISABLE_GUILD_CACHING", "maybe"),
            ("CACHE_FEEDBACK_CAPACITY", "0"),
        ]);

        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_lifetime_can_be_cleared() {
        let config = load(&[("PRESENCE_CACHE_LIFETIME", "none")]);
        assert_eq!(config.presences.lifetime, None);
    }

    #[test]
    fn test_builders() {
        let repo = RepoConfig::with_capacity(5)
            .lifetime(Duration::from_secs(1))
            .no_lifetime()
            .max_entries(7);
        assert_eq!(repo.max_entries, 7);
        assert_eq!(repo.lifetime, None);
        assert!(RepoConfig::default().disabled().disabled);

        let config = CacheConfig::unbounded().mutable(true).feedback_capacity(8);
        assert_eq!(config.guilds.max_entries, 0);
        assert!(config.mutable);
        assert_eq!(config.feedback_capacity, 8);
    }
}
