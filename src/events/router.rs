//! Event demultiplexer.
//!
//! Maps each [`EventKind`] to the repositories that apply it. The first
//! repository listed is primary and its result is what the caller gets.
//! The rest run with [`Flags::IGNORE_CACHE`] and their failures are only
//! logged.

use std::time::Instant;

use tracing::{debug, instrument, trace, warn};

use super::feedback::SyntheticEvent;
use super::{EventKind, Feedback};
use crate::cache::repository::{Demultiplex, UpdateCtx};
use crate::cache::{ChannelRepo, Flags, GuildRepo, PresenceRepo, UserRepo};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{Cached, EntityKind};

/// Repositories that apply `kind`, primary first.
pub fn routes(kind: EventKind) -> &'static [EntityKind] {
    use EntityKind::*;

    match kind {
        EventKind::Ready => &[User, Guild],
        EventKind::UserUpdate => &[User],
        EventKind::GuildCreate => &[Guild, Channel, Presence, User],
        EventKind::GuildUpdate
        | EventKind::GuildDelete
        | EventKind::GuildRoleCreate
        | EventKind::GuildRoleUpdate
        | EventKind::GuildRoleDelete => &[Guild],
        EventKind::GuildMemberAdd
        | EventKind::GuildMemberUpdate
        | EventKind::GuildMembersChunk => &[User],
        EventKind::ChannelCreate | EventKind::ChannelUpdate | EventKind::ChannelDelete => {
            &[Channel, Guild]
        }
        EventKind::ChannelPinsUpdate => &[Channel],
        EventKind::MessageCreate => &[User, Channel],
        EventKind::PresenceUpdate => &[Presence, User, Guild],
        EventKind::PresenceRemove => &[Presence],
    }
}

/// Owns the four repositories and the sending half of the invalidation
/// channel.
#[derive(Debug)]
pub struct Router {
    users: UserRepo,
    channels: ChannelRepo,
    guilds: GuildRepo,
    presences: PresenceRepo,
    feedback: Feedback,
}

impl Router {
    pub fn new(config: &CacheConfig, feedback: Feedback) -> Self {
        Self {
            users: UserRepo::new(&config.users, config.mutable),
            channels: ChannelRepo::new(&config.channels, config.mutable),
            guilds: GuildRepo::new(&config.guilds, config.mutable),
            presences: PresenceRepo::new(&config.presences, config.mutable),
            feedback,
        }
    }

    pub fn users(&self) -> &UserRepo {
        &self.users
    }

    pub fn channels(&self) -> &ChannelRepo {
        &self.channels
    }

    pub fn guilds(&self) -> &GuildRepo {
        &self.guilds
    }

    pub fn presences(&self) -> &PresenceRepo {
        &self.presences
    }

    fn repository(&self, kind: EntityKind) -> Option<&dyn Demultiplex> {
        match kind {
            EntityKind::User => self.users.is_enabled().then_some(&self.users as &dyn Demultiplex),
            EntityKind::Channel => self
                .channels
                .is_enabled()
                .then_some(&self.channels as &dyn Demultiplex),
            EntityKind::Guild => self.guilds.is_enabled().then_some(&self.guilds as &dyn Demultiplex),
            EntityKind::Presence => self
                .presences
                .is_enabled()
                .then_some(&self.presences as &dyn Demultiplex),
        }
    }

    /// Apply one raw gateway event. Unknown names, and names of events only
    /// the cache itself produces, are ignored.
    pub fn dispatch(
        &self,
        name: &str,
        payload: &[u8],
        shard_id: u32,
        flags: Flags,
    ) -> Result<Option<Cached>> {
        match EventKind::from_name(name) {
            Some(kind) => self.dispatch_kind(kind, payload, shard_id, flags),
            None => {
                trace!("Ignoring uncached event {}", name);
                Ok(None)
            }
        }
    }

    /// Apply one event of a known kind.
    pub fn dispatch_kind(
        &self,
        kind: EventKind,
        payload: &[u8],
        shard_id: u32,
        flags: Flags,
    ) -> Result<Option<Cached>> {
        self.route(kind, payload, shard_id, flags, None)
    }

    /// Apply a cascade delete read back from the invalidation channel.
    pub(crate) fn dispatch_synthetic(&self, event: &SyntheticEvent) -> Result<Option<Cached>> {
        self.route(
            event.kind,
            &event.payload,
            event.shard_id,
            Flags::IGNORE_CACHE,
            Some(event.removed_at),
        )
    }

    #[instrument(level = "debug", skip(self, payload), fields(len = payload.len()))]
    fn route(
        &self,
        kind: EventKind,
        payload: &[u8],
        shard_id: u32,
        flags: Flags,
        cascade: Option<Instant>,
    ) -> Result<Option<Cached>> {
        let ctx = UpdateCtx {
            feedback: &self.feedback,
            shard_id,
            cascade,
        };

        let (primary, secondary) = match routes(kind).split_first() {
            Some(split) => split,
            None => return Ok(None),
        };

        let result = match self.repository(*primary) {
            Some(repo) => repo.update(&ctx, kind, payload, flags)?,
            None => {
                debug!("{} repository disabled, skipping {}", primary, kind);
                None
            }
        };

        for entity in secondary {
            let Some(repo) = self.repository(*entity) else {
                continue;
            };
            if let Err(e) = repo.update(&ctx, kind, payload, flags | Flags::IGNORE_CACHE) {
                warn!("{} repository failed to apply {}: {}", entity, kind, e);
            }
        }

        Ok(result)
    }
}
