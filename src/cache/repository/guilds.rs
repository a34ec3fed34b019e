//! Guild event handling and cascading invalidation.
//!
//! Deleting a guild never calls into the channel or presence repositories.
//! It reads the guild's derived indexes and queues one synthetic delete per
//! dependent on the invalidation channel.

use std::time::Instant;

use serde::Deserialize;
use tracing::debug;

use super::{Apply, Demultiplex, GuildRepo, UpdateCtx};
use crate::cache::Flags;
use crate::error::{CacheError, Result};
use crate::events::EventKind;
use crate::events::feedback::SyntheticEvent;
use crate::models::payload::Ident;
use crate::models::{Cached, Entity, Guild, GuildPatch, RoleDeletePatch, RolePatch, Snowflake};

#[derive(Deserialize)]
struct UnavailableGuild {
    id: Snowflake,
    #[serde(default)]
    unavailable: bool,
}

#[derive(Deserialize)]
struct ReadyGuilds {
    #[serde(default)]
    guilds: Vec<UnavailableGuild>,
}

/// A child event that names its guild.
#[derive(Deserialize)]
struct ChannelLink {
    id: Snowflake,
    guild_id: Option<Snowflake>,
}

#[derive(Deserialize)]
struct PresenceLink {
    user: Ident,
    guild_id: Option<Snowflake>,
}

impl GuildRepo {
    fn apply_patch(&self, patch: GuildPatch, mode: Apply, flags: Flags) -> Option<Guild> {
        let id = patch.id;
        self.upsert(id, mode, flags, |guild| guild.apply(patch, flags))
    }

    /// Record the guilds listed in `READY`. They stay partial until their
    /// `GUILD_CREATE` arrives.
    fn apply_ready(&self, ready: ReadyGuilds) {
        for stub in ready.guilds {
            let displaced = {
                let mut store = self.store.write();
                match store.get_mut(stub.id) {
                    Some(guild) => {
                        guild.unavailable = true;
                        None
                    }
                    None => {
                        let mut guild = self.pool.get();
                        guild.set_id(stub.id);
                        guild.unavailable = stub.unavailable;
                        store.set(stub.id, guild)
                    }
                }
            };
            if let Some(value) = displaced {
                self.recycle(value);
            }
        }
    }

    /// Remove a guild and queue deletes for everything indexed under it.
    fn delete_guild(&self, ctx: &UpdateCtx<'_>, id: Snowflake, flags: Flags) -> Option<Guild> {
        // taken before removal so a re-created guild's children postdate it
        let removed_at = Instant::now();
        let (guild, live) = self.take(id)?;

        let mut cascade = Vec::with_capacity(guild.channel_ids.len() + guild.presence_ids.len());
        cascade.extend(
            guild
                .channel_ids
                .iter()
                .map(|channel_id| {
                    SyntheticEvent::channel_delete(*channel_id, id, ctx.shard_id, removed_at)
                }),
        );
        cascade.extend(
            guild
                .presence_ids
                .iter()
                .map(|user_id| {
                    SyntheticEvent::presence_remove(*user_id, id, ctx.shard_id, removed_at)
                }),
        );

        debug!(
            "Deleted guild {}, cascading to {} channels and {} presences",
            id,
            guild.channel_ids.len(),
            guild.presence_ids.len()
        );
        ctx.feedback.emit(cascade);

        if !live || flags.contains(Flags::IGNORE_CACHE) {
            self.pool().put(guild);
            return None;
        }
        Some(guild)
    }
}

impl Demultiplex for GuildRepo {
    fn update(
        &self,
        ctx: &UpdateCtx<'_>,
        event: EventKind,
        payload: &[u8],
        flags: Flags,
    ) -> Result<Option<Cached>> {
        let malformed = CacheError::malformed(event);

        let guild = match event {
            EventKind::Ready => {
                let ready: ReadyGuilds = serde_json::from_slice(payload).map_err(malformed)?;
                self.apply_ready(ready);
                None
            }
            EventKind::GuildCreate | EventKind::GuildUpdate => {
                let patch: GuildPatch = serde_json::from_slice(payload).map_err(malformed)?;
                let mode = if event == EventKind::GuildCreate {
                    Apply::Replace
                } else {
                    Apply::Merge
                };
                self.apply_patch(patch, mode, flags)
            }
            EventKind::GuildDelete => {
                let stub: UnavailableGuild = serde_json::from_slice(payload).map_err(malformed)?;
                if stub.unavailable {
                    // Outage: keep the guild and its children around.
                    self.modify(stub.id, flags, |guild| guild.unavailable = true)
                } else {
                    self.delete_guild(ctx, stub.id, flags)
                }
            }
            EventKind::GuildRoleCreate | EventKind::GuildRoleUpdate => {
                let patch: RolePatch = serde_json::from_slice(payload).map_err(malformed)?;
                self.modify(patch.guild_id, flags, |guild| guild.upsert_role(patch.role))
            }
            EventKind::GuildRoleDelete => {
                let patch: RoleDeletePatch = serde_json::from_slice(payload).map_err(malformed)?;
                self.modify(patch.guild_id, flags, |guild| {
                    guild.remove_role(patch.role_id);
                })
            }
            // cascade deletes come from a guild that is already gone
            EventKind::ChannelDelete if ctx.cascade.is_some() => None,
            EventKind::ChannelCreate | EventKind::ChannelUpdate | EventKind::ChannelDelete => {
                let link: ChannelLink = serde_json::from_slice(payload).map_err(malformed)?;
                match link.guild_id {
                    Some(guild_id) => self.modify(guild_id, flags, |guild| {
                        if event == EventKind::ChannelDelete {
                            guild.unlink_channel(link.id);
                        } else {
                            guild.link_channel(link.id);
                        }
                    }),
                    None => None,
                }
            }
            EventKind::PresenceUpdate => {
                let link: PresenceLink = serde_json::from_slice(payload).map_err(malformed)?;
                match link.guild_id {
                    Some(guild_id) => self.modify(guild_id, flags, |guild| {
                        guild.link_presence(link.user.id);
                    }),
                    None => None,
                }
            }
            _ => None,
        };

        Ok(guild.map(Entity::into_cached))
    }
}
