//! Presence event handling.

use serde::Deserialize;
use tracing::debug;

use super::{Apply, Demultiplex, PresenceRepo, UpdateCtx};
use crate::cache::Flags;
use crate::error::{CacheError, Result};
use crate::events::EventKind;
use crate::models::payload::Ident;
use crate::models::{Cached, Entity, Presence, PresencePatch, Snowflake};

#[derive(Deserialize)]
struct GuildPresences {
    id: Snowflake,
    #[serde(default)]
    presences: Vec<PresencePatch>,
}

/// Synthetic removal queued by a guild delete.
#[derive(Deserialize)]
struct PresenceRemoval {
    user: Ident,
    guild_id: Snowflake,
}

impl PresenceRepo {
    fn apply_patch(&self, patch: PresencePatch, flags: Flags) -> Option<Presence> {
        let id = patch.user.id;
        self.upsert(id, Apply::Merge, flags, |presence| presence.apply(patch, flags))
    }
}

impl Demultiplex for PresenceRepo {
    fn update(
        &self,
        ctx: &UpdateCtx<'_>,
        event: EventKind,
        payload: &[u8],
        flags: Flags,
    ) -> Result<Option<Cached>> {
        let malformed = CacheError::malformed(event);

        let presence = match event {
            EventKind::PresenceUpdate => {
                let patch: PresencePatch = serde_json::from_slice(payload).map_err(malformed)?;
                self.apply_patch(patch, flags)
            }
            EventKind::GuildCreate => {
                let guild: GuildPresences = serde_json::from_slice(payload).map_err(malformed)?;
                let count = guild.presences.len();
                for mut patch in guild.presences {
                    patch.guild_id = Some(guild.id);
                    self.apply_patch(patch, flags | Flags::IGNORE_CACHE);
                }
                debug!("Cached {} presences for guild {}", count, guild.id);
                None
            }
            EventKind::PresenceRemove => {
                let removal: PresenceRemoval =
                    serde_json::from_slice(payload).map_err(malformed)?;
                // The user may have been reported from another guild since,
                // or from the same guild after it came back.
                let removed = self.remove_if(removal.user.id, ctx.cascade, |presence| {
                    presence.guild_id == Some(removal.guild_id)
                });
                if removed {
                    debug!(
                        "Removed presence of {} with guild {}",
                        removal.user.id, removal.guild_id
                    );
                }
                None
            }
            _ => None,
        };

        Ok(presence.map(Entity::into_cached))
    }
}
