//! Guild model with its derived child indexes.

use serde::{Deserialize, Serialize};

use super::payload::{Ident, merge, nullable};
use super::{Cached, Entity, EntityKind, Snowflake};
use crate::cache::{Flags, Reset};

/// A guild role. Always delivered whole, so it has no patch form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    /// Permission bit set, as the decimal string the gateway sends.
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

/// A guild.
///
/// `channel_ids` and `presence_ids` are derived indexes. They are replaced
/// from embedded lists on create/update and kept current by channel and
/// presence events, always under the guild store's lock. An id listed here
/// may already have been evicted from its own store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Snowflake,
    pub region: String,
    pub afk_channel_id: Option<Snowflake>,
    pub afk_timeout: u32,
    pub verification_level: u8,
    pub member_count: u64,
    pub large: bool,
    /// Set during an outage. Does not count as data for partial checks.
    pub unavailable: bool,
    pub roles: Vec<Role>,
    pub channel_ids: Vec<Snowflake>,
    /// User ids with a presence recorded for this guild.
    pub presence_ids: Vec<Snowflake>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PresenceUser {
    pub user: Ident,
}

/// Fields present in a guild payload.
///
/// Embedded children are read down to their ids only.
#[derive(Debug, Deserialize)]
pub(crate) struct GuildPatch {
    pub id: Snowflake,
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    icon: Option<Option<String>>,
    owner_id: Option<Snowflake>,
    region: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    afk_channel_id: Option<Option<Snowflake>>,
    afk_timeout: Option<u32>,
    verification_level: Option<u8>,
    member_count: Option<u64>,
    large: Option<bool>,
    pub unavailable: Option<bool>,
    roles: Option<Vec<Role>>,
    channels: Option<Vec<Ident>>,
    presences: Option<Vec<PresenceUser>>,
}

/// `GUILD_ROLE_CREATE` / `GUILD_ROLE_UPDATE` payload.
#[derive(Debug, Deserialize)]
pub(crate) struct RolePatch {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// `GUILD_ROLE_DELETE` payload.
#[derive(Debug, Deserialize)]
pub(crate) struct RoleDeletePatch {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

impl Guild {
    /// Merge the fields present in `patch`, replacing derived indexes when
    /// the payload embedded the child lists.
    pub(crate) fn apply(&mut self, patch: GuildPatch, flags: Flags) {
        self.id = patch.id;
        merge(&mut self.name, patch.name, flags);
        merge(&mut self.icon, patch.icon, flags);
        merge(&mut self.owner_id, patch.owner_id, flags);
        merge(&mut self.region, patch.region, flags);
        merge(&mut self.afk_channel_id, patch.afk_channel_id, flags);
        merge(&mut self.afk_timeout, patch.afk_timeout, flags);
        merge(&mut self.verification_level, patch.verification_level, flags);
        merge(&mut self.member_count, patch.member_count, flags);
        merge(&mut self.large, patch.large, flags);
        // An update without the flag means the guild is reachable again.
        self.unavailable = patch.unavailable.unwrap_or(false);

        if let Some(roles) = patch.roles {
            self.roles = roles;
        }
        if let Some(channels) = patch.channels {
            self.channel_ids.clear();
            self.channel_ids.extend(channels.into_iter().map(|c| c.id));
        }
        if let Some(presences) = patch.presences {
            self.presence_ids.clear();
            self.presence_ids
                .extend(presences.into_iter().map(|p| p.user.id));
        }
    }

    /// Insert or replace a role.
    pub(crate) fn upsert_role(&mut self, role: Role) {
        match self.roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => self.roles.push(role),
        }
    }

    pub(crate) fn remove_role(&mut self, role_id: Snowflake) -> bool {
        let before = self.roles.len();
        self.roles.retain(|r| r.id != role_id);
        before != self.roles.len()
    }

    pub(crate) fn link_channel(&mut self, channel_id: Snowflake) {
        if !self.channel_ids.contains(&channel_id) {
            self.channel_ids.push(channel_id);
        }
    }

    pub(crate) fn unlink_channel(&mut self, channel_id: Snowflake) {
        self.channel_ids.retain(|id| *id != channel_id);
    }

    pub(crate) fn link_presence(&mut self, user_id: Snowflake) {
        if !self.presence_ids.contains(&user_id) {
            self.presence_ids.push(user_id);
        }
    }

    /// Find a role by id.
    pub fn role(&self, role_id: Snowflake) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }
}

impl Reset for Guild {
    fn reset(&mut self) {
        self.id = Snowflake::default();
        self.name.clear();
        self.icon = None;
        self.owner_id = Snowflake::default();
        self.region.clear();
        self.afk_channel_id = None;
        self.afk_timeout = 0;
        self.verification_level = 0;
        self.member_count = 0;
        self.large = false;
        self.unavailable = false;
        self.roles.clear();
        self.channel_ids.clear();
        self.presence_ids.clear();
    }
}

impl Entity for Guild {
    const KIND: EntityKind = EntityKind::Guild;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn set_id(&mut self, id: Snowflake) {
        self.id = id;
    }

    fn is_partial(&self) -> bool {
        let stub = Guild {
            id: self.id,
            unavailable: self.unavailable,
            ..Default::default()
        };
        *self == stub
    }

    fn copy_into(&self, dst: &mut Self) {
        dst.id = self.id;
        dst.name.clone_from(&self.name);
        dst.icon.clone_from(&self.icon);
        dst.owner_id = self.owner_id;
        dst.region.clone_from(&self.region);
        dst.afk_channel_id = self.afk_channel_id;
        dst.afk_timeout = self.afk_timeout;
        dst.verification_level = self.verification_level;
        dst.member_count = self.member_count;
        dst.large = self.large;
        dst.unavailable = self.unavailable;
        dst.roles.clone_from(&self.roles);
        dst.channel_ids.clone_from(&self.channel_ids);
        dst.presence_ids.clone_from(&self.presence_ids);
    }

    fn into_cached(self) -> Cached {
        Cached::Guild(self)
    }
}
