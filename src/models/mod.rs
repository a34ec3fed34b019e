//! Cached entity models.
//!
//! Each entity has two shapes:
//! - the canonical record (`User`, `Channel`, ...) owned by a repository
//! - a crate-private `*Patch` that deserializes only the fields a gateway
//!   payload actually carried, so updates can merge per field

mod channel;
mod guild;
pub(crate) mod payload;
mod presence;
mod snowflake;
mod user;

pub use channel::Channel;
pub(crate) use channel::{ChannelPatch, PinsPatch};
pub use guild::{Guild, Role};
pub(crate) use guild::{GuildPatch, RoleDeletePatch, RolePatch};
pub use presence::{Activity, ClientStatus, Presence};
pub(crate) use presence::PresencePatch;
pub use snowflake::Snowflake;
pub use user::User;
pub(crate) use user::UserPatch;

use crate::cache::Reset;

/// The kinds of entity the cache mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Channel,
    Guild,
    Presence,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Channel => "channel",
            Self::Guild => "guild",
            Self::Presence => "presence",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cacheable record.
///
/// Values only cross a repository boundary through [`Entity::copy_into`], so
/// nothing outside the repository can reach the canonical instance.
pub trait Entity: Clone + Default + PartialEq + Reset + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Snowflake;

    fn set_id(&mut self, id: Snowflake);

    /// An entity that is known by id only.
    fn is_partial(&self) -> bool {
        let mut stub = Self::default();
        stub.set_id(self.id());
        *self == stub
    }

    /// Deep-copy every field into `dst`, reusing its allocations.
    fn copy_into(&self, dst: &mut Self);

    fn into_cached(self) -> Cached;
}

/// A copy handed out by an update, tagged with its entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached {
    User(User),
    Channel(Channel),
    Guild(Guild),
    Presence(Presence),
}

impl Cached {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Channel(_) => EntityKind::Channel,
            Self::Guild(_) => EntityKind::Guild,
            Self::Presence(_) => EntityKind::Presence,
        }
    }

    pub fn id(&self) -> Snowflake {
        match self {
            Self::User(u) => u.id,
            Self::Channel(c) => c.id,
            Self::Guild(g) => g.id,
            Self::Presence(p) => p.user_id,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn into_channel(self) -> Option<Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_guild(self) -> Option<Guild> {
        match self {
            Self::Guild(g) => Some(g),
            _ => None,
        }
    }

    pub fn into_presence(self) -> Option<Presence> {
        match self {
            Self::Presence(p) => Some(p),
            _ => None,
        }
    }
}
