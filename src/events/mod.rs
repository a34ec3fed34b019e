//! Gateway event vocabulary and routing.
//!
//! To cache a new event:
//! 1. Add a variant to [`EventKind`] with its gateway name
//! 2. Add its repositories to the table in `router::routes`
//! 3. Handle the kind in each listed repository's `update`

pub mod feedback;
pub mod router;

use std::fmt;

pub use feedback::Feedback;
pub use router::Router;

/// Every event name the cache understands.
///
/// Names outside this set carry no cacheable state and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    UserUpdate,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMembersChunk,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    ChannelPinsUpdate,
    MessageCreate,
    PresenceUpdate,
    /// Synthesized by the cache when a guild goes away.
    PresenceRemove,
}

impl EventKind {
    pub const ALL: [EventKind; 18] = [
        Self::Ready,
        Self::UserUpdate,
        Self::GuildCreate,
        Self::GuildUpdate,
        Self::GuildDelete,
        Self::GuildRoleCreate,
        Self::GuildRoleUpdate,
        Self::GuildRoleDelete,
        Self::GuildMemberAdd,
        Self::GuildMemberUpdate,
        Self::GuildMembersChunk,
        Self::ChannelCreate,
        Self::ChannelUpdate,
        Self::ChannelDelete,
        Self::ChannelPinsUpdate,
        Self::MessageCreate,
        Self::PresenceUpdate,
        Self::PresenceRemove,
    ];

    /// Gateway dispatch name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::UserUpdate => "USER_UPDATE",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::PresenceRemove => "PRESENCE_REMOVE",
        }
    }

    /// Kinds only the cache emits, on its invalidation channel.
    pub fn is_synthetic(self) -> bool {
        matches!(self, Self::PresenceRemove)
    }

    /// Look up a gateway dispatch name. Synthetic kinds are never matched.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter(|kind| !kind.is_synthetic())
            .find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatch record handed over by the transport.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub name: String,
    /// JSON-encoded `d` field of the dispatch.
    pub payload: Vec<u8>,
    pub shard_id: u32,
}

impl GatewayEvent {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>, shard_id: u32) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            shard_id,
        }
    }
}
