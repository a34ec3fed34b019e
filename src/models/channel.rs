//! Channel model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{Ident, merge, nullable};
use super::{Cached, Entity, EntityKind, Snowflake};
use crate::cache::{Flags, Reset};

/// A guild or private channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Channel {
    pub id: Snowflake,
    /// Raw channel type (text, DM, voice, category, ...).
    pub kind: u8,
    pub guild_id: Option<Snowflake>,
    pub position: i32,
    pub name: String,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub last_message_id: Option<Snowflake>,
    pub last_pin_timestamp: Option<DateTime<Utc>>,
    pub bitrate: u32,
    pub user_limit: u32,
    pub rate_limit_per_user: u32,
    pub parent_id: Option<Snowflake>,
    /// Recipients of a private channel.
    pub recipient_ids: Vec<Snowflake>,
}

/// Fields present in a channel payload.
#[derive(Debug, Deserialize)]
pub(crate) struct ChannelPatch {
    pub id: Snowflake,
    #[serde(rename = "type")]
    kind: Option<u8>,
    pub guild_id: Option<Snowflake>,
    position: Option<i32>,
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    topic: Option<Option<String>>,
    nsfw: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    last_message_id: Option<Option<Snowflake>>,
    #[serde(default, deserialize_with = "nullable")]
    last_pin_timestamp: Option<Option<DateTime<Utc>>>,
    bitrate: Option<u32>,
    user_limit: Option<u32>,
    rate_limit_per_user: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    parent_id: Option<Option<Snowflake>>,
    recipients: Option<Vec<Ident>>,
}

/// `CHANNEL_PINS_UPDATE` payload.
#[derive(Debug, Deserialize)]
pub(crate) struct PinsPatch {
    pub channel_id: Snowflake,
    #[serde(default, deserialize_with = "nullable")]
    pub last_pin_timestamp: Option<Option<DateTime<Utc>>>,
}

impl Channel {
    /// Merge the fields present in `patch`.
    pub(crate) fn apply(&mut self, patch: ChannelPatch, flags: Flags) {
        self.id = patch.id;
        merge(&mut self.kind, patch.kind, flags);
        merge(&mut self.guild_id, patch.guild_id.map(Some), flags);
        merge(&mut self.position, patch.position, flags);
        merge(&mut self.name, patch.name, flags);
        merge(&mut self.topic, patch.topic, flags);
        merge(&mut self.nsfw, patch.nsfw, flags);
        merge(&mut self.last_message_id, patch.last_message_id, flags);
        merge(&mut self.last_pin_timestamp, patch.last_pin_timestamp, flags);
        merge(&mut self.bitrate, patch.bitrate, flags);
        merge(&mut self.user_limit, patch.user_limit, flags);
        merge(&mut self.rate_limit_per_user, patch.rate_limit_per_user, flags);
        merge(&mut self.parent_id, patch.parent_id, flags);

        if let Some(recipients) = patch.recipients {
            self.recipient_ids.clear();
            self.recipient_ids.extend(recipients.into_iter().map(|r| r.id));
        }
    }

    /// Whether the channel belongs to a guild.
    pub fn is_guild_channel(&self) -> bool {
        self.guild_id.is_some()
    }
}

impl Reset for Channel {
    fn reset(&mut self) {
        self.id = Snowflake::default();
        self.kind = 0;
        self.guild_id = None;
        self.position = 0;
        self.name.clear();
        self.topic = None;
        self.nsfw = false;
        self.last_message_id = None;
        self.last_pin_timestamp = None;
        self.bitrate = 0;
        self.user_limit = 0;
        self.rate_limit_per_user = 0;
        self.parent_id = None;
        self.recipient_ids.clear();
    }
}

impl Entity for Channel {
    const KIND: EntityKind = EntityKind::Channel;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn set_id(&mut self, id: Snowflake) {
        self.id = id;
    }

    fn copy_into(&self, dst: &mut Self) {
        dst.id = self.id;
        dst.kind = self.kind;
        dst.guild_id = self.guild_id;
        dst.position = self.position;
        dst.name.clone_from(&self.name);
        dst.topic.clone_from(&self.topic);
        dst.nsfw = self.nsfw;
        dst.last_message_id = self.last_message_id;
        dst.last_pin_timestamp = self.last_pin_timestamp;
        dst.bitrate = self.bitrate;
        dst.user_limit = self.user_limit;
        dst.rate_limit_per_user = self.rate_limit_per_user;
        dst.parent_id = self.parent_id;
        dst.recipient_ids.clone_from(&self.recipient_ids);
    }

    fn into_cached(self) -> Cached {
        Cached::Channel(self)
    }
}
