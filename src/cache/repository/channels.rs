//! Channel event handling.

use serde::Deserialize;
use tracing::debug;

use super::{Apply, ChannelRepo, Demultiplex, UpdateCtx};
use crate::cache::Flags;
use crate::error::{CacheError, Result};
use crate::events::EventKind;
use crate::models::payload::Ident;
use crate::models::{Cached, Channel, ChannelPatch, Entity, PinsPatch, Snowflake};

/// The part of `MESSAGE_CREATE` a channel cares about.
#[derive(Deserialize)]
struct MessageRef {
    id: Snowflake,
    channel_id: Snowflake,
}

/// Channels embedded in `GUILD_CREATE`, which omit their `guild_id`.
#[derive(Deserialize)]
struct GuildChannels {
    id: Snowflake,
    #[serde(default)]
    channels: Vec<ChannelPatch>,
}

impl ChannelRepo {
    fn apply_patch(&self, patch: ChannelPatch, mode: Apply, flags: Flags) -> Option<Channel> {
        let id = patch.id;
        self.upsert(id, mode, flags, |channel| channel.apply(patch, flags))
    }
}

impl Demultiplex for ChannelRepo {
    fn update(
        &self,
        ctx: &UpdateCtx<'_>,
        event: EventKind,
        payload: &[u8],
        flags: Flags,
    ) -> Result<Option<Cached>> {
        let channel = match event {
            EventKind::ChannelCreate | EventKind::ChannelUpdate => {
                let patch: ChannelPatch =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                let mode = if event == EventKind::ChannelCreate {
                    Apply::Replace
                } else {
                    Apply::Merge
                };
                self.apply_patch(patch, mode, flags)
            }
            EventKind::ChannelDelete => {
                let ident: Ident =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                match ctx.cascade {
                    // a channel recreated since its guild went away stays
                    Some(removed_at) => {
                        let removed = self.remove_if(ident.id, Some(removed_at), |_| true);
                        debug!("Cascade delete of channel {}: removed={}", ident.id, removed);
                        None
                    }
                    None => {
                        debug!("Deleting channel {}", ident.id);
                        self.remove(ident.id, flags)
                    }
                }
            }
            EventKind::ChannelPinsUpdate => {
                let pins: PinsPatch =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                let pinned = pins.last_pin_timestamp;
                self.modify(pins.channel_id, flags, |channel| {
                    if let Some(timestamp) = pinned {
                        channel.last_pin_timestamp = timestamp;
                    }
                })
            }
            EventKind::MessageCreate => {
                let message: MessageRef =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                self.modify(message.channel_id, flags, |channel| {
                    channel.last_message_id = Some(message.id);
                })
            }
            EventKind::GuildCreate => {
                let guild: GuildChannels =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                let count = guild.channels.len();
                for mut patch in guild.channels {
                    patch.guild_id = Some(guild.id);
                    self.apply_patch(patch, Apply::Replace, flags | Flags::IGNORE_CACHE);
                }
                debug!("Cached {} channels for guild {}", count, guild.id);
                None
            }
            _ => None,
        };

        Ok(channel.map(Entity::into_cached))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::cache::BasicCacheRepo;
    use crate::config::RepoConfig;
    use crate::events::Feedback;

    fn apply(repo: &ChannelRepo, event: EventKind, json: &str) -> Option<Channel> {
        apply_at(repo, event, json, None)
    }

    fn apply_at(
        repo: &ChannelRepo,
        event: EventKind,
        json: &str,
        cascade: Option<Instant>,
    ) -> Option<Channel> {
        let (feedback, _rx) = Feedback::channel(8);
        let ctx = UpdateCtx {
            feedback: &feedback,
            shard_id: 0,
            cascade,
        };
        repo.update(&ctx, event, json.as_bytes(), Flags::empty())
            .unwrap()
            .and_then(Cached::into_channel)
    }

    fn repo() -> ChannelRepo {
        ChannelRepo::new(&RepoConfig::with_capacity(100), false)
    }

    #[test]
    fn test_duplicate_create_replaces() {
        let repo = repo();
        apply(&repo, EventKind::ChannelCreate, r#"{"id":"1","topic":"t"}"#);
        let out = apply(&repo, EventKind::ChannelCreate, r#"{"id":"1","name":"n"}"#).unwrap();

        assert_eq!(out.name, "n");
        assert_eq!(out.topic, None);
    }

    #[test]
    fn test_update_merges() {
        let repo = repo();
        apply(&repo, EventKind::ChannelCreate, r#"{"id":"1","name":"a","position":1}"#);
        let out = apply(&repo, EventKind::ChannelUpdate, r#"{"id":"1","position":2}"#).unwrap();

        assert_eq!(out.name, "a");
        assert_eq!(out.position, 2);
    }

    #[test]
    fn test_delete_returns_removed() {
        let repo = repo();
        apply(&repo, EventKind::ChannelCreate, r#"{"id":"1","name":"a"}"#);
        let removed = apply(&repo, EventKind::ChannelDelete, r#"{"id":"1","guild_id":"9"}"#);

        assert_eq!(removed.map(|c| c.name), Some("a".to_string()));
        assert!(repo.get(Snowflake(1)).is_none());
        assert!(apply(&repo, EventKind::ChannelDelete, r#"{"id":"1"}"#).is_none());
    }

    #[test]
    fn test_pins_and_messages_only_touch_cached_channels() {
        let repo = repo();
        apply(
            &repo,
            EventKind::ChannelPinsUpdate,
            r#"{"channel_id":"1","last_pin_timestamp":"2021-01-01T00:00:00+00:00"}"#,
        );
        apply(&repo, EventKind::MessageCreate, r#"{"id":"50","channel_id":"1"}"#);
        assert_eq!(repo.size(), 0);

        apply(&repo, EventKind::ChannelCreate, r#"{"id":"1","name":"a"}"#);
        apply(&repo, EventKind::MessageCreate, r#"{"id":"50","channel_id":"1","author":{"id":"3"}}"#);
        let out = apply(
            &repo,
            EventKind::ChannelPinsUpdate,
            r#"{"channel_id":"1","last_pin_timestamp":"2021-01-01T00:00:00+00:00"}"#,
        )
        .unwrap();

        assert_eq!(out.last_message_id, Some(Snowflake(50)));
        assert!(out.last_pin_timestamp.is_some());

        let out = apply(
            &repo,
            EventKind::ChannelPinsUpdate,
            r#"{"channel_id":"1","last_pin_timestamp":null}"#,
        )
        .unwrap();
        assert!(out.last_pin_timestamp.is_none());
    }

    #[test]
    fn test_guild_create_fills_guild_id() {
        let repo = repo();
        apply(
            &repo,
            EventKind::GuildCreate,
            r#"{"id":"9","name":"g","channels":[{"id":"1","name":"a"},{"id":"2","name":"b"}]}"#,
        );

        assert_eq!(repo.size(), 2);
        assert_eq!(repo.get(Snowflake(2)).unwrap().guild_id, Some(Snowflake(9)));
    }

    #[test]
    fn test_cascade_delete_spares_recreated_channel() {
        let repo = repo();
        apply(
            &repo,
            EventKind::GuildCreate,
            r#"{"id":"9","channels":[{"id":"1","name":"a"},{"id":"2","name":"b"}]}"#,
        );
        std::thread::sleep(Duration::from_millis(2));
        let removed_at = Instant::now();
        std::thread::sleep(Duration::from_millis(2));

        // the guild comes back before the cascade is applied
        apply(
            &repo,
            EventKind::GuildCreate,
            r#"{"id":"9","channels":[{"id":"2","name":"b2"}]}"#,
        );

        for id in ["1", "2"] {
            let json = format!(r#"{{"id":"{id}","guild_id":"9"}}"#);
            assert!(apply_at(&repo, EventKind::ChannelDelete, &json, Some(removed_at)).is_none());
        }

        assert!(repo.get(Snowflake(1)).is_none());
        assert_eq!(repo.get(Snowflake(2)).unwrap().name, "b2");
    }
}
