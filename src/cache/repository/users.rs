//! User event handling.
//!
//! Users mostly arrive embedded in other events (message authors, members,
//! presences). An embedded user that carries only its id is a reference and
//! never overwrites what is cached.

use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use super::{Apply, Demultiplex, UpdateCtx, UserRepo};
use crate::cache::Flags;
use crate::error::{CacheError, Result};
use crate::events::EventKind;
use crate::models::payload::{Ident, is_reference};
use crate::models::{Cached, Entity, User, UserPatch};

#[derive(Deserialize)]
struct Embedded<'a> {
    #[serde(borrow)]
    user: &'a RawValue,
}

#[derive(Deserialize)]
struct Authored<'a> {
    #[serde(borrow)]
    author: &'a RawValue,
}

#[derive(Deserialize)]
struct Members<'a> {
    #[serde(borrow, default)]
    members: Vec<Embedded<'a>>,
}

impl UserRepo {
    fn merge_user(&self, patch: UserPatch, flags: Flags) -> Option<User> {
        let id = patch.id;
        self.upsert(id, Apply::Merge, flags, |user| user.apply(patch, flags))
    }

    /// Apply a user object embedded in another event.
    fn apply_embedded(&self, event: EventKind, raw: &RawValue, flags: Flags) -> Result<Option<User>> {
        if is_reference(raw).map_err(CacheError::malformed(event))? {
            let ident: Ident =
                serde_json::from_str(raw.get()).map_err(CacheError::malformed(event))?;
            return Ok(self.reference(ident.id, flags));
        }

        let patch: UserPatch =
            serde_json::from_str(raw.get()).map_err(CacheError::malformed(event))?;
        Ok(self.merge_user(patch, flags))
    }

    fn apply_members(&self, event: EventKind, payload: &[u8], flags: Flags) -> Result<()> {
        let chunk: Members<'_> =
            serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
        let count = chunk.members.len();
        let mut applied = 0;

        for member in chunk.members {
            // one bad member must not cost the rest of the chunk
            if let Err(e) = self.apply_embedded(event, member.user, flags | Flags::IGNORE_CACHE) {
                warn!("Skipping member in {}: {}", event, e);
                continue;
            }
            applied += 1;
        }

        debug!("Applied {} of {} members from {}", applied, count, event);
        Ok(())
    }
}

impl Demultiplex for UserRepo {
    fn update(
        &self,
        _ctx: &UpdateCtx<'_>,
        event: EventKind,
        payload: &[u8],
        flags: Flags,
    ) -> Result<Option<Cached>> {
        let user = match event {
            EventKind::UserUpdate => {
                let patch: UserPatch =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                self.merge_user(patch, flags)
            }
            EventKind::Ready
            | EventKind::GuildMemberAdd
            | EventKind::GuildMemberUpdate
            | EventKind::PresenceUpdate => {
                let embedded: Embedded<'_> =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                self.apply_embedded(event, embedded.user, flags)?
            }
            EventKind::MessageCreate => {
                let message: Authored<'_> =
                    serde_json::from_slice(payload).map_err(CacheError::malformed(event))?;
                self.apply_embedded(event, message.author, flags)?
            }
            EventKind::GuildMembersChunk | EventKind::GuildCreate => {
                self.apply_members(event, payload, flags)?;
                None
            }
            _ => None,
        };

        Ok(user.map(Entity::into_cached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BasicCacheRepo;
    use crate::config::RepoConfig;
    use crate::events::Feedback;
    use crate::models::Snowflake;

    fn apply(repo: &UserRepo, event: EventKind, json: &str) -> Result<Option<Cached>> {
        let (feedback, _rx) = Feedback::channel(8);
        let ctx = UpdateCtx {
            feedback: &feedback,
            shard_id: 0,
            cascade: None,
        };
        repo.update(&ctx, event, json.as_bytes(), Flags::empty())
    }

    fn repo() -> UserRepo {
        UserRepo::new(&RepoConfig::with_capacity(100), false)
    }

    #[test]
    fn test_user_update_merges() {
        let repo = repo();
        apply(&repo, EventKind::UserUpdate, r#"{"id":"1","username":"a","discriminator":"1"}"#)
            .unwrap();
        let out = apply(&repo, EventKind::UserUpdate, r#"{"id":"1","discriminator":"2"}"#)
            .unwrap()
            .and_then(Cached::into_user)
            .unwrap();

        assert_eq!(out.username, "a");
        assert_eq!(out.discriminator, "2");
    }

    #[test]
    fn test_reference_only_author_is_not_stored() {
        let repo = repo();
        let out = apply(
            &repo,
            EventKind::MessageCreate,
            r#"{"id":"100","channel_id":"5","author":{"id":"7"},"content":"hi"}"#,
        )
        .unwrap()
        .and_then(Cached::into_user)
        .unwrap();

        assert_eq!(out.id, Snowflake(7));
        assert_eq!(repo.size(), 0);
    }

    #[test]
    fn test_reference_does_not_clobber_cached_user() {
        let repo = repo();
        apply(&repo, EventKind::UserUpdate, r#"{"id":"7","username":"seven"}"#).unwrap();
        let out = apply(&repo, EventKind::PresenceUpdate, r#"{"user":{"id":"7"},"status":"idle"}"#)
            .unwrap()
            .and_then(Cached::into_user)
            .unwrap();

        assert_eq!(out.username, "seven");
        assert_eq!(repo.get(Snowflake(7)).unwrap().username, "seven");
    }

    #[test]
    fn test_full_author_is_merged() {
        let repo = repo();
        apply(
            &repo,
            EventKind::MessageCreate,
            r#"{"id":"100","author":{"id":"8","username":"eight","bot":true}}"#,
        )
        .unwrap();

        let user = repo.get(Snowflake(8)).unwrap();
        assert!(user.bot);
        assert_eq!(user.username, "eight");
    }

    #[test]
    fn test_members_chunk() {
        let repo = repo();
        let out = apply(
            &repo,
            EventKind::GuildMembersChunk,
            r#"{"guild_id":"1","members":[
                {"user":{"id":"1","username":"a"},"roles":[]},
                {"user":{"id":"2","username":"b"},"nick":"bee"},
                {"user":{"id":"3"}}
            ]}"#,
        )
        .unwrap();

        assert!(out.is_none());
        assert_eq!(repo.size(), 2);
        assert_eq!(repo.get(Snowflake(2)).unwrap().username, "b");
    }

    #[test]
    fn test_guild_create_without_members() {
        let repo = repo();
        assert!(apply(&repo, EventKind::GuildCreate, r#"{"id":"1","name":"g"}"#)
            .unwrap()
            .is_none());
        assert_eq!(repo.size(), 0);
    }

    #[test]
    fn test_malformed_payload() {
        let repo = repo();
        let err = apply(&repo, EventKind::UserUpdate, r#"{"username":"no id"}"#).unwrap_err();
        assert!(matches!(
            err,
            CacheError::MalformedPayload {
                event: EventKind::UserUpdate,
                ..
            }
        ));

        assert!(apply(&repo, EventKind::MessageCreate, "not json").is_err());
    }

    #[test]
    fn test_members_chunk_skips_bad_member() {
        let repo = repo();
        let out = apply(
            &repo,
            EventKind::GuildMembersChunk,
            r#"{"guild_id":"9","members":[
                {"user":{"id":"1","username":"a"}},
                {"user":{"username":"x","bot":true}},
                {"user":{"id":"3","username":"c"}}]}"#,
        );

        assert!(out.unwrap().is_none());
        assert_eq!(repo.size(), 2);
        assert_eq!(repo.get(Snowflake(1)).unwrap().username, "a");
        assert_eq!(repo.get(Snowflake(3)).unwrap().username, "c");
    }
}
