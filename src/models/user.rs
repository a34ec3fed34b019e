//! User model.

use serde::{Deserialize, Serialize};

use super::payload::{merge, nullable};
use super::{Cached, Entity, EntityKind, Snowflake};
use crate::cache::{Flags, Reset};

/// A platform user as seen through the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    /// Avatar hash.
    pub avatar: Option<String>,
    pub bot: bool,
    pub system: bool,
    pub public_flags: u64,
}

/// Fields present in a user payload.
#[derive(Debug, Deserialize)]
pub(crate) struct UserPatch {
    pub id: Snowflake,
    username: Option<String>,
    discriminator: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    avatar: Option<Option<String>>,
    bot: Option<bool>,
    system: Option<bool>,
    public_flags: Option<u64>,
}

impl User {
    /// Merge the fields present in `patch`.
    pub(crate) fn apply(&mut self, patch: UserPatch, flags: Flags) {
        self.id = patch.id;
        merge(&mut self.username, patch.username, flags);
        merge(&mut self.discriminator, patch.discriminator, flags);
        merge(&mut self.avatar, patch.avatar, flags);
        merge(&mut self.bot, patch.bot, flags);
        merge(&mut self.system, patch.system, flags);
        merge(&mut self.public_flags, patch.public_flags, flags);
    }

    /// `username#discriminator`, or just the username for migrated accounts.
    pub fn tag(&self) -> String {
        match self.discriminator.as_str() {
            "" | "0" => self.username.clone(),
            d => format!("{}#{}", self.username, d),
        }
    }
}

impl Reset for User {
    fn reset(&mut self) {
        self.id = Snowflake::default();
        self.username.clear();
        self.discriminator.clear();
        self.avatar = None;
        self.bot = false;
        self.system = false;
        self.public_flags = 0;
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn set_id(&mut self, id: Snowflake) {
        self.id = id;
    }

    fn copy_into(&self, dst: &mut Self) {
        dst.id = self.id;
        dst.username.clone_from(&self.username);
        dst.discriminator.clone_from(&self.discriminator);
        dst.avatar.clone_from(&self.avatar);
        dst.bot = self.bot;
        dst.system = self.system;
        dst.public_flags = self.public_flags;
    }

    fn into_cached(self) -> Cached {
        Cached::User(self)
    }
}
