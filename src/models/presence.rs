//! Presence model, keyed by user id.

use serde::{Deserialize, Serialize};

use super::payload::{Ident, merge};
use super::{Cached, Entity, EntityKind, Snowflake};
use crate::cache::{Flags, Reset};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub url: Option<String>,
}

/// Per-platform status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientStatus {
    #[serde(default)]
    pub desktop: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub web: Option<String>,
}

/// The latest presence seen for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presence {
    pub user_id: Snowflake,
    /// Guild the presence was last reported for.
    pub guild_id: Option<Snowflake>,
    pub status: String,
    pub activities: Vec<Activity>,
    pub client_status: ClientStatus,
}

/// Fields present in a presence payload.
#[derive(Debug, Deserialize)]
pub(crate) struct PresencePatch {
    pub user: Ident,
    pub guild_id: Option<Snowflake>,
    status: Option<String>,
    activities: Option<Vec<Activity>>,
    client_status: Option<ClientStatus>,
}

impl Presence {
    /// Merge the fields present in `patch`.
    pub(crate) fn apply(&mut self, patch: PresencePatch, flags: Flags) {
        self.user_id = patch.user.id;
        merge(&mut self.guild_id, patch.guild_id.map(Some), flags);
        merge(&mut self.status, patch.status, flags);
        merge(&mut self.activities, patch.activities, flags);
        merge(&mut self.client_status, patch.client_status, flags);
    }

    pub fn is_online(&self) -> bool {
        !matches!(self.status.as_str(), "" | "offline" | "invisible")
    }
}

impl Reset for Presence {
    fn reset(&mut self) {
        self.user_id = Snowflake::default();
        self.guild_id = None;
        self.status.clear();
        self.activities.clear();
        self.client_status = ClientStatus::default();
    }
}

impl Entity for Presence {
    const KIND: EntityKind = EntityKind::Presence;

    fn id(&self) -> Snowflake {
        self.user_id
    }

    fn set_id(&mut self, id: Snowflake) {
        self.user_id = id;
    }

    fn copy_into(&self, dst: &mut Self) {
        dst.user_id = self.user_id;
        dst.guild_id = self.guild_id;
        dst.status.clone_from(&self.status);
        dst.activities.clone_from(&self.activities);
        dst.client_status.clone_from(&self.client_status);
    }

    fn into_cached(self) -> Cached {
        Cached::Presence(self)
    }
}
