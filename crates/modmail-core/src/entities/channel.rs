//! Channel descriptors exchanged with the messaging transport

use serde::{Deserialize, Serialize};

use crate::value_objects::{PermissionOverwrite, Snowflake};

/// Request to create a text channel on the staff server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub guild_id: Snowflake,
    pub name: String,
    pub parent_id: Option<Snowflake>,
    pub topic: Option<String>,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// How an edit treats the channel's category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentUpdate {
    #[default]
    Keep,
    Set(Snowflake),
    Clear,
}

/// Partial channel update; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelEdit {
    pub name: Option<String>,
    pub parent: ParentUpdate,
    pub topic: Option<String>,
    pub overwrites: Option<Vec<PermissionOverwrite>>,
}

impl ChannelEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Move into `category`, or out of any category when `None`
    pub fn parent(mut self, category: Option<Snowflake>) -> Self {
        self.parent = match category {
            Some(id) => ParentUpdate::Set(id),
            None => ParentUpdate::Clear,
        };
        self
    }

    /// Move into `category` if one is configured, otherwise stay put
    pub fn parent_if_set(mut self, category: Option<Snowflake>) -> Self {
        if let Some(id) = category {
            self.parent = ParentUpdate::Set(id);
        }
        self
    }

    pub fn clear_parent(mut self) -> Self {
        self.parent = ParentUpdate::Clear;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn overwrites(mut self, overwrites: Vec<PermissionOverwrite>) -> Self {
        self.overwrites = Some(overwrites);
        self
    }

    /// True when the edit would change nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parent == ParentUpdate::Keep
            && self.topic.is_none()
            && self.overwrites.is_none()
    }
}

/// Destination of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    /// A channel on the staff server
    Channel(Snowflake),
    /// A user, reached by direct message
    User(Snowflake),
}

/// A channel as listed by the transport (used by reconciliation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChannel {
    pub id: Snowflake,
    pub name: String,
    pub parent_id: Option<Snowflake>,
    pub topic: Option<String>,
}

/// A user's membership of the staff server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<String>,
}
