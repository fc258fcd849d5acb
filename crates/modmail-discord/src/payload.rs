//! Request bodies and response shapes of the Discord REST API

use serde::Deserialize;
use serde_json::{json, Map, Value};

use modmail_core::entities::{ChannelEdit, GuildMember, NewChannel, ParentUpdate, RemoteChannel};
use modmail_core::value_objects::Snowflake;

/// Discord rejects message content longer than this
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Channel type of a guild text channel
const GUILD_TEXT: u8 = 0;

/// `POST /guilds/{guild.id}/channels`
pub(crate) fn create_channel_body(channel: &NewChannel) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(channel.name));
    body.insert("type".into(), json!(GUILD_TEXT));
    if let Some(parent) = channel.parent_id {
        body.insert("parent_id".into(), json!(parent));
    }
    if let Some(topic) = &channel.topic {
        body.insert("topic".into(), json!(topic));
    }
    body.insert("permission_overwrites".into(), json!(channel.overwrites));
    Value::Object(body)
}

/// `PATCH /channels/{channel.id}`; `parent_id: null` moves the channel out of its category
pub(crate) fn edit_channel_body(edit: &ChannelEdit) -> Value {
    let mut body = Map::new();
    if let Some(name) = &edit.name {
        body.insert("name".into(), json!(name));
    }
    match edit.parent {
        ParentUpdate::Keep => {}
        ParentUpdate::Set(parent) => {
            body.insert("parent_id".into(), json!(parent));
        }
        ParentUpdate::Clear => {
            body.insert("parent_id".into(), Value::Null);
        }
    }
    if let Some(topic) = &edit.topic {
        body.insert("topic".into(), json!(topic));
    }
    if let Some(overwrites) = &edit.overwrites {
        body.insert("permission_overwrites".into(), json!(overwrites));
    }
    Value::Object(body)
}

/// Channel object as returned by Discord (only the fields we read)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscordChannel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl DiscordChannel {
    /// Text channels only; categories and voice channels carry no threads
    pub fn into_remote(self) -> Option<RemoteChannel> {
        if self.kind != GUILD_TEXT {
            return None;
        }
        Some(RemoteChannel {
            id: self.id,
            name: self.name.unwrap_or_default(),
            parent_id: self.parent_id,
            topic: self.topic,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscordUser {
    pub id: Snowflake,
}

/// Guild member object as returned by Discord
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscordMember {
    #[serde(default)]
    pub user: Option<DiscordUser>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<String>,
}

impl DiscordMember {
    /// `user` is omitted in some payloads; fall back to the id that was looked up
    pub fn into_member(self, user_id: Snowflake) -> GuildMember {
        GuildMember {
            user_id: self.user.map_or(user_id, |u| u.id),
            nick: self.nick,
            roles: self.roles,
            joined_at: self.joined_at,
        }
    }
}

/// Split text into chunks Discord accepts, preferring line breaks
pub fn split_content(content: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = content;

    while rest.chars().count() > MAX_MESSAGE_LEN {
        let hard_end = rest
            .char_indices()
            .nth(MAX_MESSAGE_LEN)
            .map_or(rest.len(), |(idx, _)| idx);
        let end = match rest[..hard_end].rfind('\n') {
            Some(newline) if newline > 0 => newline + 1,
            _ => hard_end,
        };
        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}
