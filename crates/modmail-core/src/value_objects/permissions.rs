//! Discord permission bits and channel permission overwrites
//!
//! Only the bits a modmail channel needs are named; unknown bits coming back
//! from the API are preserved by `from_bits_retain`.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Snowflake;

bitflags! {
    /// Discord permission flags (values match the Discord API)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const ADD_REACTIONS        = 1 << 6;
        const VIEW_CHANNEL         = 1 << 10;
        const SEND_MESSAGES        = 1 << 11;
        const EMBED_LINKS          = 1 << 14;
        const ATTACH_FILES         = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;

        /// What a participant of a thread channel may do
        const THREAD_MEMBER = Self::VIEW_CHANNEL.bits()
            | Self::SEND_MESSAGES.bits()
            | Self::READ_MESSAGE_HISTORY.bits()
            | Self::ATTACH_FILES.bits()
            | Self::EMBED_LINKS.bits();
    }
}

impl Permissions {
    /// Parse from the decimal string form the API uses
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.parse::<u64>().map(Permissions::from_bits_retain)
    }
}

// The API encodes permission sets as decimal strings
impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.bits().to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Permissions::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Target kind of a permission overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwriteKind {
    Role,
    Member,
}

impl Serialize for OverwriteKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(match self {
            Self::Role => 0,
            Self::Member => 1,
        })
    }
}

impl<'de> Deserialize<'de> for OverwriteKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Role),
            1 => Ok(Self::Member),
            other => Err(serde::de::Error::custom(format!(
                "unknown overwrite type {other}"
            ))),
        }
    }
}

/// A channel-level permission overwrite for a role or a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn role(id: Snowflake, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id,
            kind: OverwriteKind::Role,
            allow,
            deny,
        }
    }

    pub fn member(id: Snowflake, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id,
            kind: OverwriteKind::Member,
            allow,
            deny,
        }
    }
}

/// Build the overwrite set for a thread channel.
///
/// `@everyone` (whose role id equals the guild id) never sees the channel. The
/// staff role, when configured, always has full access. Participants added by
/// staff can talk until the thread is locked, after which they can only read.
pub fn thread_overwrites(
    guild_id: Snowflake,
    staff_role: Option<Snowflake>,
    participants: &[Snowflake],
    locked: bool,
) -> Vec<PermissionOverwrite> {
    let mut overwrites = Vec::with_capacity(participants.len() + 2);

    let everyone_deny = if locked {
        Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES
    } else {
        Permissions::VIEW_CHANNEL
    };
    overwrites.push(PermissionOverwrite::role(
        guild_id,
        Permissions::empty(),
        everyone_deny,
    ));

    if let Some(role) = staff_role {
        overwrites.push(PermissionOverwrite::role(
            role,
            Permissions::THREAD_MEMBER,
            Permissions::empty(),
        ));
    }

    for &member in participants {
        let overwrite = if locked {
            PermissionOverwrite::member(
                member,
                Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
                Permissions::SEND_MESSAGES,
            )
        } else {
            PermissionOverwrite::member(member, Permissions::THREAD_MEMBER, Permissions::empty())
        };
        overwrites.push(overwrite);
    }

    overwrites
}
