//! Messaging transport port
//!
//! The registry never talks to Discord directly; it issues channel and message
//! operations through this trait. `modmail-discord` provides the REST
//! implementation.

use async_trait::async_trait;

use crate::entities::{ChannelEdit, GuildMember, MessageTarget, NewChannel, RemoteChannel};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a text channel and return its id
    async fn create_channel(&self, channel: &NewChannel) -> TransportResult<Snowflake>;

    /// Apply a partial update to a channel
    async fn edit_channel(&self, channel_id: Snowflake, edit: &ChannelEdit) -> TransportResult<()>;

    /// Send a plain text message to a channel or a user
    async fn send_message(&self, target: MessageTarget, content: &str) -> TransportResult<()>;

    /// List all channels of a guild. Idempotent.
    async fn list_guild_channels(&self, guild_id: Snowflake) -> TransportResult<Vec<RemoteChannel>>;

    /// Look up a user's membership of a guild; `None` when they are not a member. Idempotent.
    async fn guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> TransportResult<Option<GuildMember>>;
}
