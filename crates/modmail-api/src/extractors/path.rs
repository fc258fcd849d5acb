//! Path parameter extractors
//!
//! Type-safe extraction of Snowflake IDs from path parameters.

use modmail_core::Snowflake;

use crate::response::ApiError;

/// Path parameters with channel_id
#[derive(Debug, serde::Deserialize)]
pub struct ChannelIdPath {
    pub channel_id: String,
}

impl ChannelIdPath {
    /// Parse channel_id as Snowflake
    pub fn channel_id(&self) -> Result<Snowflake, ApiError> {
        Snowflake::parse(&self.channel_id)
            .map_err(|_| ApiError::invalid_path("Invalid channel_id format"))
    }
}

/// Path parameters with user_id
#[derive(Debug, serde::Deserialize)]
pub struct UserIdPath {
    pub user_id: String,
}

impl UserIdPath {
    /// Parse user_id as Snowflake
    pub fn user_id(&self) -> Result<Snowflake, ApiError> {
        Snowflake::parse(&self.user_id)
            .map_err(|_| ApiError::invalid_path("Invalid user_id format"))
    }
}
