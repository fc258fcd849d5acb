//! Request DTOs for the ingress endpoints
//!
//! The messaging gateway posts one event per inbound message or invoked
//! command. All request DTOs implement `Deserialize` and `Validate`.

use serde::Deserialize;
use validator::Validate;

use modmail_core::Snowflake;

/// A direct message sent by a user to the bot
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DirectMessageEvent {
    pub user_id: Snowflake,

    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,
}

/// A staff command invoked in a thread channel
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StaffCommandEvent {
    #[validate(length(min = 1, max = 32, message = "Command must be 1-32 characters"))]
    pub command: String,

    pub channel_id: Snowflake,

    pub invoking_staff_id: Snowflake,

    #[serde(default)]
    pub args: Vec<String>,
}

impl StaffCommandEvent {
    /// Arguments as a single string, as typed after the command name
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

/// A plain message posted by staff in the staff server
///
/// Only messages starting with the command prefix are acted on.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StaffMessageEvent {
    pub channel_id: Snowflake,

    pub author_id: Snowflake,

    #[validate(length(min = 1, max = 4000, message = "Content must be 1-4000 characters"))]
    pub content: String,
}
