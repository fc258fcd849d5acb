//! Staff commands
//!
//! Commands arrive either as structured events (`command` + `args`) or as raw
//! staff messages starting with the configured prefix (`?reply on it`).
//! Every command ends in a [`CommandReply`] for the invoking staff member.

use tracing::{error, info};

use modmail_core::{DomainError, GuildMember, OpenedBy, Snowflake, Thread};

use super::registry::ThreadRegistry;
use crate::dto::CommandReply;

/// A parsed staff command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffCommand {
    Reply(String),
    Claim,
    Lock,
    Archive,
    Unarchive,
    Close,
    /// Open a thread for a user who has not written in
    Open(Snowflake),
    /// Grant another member access to the thread
    Add(Snowflake),
    Info,
    /// Staff-server roles of a user and their open thread, if any
    UserInfo(Snowflake),
}

/// Why a command could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("Unknown command `{0}`.")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    MissingArgument(&'static str),

    #[error("`{0}` is not a user mention or id.")]
    InvalidArgument(String),
}

impl StaffCommand {
    /// Parse a command name and its argument text
    pub fn parse(name: &str, args: &str) -> Result<Self, CommandParseError> {
        let args = args.trim();
        match name.trim().to_lowercase().as_str() {
            "reply" | "r" => {
                if args.is_empty() {
                    Err(CommandParseError::MissingArgument("reply <message>"))
                } else {
                    Ok(Self::Reply(args.to_string()))
                }
            }
            "claim" => Ok(Self::Claim),
            "lock" => Ok(Self::Lock),
            "archive" => Ok(Self::Archive),
            "unarchive" => Ok(Self::Unarchive),
            "close" => Ok(Self::Close),
            "open" => user_argument(args, "open <user>").map(Self::Open),
            "add" => user_argument(args, "add <user>").map(Self::Add),
            "info" => Ok(Self::Info),
            "userinfo" => user_argument(args, "userinfo <user>").map(Self::UserInfo),
            other => Err(CommandParseError::UnknownCommand(other.to_string())),
        }
    }

    /// Parse a raw staff message. Returns `None` when the message is not a
    /// command at all.
    pub fn parse_message(prefix: &str, content: &str) -> Option<Result<Self, CommandParseError>> {
        if prefix.is_empty() {
            return None;
        }
        let body = content.trim_start().strip_prefix(prefix)?;
        let (name, args) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        if name.is_empty() {
            return None;
        }
        Some(Self::parse(name, args))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::Claim => "claim",
            Self::Lock => "lock",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::Close => "close",
            Self::Open(_) => "open",
            Self::Add(_) => "add",
            Self::Info => "info",
            Self::UserInfo(_) => "userinfo",
        }
    }

    /// Run the command against the registry on behalf of `staff_id`
    pub async fn dispatch(
        self,
        registry: &ThreadRegistry,
        channel_id: Snowflake,
        staff_id: Snowflake,
    ) -> CommandReply {
        let name = self.name();
        let outcome = match self {
            Self::Reply(text) => registry
                .reply(channel_id, staff_id, &text)
                .await
                .map(|t| format!("Reply sent to <@{}>.", t.user_id)),
            Self::Claim => registry
                .claim(channel_id, staff_id)
                .await
                .map(|t| format!("Thread claimed by <@{}>.", t.claimed_by.unwrap_or(staff_id))),
            Self::Lock => registry
                .lock(channel_id, staff_id)
                .await
                .map(|_| "Thread locked.".to_string()),
            Self::Archive => registry
                .archive(channel_id, staff_id)
                .await
                .map(|_| "Thread archived.".to_string()),
            Self::Unarchive => registry
                .unarchive(channel_id, staff_id)
                .await
                .map(|_| "Thread moved back to active.".to_string()),
            Self::Close => registry
                .close(channel_id, staff_id)
                .await
                .map(|_| "Thread closed.".to_string()),
            Self::Open(user_id) => registry
                .open_thread(user_id, OpenedBy::Staff(staff_id))
                .await
                .map(|t| format!("Opened <#{}> for <@{user_id}>.", t.channel_id)),
            Self::Add(member_id) => registry
                .add_participant(channel_id, member_id, staff_id)
                .await
                .map(|_| format!("Added <@{member_id}> to this thread.")),
            Self::Info => registry
                .resolve_by_channel(channel_id)
                .await
                .map(|t| describe(&t)),
            Self::UserInfo(user_id) => match registry.member_info(user_id).await {
                Ok(member) => {
                    let thread = registry.resolve_by_user(user_id).await.ok();
                    Ok(describe_user(user_id, member.as_ref(), thread.as_ref()))
                }
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(message) => {
                info!(command = name, %channel_id, %staff_id, "Staff command succeeded");
                CommandReply::ok(message)
            }
            Err(e) => {
                info!(command = name, %channel_id, %staff_id, error = %e, "Staff command failed");
                CommandReply::failure(failure_message(&e))
            }
        }
    }
}

fn user_argument(args: &str, usage: &'static str) -> Result<Snowflake, CommandParseError> {
    let first = args.split_whitespace().next();
    match first {
        None => Err(CommandParseError::MissingArgument(usage)),
        Some(arg) => {
            Snowflake::parse_mention(arg).map_err(|_| CommandParseError::InvalidArgument(arg.to_string()))
        }
    }
}

fn describe(thread: &Thread) -> String {
    let mut text = format!(
        "Thread {} for <@{}>: {}",
        thread.id, thread.user_id, thread.status
    );
    if let Some(staff_id) = thread.claimed_by {
        text.push_str(&format!(", claimed by <@{staff_id}>"));
    }
    if thread.locked {
        text.push_str(", locked");
    }
    text.push_str(&format!(", opened {}", thread.created_at.format("%Y-%m-%d %H:%M UTC")));
    text
}

fn describe_user(user_id: Snowflake, member: Option<&GuildMember>, thread: Option<&Thread>) -> String {
    let mut text = format!("<@{user_id}>: ");
    match member {
        None => text.push_str("not a member of the staff server"),
        Some(member) if member.roles.is_empty() => text.push_str("no roles"),
        Some(member) => {
            let roles: Vec<String> = member.roles.iter().map(|r| format!("<@&{r}>")).collect();
            text.push_str(&format!("roles {}", roles.join(", ")));
        }
    }
    if let Some(joined) = member.and_then(|m| m.joined_at.as_deref()) {
        text.push_str(&format!(", joined {joined}"));
    }
    match thread {
        Some(thread) => text.push_str(&format!(
            ". Open thread: <#{}> ({})",
            thread.channel_id, thread.status
        )),
        None => text.push_str(". No open thread"),
    }
    text
}

/// Short text for the invoking staff member
fn failure_message(e: &DomainError) -> String {
    match e {
        DomainError::Transport(_) => "Discord request failed. Try again.".to_string(),
        DomainError::TransportTimeout(_) => {
            "Discord did not respond in time. Try again.".to_string()
        }
        DomainError::DatabaseError(_) | DomainError::InternalError(_) => {
            error!(error = %e, "Staff command hit an internal error");
            "Something went wrong. The error has been logged.".to_string()
        }
        _ => e.to_string(),
    }
}
