//! Thread lifecycle events
//!
//! One event is emitted per lifecycle transition. They are the structured
//! audit trail of the registry and are delivered to every configured
//! [`AuditSink`](crate::traits::AuditSink).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Thread;
use crate::value_objects::Snowflake;

/// Kind of lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadEventKind {
    Opened,
    Claimed,
    Locked,
    Archived,
    Unarchived,
    ParticipantAdded,
    Closed,
    /// Rebuilt from remote channel metadata at startup
    Adopted,
}

impl ThreadEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Claimed => "claimed",
            Self::Locked => "locked",
            Self::Archived => "archived",
            Self::Unarchived => "unarchived",
            Self::ParticipantAdded => "participant_added",
            Self::Closed => "closed",
            Self::Adopted => "adopted",
        }
    }
}

/// Structured audit record for one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEvent {
    #[serde(rename = "type")]
    pub kind: ThreadEventKind,
    pub thread_id: Snowflake,
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    /// Staff member or user who caused the transition
    pub actor: Snowflake,
    /// Secondary subject, e.g. the participant that was added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Snowflake>,
    pub timestamp: DateTime<Utc>,
}

impl ThreadEvent {
    pub fn new(kind: ThreadEventKind, thread: &Thread, actor: Snowflake) -> Self {
        Self {
            kind,
            thread_id: thread.id,
            user_id: thread.user_id,
            channel_id: thread.channel_id,
            actor,
            subject: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_subject(mut self, subject: Snowflake) -> Self {
        self.subject = Some(subject);
        self
    }

    /// One-line human summary for chat log channels
    pub fn summary(&self) -> String {
        let base = match self.kind {
            ThreadEventKind::Opened => format!(
                "Thread opened for <@{}> in <#{}> by <@{}>",
                self.user_id, self.channel_id, self.actor
            ),
            ThreadEventKind::Claimed => {
                format!("<#{}> claimed by <@{}>", self.channel_id, self.actor)
            }
            ThreadEventKind::Locked => {
                format!("<#{}> locked by <@{}>", self.channel_id, self.actor)
            }
            ThreadEventKind::Archived => {
                format!("<#{}> archived by <@{}>", self.channel_id, self.actor)
            }
            ThreadEventKind::Unarchived => {
                format!("<#{}> unarchived by <@{}>", self.channel_id, self.actor)
            }
            ThreadEventKind::ParticipantAdded => format!(
                "<@{}> added to <#{}> by <@{}>",
                self.subject.unwrap_or_default(),
                self.channel_id,
                self.actor
            ),
            ThreadEventKind::Closed => format!(
                "Thread for <@{}> closed by <@{}>",
                self.user_id, self.actor
            ),
            ThreadEventKind::Adopted => format!(
                "Thread for <@{}> in <#{}> restored from channel metadata",
                self.user_id, self.channel_id
            ),
        };
        format!("[{}] {base}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}
