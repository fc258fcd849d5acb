//! Thread entity - one user's conversation with the staff team
//!
//! Every state transition lives here as a method on [`Thread`]. Methods return
//! `Ok(false)` when the requested state is already in place so that callers can
//! skip remote side effects for no-op transitions.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Lifecycle status of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Claimed,
    Archived,
    Closed,
}

impl ThreadStatus {
    /// Stable lowercase name (used in the database and in logs)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Archived => "archived",
            Self::Closed => "closed",
        }
    }

    /// Parse the stable name back into a status
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "claimed" => Some(Self::Claimed),
            "archived" => Some(Self::Archived),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// New user messages route to the existing channel in these states
    #[inline]
    pub fn routes_user_messages(self) -> bool {
        matches!(self, Self::Active | Self::Claimed)
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who caused a thread to be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "staff_id", rename_all = "snake_case")]
pub enum OpenedBy {
    /// The user sent a direct message
    UserMessage,
    /// A staff member opened the thread explicitly
    Staff(Snowflake),
}

impl OpenedBy {
    /// The acting identity for audit purposes
    pub fn actor(self, user_id: Snowflake) -> Snowflake {
        match self {
            Self::UserMessage => user_id,
            Self::Staff(staff) => staff,
        }
    }

    pub fn staff_id(self) -> Option<Snowflake> {
        match self {
            Self::UserMessage => None,
            Self::Staff(staff) => Some(staff),
        }
    }
}

/// Thread entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Snowflake,
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub status: ThreadStatus,
    pub claimed_by: Option<Snowflake>,
    pub locked: bool,
    pub opened_by: OpenedBy,
    pub participants: Vec<Snowflake>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Snowflake>,
}

impl Thread {
    /// Create a freshly opened thread bound to `channel_id`
    #[must_use]
    pub fn open(id: Snowflake, user_id: Snowflake, channel_id: Snowflake, opened_by: OpenedBy) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            channel_id,
            status: ThreadStatus::Active,
            claimed_by: None,
            locked: false,
            opened_by,
            participants: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            closed_by: None,
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Fail with `InvalidState` when the thread is closed
    pub fn ensure_open(&self, action: &'static str) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    /// `Active -> Claimed`. Re-claiming by the same staff member is a no-op.
    pub fn claim(&mut self, staff_id: Snowflake) -> Result<bool, DomainError> {
        match self.status {
            ThreadStatus::Active => {
                self.status = ThreadStatus::Claimed;
                self.claimed_by = Some(staff_id);
                self.touch();
                Ok(true)
            }
            ThreadStatus::Claimed if self.claimed_by == Some(staff_id) => Ok(false),
            ThreadStatus::Claimed => Err(DomainError::AlreadyClaimed {
                channel_id: self.channel_id,
                claimed_by: self.claimed_by.unwrap_or_default(),
            }),
            ThreadStatus::Archived | ThreadStatus::Closed => Err(self.invalid("claim")),
        }
    }

    /// `Active | Claimed -> Archived`; drops any claim
    pub fn archive(&mut self) -> Result<bool, DomainError> {
        match self.status {
            ThreadStatus::Active | ThreadStatus::Claimed => {
                self.status = ThreadStatus::Archived;
                self.claimed_by = None;
                self.touch();
                Ok(true)
            }
            ThreadStatus::Archived => Ok(false),
            ThreadStatus::Closed => Err(self.invalid("archive")),
        }
    }

    /// `Archived -> Active`
    pub fn unarchive(&mut self) -> Result<(), DomainError> {
        if self.status != ThreadStatus::Archived {
            return Err(self.invalid("unarchive"));
        }
        self.status = ThreadStatus::Active;
        self.touch();
        Ok(())
    }

    /// Set the staff-only flag; allowed in any non-closed state
    pub fn lock(&mut self) -> Result<bool, DomainError> {
        self.ensure_open("lock")?;
        if self.locked {
            return Ok(false);
        }
        self.locked = true;
        self.touch();
        Ok(true)
    }

    /// Grant an extra user access to the thread channel
    pub fn add_participant(&mut self, member_id: Snowflake) -> Result<bool, DomainError> {
        self.ensure_open("add a participant to")?;
        if member_id == self.user_id || self.participants.contains(&member_id) {
            return Ok(false);
        }
        self.participants.push(member_id);
        self.touch();
        Ok(true)
    }

    /// Any non-closed state -> `Closed`. Returns `false` if already closed.
    pub fn close(&mut self, closed_by: Snowflake) -> bool {
        if self.is_closed() {
            return false;
        }
        let now = Utc::now();
        self.status = ThreadStatus::Closed;
        self.claimed_by = None;
        self.closed_at = Some(now);
        self.closed_by = Some(closed_by);
        self.updated_at = now;
        true
    }

    /// Remote channel name for a user's thread
    pub fn channel_name(user_id: Snowflake) -> String {
        format!("modmail-{user_id}")
    }

    /// Remote channel name after closing
    pub fn closed_channel_name(user_id: Snowflake) -> String {
        format!("closed-{}", Self::channel_name(user_id))
    }

    /// Topic describing this thread on the remote channel
    pub fn topic(&self) -> ThreadTopic {
        ThreadTopic {
            user_id: self.user_id,
            thread_id: self.id,
            claimed_by: self.claimed_by,
            locked: self.locked,
            participants: self.participants.clone(),
        }
    }

    /// Check the `claimed_by iff Claimed` invariant
    pub fn is_consistent(&self) -> bool {
        (self.status == ThreadStatus::Claimed) == self.claimed_by.is_some()
            && (self.status == ThreadStatus::Closed) == self.closed_at.is_some()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid(&self, action: &'static str) -> DomainError {
        DomainError::InvalidState {
            channel_id: self.channel_id,
            status: self.status,
            action,
        }
    }
}

/// Metadata stored in the remote channel topic.
///
/// Format: `ModMail thread | user:<id> | thread:<id>[ | claimed:<id>][ | locked][ | participants:<id>,<id>]`
///
/// Everything needed to rebuild the thread after a restart without the store
/// is kept here, including what the permission overwrites are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTopic {
    pub user_id: Snowflake,
    pub thread_id: Snowflake,
    pub claimed_by: Option<Snowflake>,
    pub locked: bool,
    pub participants: Vec<Snowflake>,
}

impl ThreadTopic {
    const MARKER: &'static str = "ModMail thread";
    const LOCKED: &'static str = "locked";

    /// Topic of a freshly opened thread
    pub fn new(user_id: Snowflake, thread_id: Snowflake) -> Self {
        Self {
            user_id,
            thread_id,
            claimed_by: None,
            locked: false,
            participants: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut topic = format!(
            "{} | user:{} | thread:{}",
            Self::MARKER,
            self.user_id,
            self.thread_id
        );
        if let Some(staff) = self.claimed_by {
            let _ = write!(topic, " | claimed:{staff}");
        }
        if self.locked {
            let _ = write!(topic, " | {}", Self::LOCKED);
        }
        if !self.participants.is_empty() {
            let ids: Vec<String> = self.participants.iter().map(ToString::to_string).collect();
            let _ = write!(topic, " | participants:{}", ids.join(","));
        }
        topic
    }

    /// Parse a topic written by [`ThreadTopic::render`]. Foreign topics yield `None`.
    pub fn parse(topic: &str) -> Option<Self> {
        let mut parts = topic.split('|').map(str::trim);
        if parts.next()? != Self::MARKER {
            return None;
        }

        let mut user_id = None;
        let mut thread_id = None;
        let mut claimed_by = None;
        let mut locked = false;
        let mut participants = Vec::new();
        for part in parts {
            if part == Self::LOCKED {
                locked = true;
                continue;
            }
            let (key, value) = part.split_once(':')?;
            match key {
                "user" => user_id = Some(Snowflake::parse(value).ok()?),
                "thread" => thread_id = Some(Snowflake::parse(value).ok()?),
                "claimed" => claimed_by = Some(Snowflake::parse(value).ok()?),
                "participants" => {
                    participants = value
                        .split(',')
                        .map(|id| Snowflake::parse(id.trim()).ok())
                        .collect::<Option<Vec<_>>>()?;
                }
                _ => {}
            }
        }

        Some(Self {
            user_id: user_id?,
            thread_id: thread_id?,
            claimed_by,
            locked,
            participants,
        })
    }
}
