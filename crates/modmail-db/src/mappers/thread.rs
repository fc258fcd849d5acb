//! Thread entity <-> model mapper

use modmail_core::entities::{OpenedBy, Thread, ThreadStatus};
use modmail_core::error::DomainError;
use modmail_core::value_objects::Snowflake;

use crate::models::ThreadModel;

/// Convert ThreadModel to Thread entity
impl TryFrom<ThreadModel> for Thread {
    type Error = DomainError;

    fn try_from(model: ThreadModel) -> Result<Self, Self::Error> {
        let status = ThreadStatus::parse(&model.status).ok_or_else(|| {
            DomainError::DatabaseError(format!(
                "thread {} has unknown status {:?}",
                model.id, model.status
            ))
        })?;

        Ok(Thread {
            id: Snowflake::new(model.id),
            user_id: Snowflake::new(model.user_id),
            channel_id: Snowflake::new(model.channel_id),
            status,
            claimed_by: model.claimed_by.map(Snowflake::new),
            locked: model.locked,
            opened_by: match model.opened_by_staff {
                Some(staff) => OpenedBy::Staff(Snowflake::new(staff)),
                None => OpenedBy::UserMessage,
            },
            participants: model.participants.into_iter().map(Snowflake::new).collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
            closed_at: model.closed_at,
            closed_by: model.closed_by.map(Snowflake::new),
        })
    }
}

/// Column values of a thread, ready to bind
pub struct ThreadRow {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    pub status: &'static str,
    pub claimed_by: Option<i64>,
    pub locked: bool,
    pub opened_by_staff: Option<i64>,
    pub participants: Vec<i64>,
    pub closed_by: Option<i64>,
}

impl ThreadRow {
    pub fn new(thread: &Thread) -> Self {
        Self {
            id: thread.id.into_inner(),
            user_id: thread.user_id.into_inner(),
            channel_id: thread.channel_id.into_inner(),
            status: thread.status.as_str(),
            claimed_by: thread.claimed_by.map(Snowflake::into_inner),
            locked: thread.locked,
            opened_by_staff: thread.opened_by.staff_id().map(Snowflake::into_inner),
            participants: thread.participants.iter().map(|p| p.into_inner()).collect(),
            closed_by: thread.closed_by.map(Snowflake::into_inner),
        }
    }
}
