//! Thread database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the threads table
#[derive(Debug, Clone, FromRow)]
pub struct ThreadModel {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    /// 'active', 'claimed', 'archived' or 'closed'
    pub status: String,
    pub claimed_by: Option<i64>,
    pub locked: bool,
    /// Staff member who opened the thread; NULL when the user did
    pub opened_by_staff: Option<i64>,
    pub participants: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<i64>,
}

impl ThreadModel {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.status == "closed"
    }
}
