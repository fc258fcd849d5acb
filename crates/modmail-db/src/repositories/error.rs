//! Error handling utilities for repositories

use modmail_core::entities::Thread;
use modmail_core::error::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique();
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// The store already holds a non-closed thread for this user or channel
pub fn duplicate_thread(thread: &Thread) -> DomainError {
    DomainError::DuplicateThread {
        user_id: thread.user_id,
        channel_id: thread.channel_id,
    }
}

/// Update targeted a thread id the store does not know
pub fn thread_not_stored(thread: &Thread) -> DomainError {
    DomainError::DatabaseError(format!("thread {} is not stored", thread.id))
}
