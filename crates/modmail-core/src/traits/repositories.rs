//! Repository traits (ports) - define the interface for durable thread storage
//!
//! The registry keeps its working set in memory and writes every transition
//! through to a `ThreadRepository`. Implementations live in `modmail-db`.

use async_trait::async_trait;

use crate::entities::Thread;
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Find thread by its own ID
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Thread>>;

    /// Find the thread bound to a staff channel (any status)
    async fn find_by_channel(&self, channel_id: Snowflake) -> RepoResult<Option<Thread>>;

    /// Find the non-closed thread of a user
    async fn find_open_by_user(&self, user_id: Snowflake) -> RepoResult<Option<Thread>>;

    /// List every non-closed thread
    async fn list_open(&self) -> RepoResult<Vec<Thread>>;

    /// Insert a new thread
    async fn insert(&self, thread: &Thread) -> RepoResult<()>;

    /// Persist the current state of an existing thread
    async fn update(&self, thread: &Thread) -> RepoResult<()>;

    /// Check that the store is reachable
    async fn ping(&self) -> RepoResult<()>;
}
