//! Process-local implementation of ThreadRepository
//!
//! Used when no database is configured and by the test suites. Contents are
//! lost on restart; the same uniqueness rules as the PostgreSQL schema apply.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use modmail_core::entities::Thread;
use modmail_core::traits::{RepoResult, ThreadRepository};
use modmail_core::value_objects::Snowflake;

use super::error::{duplicate_thread, thread_not_stored};

/// In-memory thread store
#[derive(Debug, Default)]
pub struct MemoryThreadRepository {
    threads: RwLock<HashMap<Snowflake, Thread>>,
}

impl MemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads, closed ones included
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

#[async_trait]
impl ThreadRepository for MemoryThreadRepository {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Thread>> {
        Ok(self.threads.read().get(&id).cloned())
    }

    async fn find_by_channel(&self, channel_id: Snowflake) -> RepoResult<Option<Thread>> {
        Ok(self
            .threads
            .read()
            .values()
            .find(|t| t.channel_id == channel_id)
            .cloned())
    }

    async fn find_open_by_user(&self, user_id: Snowflake) -> RepoResult<Option<Thread>> {
        Ok(self
            .threads
            .read()
            .values()
            .find(|t| t.user_id == user_id && !t.is_closed())
            .cloned())
    }

    async fn list_open(&self) -> RepoResult<Vec<Thread>> {
        let mut open: Vec<Thread> = self
            .threads
            .read()
            .values()
            .filter(|t| !t.is_closed())
            .cloned()
            .collect();
        open.sort_by_key(|t| t.created_at);
        Ok(open)
    }

    async fn insert(&self, thread: &Thread) -> RepoResult<()> {
        let mut threads = self.threads.write();
        let conflict = threads.values().any(|t| {
            t.id == thread.id
                || t.channel_id == thread.channel_id
                || (t.user_id == thread.user_id && !t.is_closed() && !thread.is_closed())
        });
        if conflict {
            return Err(duplicate_thread(thread));
        }
        threads.insert(thread.id, thread.clone());
        Ok(())
    }

    async fn update(&self, thread: &Thread) -> RepoResult<()> {
        match self.threads.write().get_mut(&thread.id) {
            Some(stored) => {
                *stored = thread.clone();
                Ok(())
            }
            None => Err(thread_not_stored(thread)),
        }
    }

    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }
}
