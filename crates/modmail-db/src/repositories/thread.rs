//! PostgreSQL implementation of ThreadRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use modmail_core::entities::Thread;
use modmail_core::traits::{RepoResult, ThreadRepository};
use modmail_core::value_objects::Snowflake;

use crate::mappers::ThreadRow;
use crate::models::ThreadModel;

use super::error::{duplicate_thread, map_db_error, map_unique_violation, thread_not_stored};

const SELECT_THREAD: &str = r"
    SELECT id, user_id, channel_id, status, claimed_by, locked, opened_by_staff,
           participants, created_at, updated_at, closed_at, closed_by
    FROM threads
";

/// PostgreSQL implementation of ThreadRepository
#[derive(Clone)]
pub struct PgThreadRepository {
    pool: PgPool,
}

impl PgThreadRepository {
    /// Create a new PgThreadRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, id: Snowflake) -> RepoResult<Option<Thread>> {
        let sql = format!("{SELECT_THREAD} WHERE {clause}");
        let result = sqlx::query_as::<_, ThreadModel>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        result.map(Thread::try_from).transpose()
    }
}

#[async_trait]
impl ThreadRepository for PgThreadRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Thread>> {
        self.fetch_one_where("id = $1", id).await
    }

    #[instrument(skip(self))]
    async fn find_by_channel(&self, channel_id: Snowflake) -> RepoResult<Option<Thread>> {
        self.fetch_one_where("channel_id = $1", channel_id).await
    }

    #[instrument(skip(self))]
    async fn find_open_by_user(&self, user_id: Snowflake) -> RepoResult<Option<Thread>> {
        self.fetch_one_where("user_id = $1 AND status <> 'closed'", user_id)
            .await
    }

    #[instrument(skip(self))]
    async fn list_open(&self) -> RepoResult<Vec<Thread>> {
        let sql = format!("{SELECT_THREAD} WHERE status <> 'closed' ORDER BY created_at");
        let results = sqlx::query_as::<_, ThreadModel>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        results.into_iter().map(Thread::try_from).collect()
    }

    #[instrument(skip(self, thread), fields(thread_id = %thread.id, user_id = %thread.user_id))]
    async fn insert(&self, thread: &Thread) -> RepoResult<()> {
        let row = ThreadRow::new(thread);
        sqlx::query(
            r"
            INSERT INTO threads (id, user_id, channel_id, status, claimed_by, locked,
                                 opened_by_staff, participants, created_at, updated_at,
                                 closed_at, closed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.channel_id)
        .bind(row.status)
        .bind(row.claimed_by)
        .bind(row.locked)
        .bind(row.opened_by_staff)
        .bind(&row.participants)
        .bind(thread.created_at)
        .bind(thread.updated_at)
        .bind(thread.closed_at)
        .bind(row.closed_by)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || duplicate_thread(thread)))?;

        Ok(())
    }

    #[instrument(skip(self, thread), fields(thread_id = %thread.id, status = %thread.status))]
    async fn update(&self, thread: &Thread) -> RepoResult<()> {
        let row = ThreadRow::new(thread);
        let result = sqlx::query(
            r"
            UPDATE threads
            SET status = $2, claimed_by = $3, locked = $4, participants = $5,
                updated_at = $6, closed_at = $7, closed_by = $8
            WHERE id = $1
            ",
        )
        .bind(row.id)
        .bind(row.status)
        .bind(row.claimed_by)
        .bind(row.locked)
        .bind(&row.participants)
        .bind(thread.updated_at)
        .bind(thread.closed_at)
        .bind(row.closed_by)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(thread_not_stored(thread));
        }

        Ok(())
    }

    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
