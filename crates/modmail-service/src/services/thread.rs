//! Thread query service
//!
//! Read-only views over the registry for the API.

use modmail_core::Snowflake;
use tracing::instrument;

use crate::dto::{ReadinessResponse, ThreadResponse};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Thread service
pub struct ThreadService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ThreadService<'a> {
    /// Create a new ThreadService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Every non-closed thread, oldest first
    #[instrument(skip(self))]
    pub async fn list_open(&self) -> ServiceResult<Vec<ThreadResponse>> {
        let threads = self.ctx.registry().list_open().await;
        Ok(threads.iter().map(ThreadResponse::from).collect())
    }

    /// The thread bound to a staff channel
    #[instrument(skip(self))]
    pub async fn get_by_channel(&self, channel_id: Snowflake) -> ServiceResult<ThreadResponse> {
        let thread = self.ctx.registry().resolve_by_channel(channel_id).await?;
        Ok(ThreadResponse::from(thread))
    }

    /// The user's current thread
    #[instrument(skip(self))]
    pub async fn get_by_user(&self, user_id: Snowflake) -> ServiceResult<ThreadResponse> {
        let thread = self.ctx.registry().resolve_by_user(user_id).await?;
        Ok(ThreadResponse::from(thread))
    }

    /// Store reachability plus the size of the working set
    pub async fn readiness(&self) -> ReadinessResponse {
        let store_healthy = self.ctx.repo().ping().await.is_ok();
        let open_threads = self.ctx.registry().open_count();
        ReadinessResponse::ready(store_healthy, open_threads)
    }
}
