//! Startup reconciliation
//!
//! Rebuilds the registry from the durable store, then squares it with the
//! channels that actually exist on the staff server.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use modmail_core::{DomainError, OpenedBy, RemoteChannel, Thread, ThreadStatus, ThreadTopic};

use super::registry::ThreadRegistry;

/// Counts of what reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Open threads loaded from the store
    pub loaded: usize,
    /// Threads rebuilt from channel metadata
    pub adopted: usize,
    /// Stored threads closed because their channel is gone
    pub closed_missing: usize,
}

impl ThreadRegistry {
    /// Load stored threads, adopt orphaned thread channels, and close threads
    /// whose channel was deleted.
    ///
    /// # Errors
    /// Fails if the store cannot be read or the channel listing fails twice.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, DomainError> {
        let mut report = ReconcileReport::default();

        for thread in self.repo().list_open().await? {
            if self.load(thread).await {
                report.loaded += 1;
            }
        }

        let channels = self.remote_channels().await?;

        for channel in &channels {
            let Some(thread) = self.orphan_thread(channel).await? else {
                continue;
            };
            if self.adopt(thread).await {
                report.adopted += 1;
            }
        }

        for thread in self.list_open().await {
            if channels.iter().any(|c| c.id == thread.channel_id) {
                continue;
            }
            if self.close_missing(&thread).await {
                report.closed_missing += 1;
            }
        }

        info!(
            loaded = report.loaded,
            adopted = report.adopted,
            closed_missing = report.closed_missing,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Listing channels is idempotent, so one retry is safe
    async fn remote_channels(&self) -> Result<Vec<RemoteChannel>, DomainError> {
        let guild_id = self.settings().guild_id;
        match self.call(self.transport().list_guild_channels(guild_id)).await {
            Ok(channels) => Ok(channels),
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Listing guild channels failed, retrying once");
                self.call(self.transport().list_guild_channels(guild_id)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuild the thread a channel describes, if nothing tracks it yet
    async fn orphan_thread(&self, channel: &RemoteChannel) -> Result<Option<Thread>, DomainError> {
        if self.knows_channel(channel.id) {
            return Ok(None);
        }
        let Some(topic) = channel.topic.as_deref().and_then(ThreadTopic::parse) else {
            return Ok(None);
        };
        if channel.name != Thread::channel_name(topic.user_id) {
            return Ok(None);
        }
        if self.resolve_by_user(topic.user_id).await.is_ok() {
            return Ok(None);
        }
        // Known to the store under another status (closed, most likely)
        if self.repo().find_by_id(topic.thread_id).await?.is_some() {
            return Ok(None);
        }

        Ok(Some(self.thread_from_channel(channel, topic)))
    }

    fn thread_from_channel(&self, channel: &RemoteChannel, topic: ThreadTopic) -> Thread {
        let mut thread = Thread::open(
            topic.thread_id,
            topic.user_id,
            channel.id,
            OpenedBy::UserMessage,
        );

        if let Some(staff_id) = topic.claimed_by {
            thread.status = ThreadStatus::Claimed;
            thread.claimed_by = Some(staff_id);
        } else if channel.parent_id.is_some()
            && channel.parent_id == self.settings().categories.archive
        {
            thread.status = ThreadStatus::Archived;
        }

        // Overwrites are derived from these, so they must survive adoption
        thread.locked = topic.locked;
        thread.participants = topic.participants;

        let created_at = DateTime::<Utc>::from_timestamp_millis(topic.thread_id.timestamp());
        if let Some(created_at) = created_at {
            thread.created_at = created_at;
        }
        thread
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        test_settings, TestHarness, ARCHIVE_CATEGORY, CLAIMED_CATEGORY, GUILD_ID, STAFF_ROLE_ID,
    };
    use modmail_core::{
        thread_overwrites, MessageTarget, Snowflake, SnowflakeGenerator, ThreadEventKind,
        ThreadRepository,
    };

    const STAFF: Snowflake = Snowflake::new(7);

    fn orphan(
        ids: &SnowflakeGenerator,
        channel_id: i64,
        user_id: i64,
        claimed_by: Option<Snowflake>,
    ) -> (RemoteChannel, Snowflake) {
        let thread_id = ids.generate();
        let user_id = Snowflake::new(user_id);
        let channel = RemoteChannel {
            id: Snowflake::new(channel_id),
            name: Thread::channel_name(user_id),
            parent_id: Some(CLAIMED_CATEGORY),
            topic: Some(
                ThreadTopic {
                    claimed_by,
                    ..ThreadTopic::new(user_id, thread_id)
                }
                .render(),
            ),
        };
        (channel, thread_id)
    }

    #[tokio::test]
    async fn test_restart_loads_stored_threads() {
        let before = TestHarness::new();
        let thread = before.registry().route_inbound(Snowflake::new(42), "hi").await.unwrap().thread;
        before.registry().claim(thread.channel_id, STAFF).await.unwrap();

        let after = before.restarted();
        let report = after.registry().reconcile().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                loaded: 1,
                adopted: 0,
                closed_missing: 0
            }
        );

        let restored = after.registry().resolve_by_user(Snowflake::new(42)).await.unwrap();
        assert_eq!(restored.status, ThreadStatus::Claimed);
        assert_eq!(restored.claimed_by, Some(STAFF));

        // Routing continues in the same channel
        let delivery = after.registry().route_inbound(Snowflake::new(42), "still there?").await.unwrap();
        assert!(!delivery.opened);
        assert_eq!(delivery.thread.channel_id, thread.channel_id);
    }

    #[tokio::test]
    async fn test_adopts_orphaned_channels() {
        let h = TestHarness::new();
        let ids = SnowflakeGenerator::new(900);
        let (claimed, claimed_id) = orphan(&ids, 500, 42, Some(STAFF));
        let (mut archived, _) = orphan(&ids, 501, 43, None);
        archived.parent_id = Some(ARCHIVE_CATEGORY);
        h.transport.add_remote_channel(claimed);
        h.transport.add_remote_channel(archived);
        h.transport.add_remote_channel(RemoteChannel {
            id: Snowflake::new(502),
            name: "general".into(),
            parent_id: None,
            topic: Some("Welcome!".into()),
        });

        let report = h.registry().reconcile().await.unwrap();
        assert_eq!(report.adopted, 2);

        let thread = h.registry().resolve_by_channel(Snowflake::new(500)).await.unwrap();
        assert_eq!(thread.id, claimed_id);
        assert_eq!(thread.status, ThreadStatus::Claimed);
        assert_eq!(thread.claimed_by, Some(STAFF));
        assert!(thread.is_consistent());

        let thread = h.registry().resolve_by_user(Snowflake::new(43)).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Archived);

        assert!(h.repo.find_by_id(claimed_id).await.unwrap().is_some());
        assert!(h.audit.kinds().iter().all(|k| *k == ThreadEventKind::Adopted));
        assert!(h.registry().resolve_by_channel(Snowflake::new(502)).await.is_err());
    }

    #[tokio::test]
    async fn test_closes_threads_with_missing_channel() {
        let before = TestHarness::new();
        let thread = before.registry().route_inbound(Snowflake::new(42), "hi").await.unwrap().thread;
        before.transport.remove_remote_channel(thread.channel_id);

        let after = before.restarted();
        let report = after.registry().reconcile().await.unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.closed_missing, 1);

        let stored = after.repo.find_by_id(thread.id).await.unwrap().unwrap();
        assert!(stored.is_closed());
        assert!(after.registry().resolve_by_user(Snowflake::new(42)).await.is_err());
        // The user is not told about a cleanup
        assert_eq!(after.transport.messages_to(MessageTarget::User(Snowflake::new(42))).len(), 1);
    }

    #[tokio::test]
    async fn test_listing_is_retried_once() {
        let h = TestHarness::new();
        h.transport.fail_next_lists(1);
        assert!(h.registry().reconcile().await.is_ok());

        let h = TestHarness::with_settings(test_settings());
        h.transport.fail_next_lists(2);
        assert!(h.registry().reconcile().await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let h = TestHarness::new();
        let (channel, _) = orphan(&SnowflakeGenerator::new(900), 500, 42, None);
        h.transport.add_remote_channel(channel);

        assert_eq!(h.registry().reconcile().await.unwrap().adopted, 1);
        assert_eq!(h.registry().reconcile().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_adoption_keeps_lock_and_participants() {
        let before = TestHarness::new();
        let channel = before
            .registry()
            .route_inbound(Snowflake::new(42), "hi")
            .await
            .unwrap()
            .thread
            .channel_id;
        before
            .registry()
            .add_participant(channel, Snowflake::new(99), STAFF)
            .await
            .unwrap();
        before.registry().lock(channel, STAFF).await.unwrap();

        // Same remote channel, but the store is gone
        let after = TestHarness::new();
        after
            .transport
            .add_remote_channel(before.transport.remote_channel(channel).unwrap());
        assert_eq!(after.registry().reconcile().await.unwrap().adopted, 1);

        let adopted = after.registry().resolve_by_channel(channel).await.unwrap();
        assert!(adopted.locked);
        assert_eq!(adopted.participants, vec![Snowflake::new(99)]);

        after
            .registry()
            .add_participant(channel, Snowflake::new(55), STAFF)
            .await
            .unwrap();
        let overwrites = after.transport.edits_of(channel).pop().unwrap().overwrites.unwrap();
        assert_eq!(
            overwrites,
            thread_overwrites(
                GUILD_ID,
                Some(STAFF_ROLE_ID),
                &[Snowflake::new(99), Snowflake::new(55)],
                true
            )
        );
    }
}
