//! In-memory fakes for the registry's ports
//!
//! Enabled for this crate's tests and, through the `test-support` feature,
//! for the API crate and the integration tests.

use std::sync::atomic::{AtomicI64, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use modmail_common::ThreadCategories;
use modmail_core::{
    AuditSink, ChannelEdit, DomainError, GuildMember, MessageTarget, NewChannel, ParentUpdate, RemoteChannel,
    Snowflake, SnowflakeGenerator, ThreadEvent, ThreadEventKind, Transport, TransportResult,
};
use modmail_db::MemoryThreadRepository;

use crate::services::{RegistrySettings, ServiceContext, ThreadRegistry};

pub const GUILD_ID: Snowflake = Snowflake::new(1);
pub const STAFF_ROLE_ID: Snowflake = Snowflake::new(5);
pub const ACTIVE_CATEGORY: Snowflake = Snowflake::new(100);
pub const CLAIMED_CATEGORY: Snowflake = Snowflake::new(101);
pub const ARCHIVE_CATEGORY: Snowflake = Snowflake::new(102);

/// Harnesses in one process get distinct generator workers
static NEXT_WORKER: AtomicU16 = AtomicU16::new(0);

/// First channel id handed out by [`RecordingTransport`]
pub const FIRST_CHANNEL_ID: i64 = 10_000;

/// Settings used by the test harness
pub fn test_settings() -> RegistrySettings {
    RegistrySettings {
        guild_id: GUILD_ID,
        categories: ThreadCategories {
            active: ACTIVE_CATEGORY,
            claimed: CLAIMED_CATEGORY,
            archive: Some(ARCHIVE_CATEGORY),
        },
        staff_role_id: Some(STAFF_ROLE_ID),
        reopen_on_message: false,
        transport_timeout: Duration::from_secs(5),
    }
}

/// One call made against the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateChannel(NewChannel),
    EditChannel(Snowflake, ChannelEdit),
    SendMessage(MessageTarget, String),
    ListChannels(Snowflake),
    GuildMember(Snowflake, Snowflake),
}

/// Transport that records every call and mirrors the remote channel list
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    channels: Mutex<Vec<RemoteChannel>>,
    members: Mutex<Vec<GuildMember>>,
    next_id: AtomicI64,
    failing_creates: AtomicUsize,
    failing_lists: AtomicUsize,
    failing_member_lookups: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            members: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(FIRST_CHANNEL_ID),
            failing_creates: AtomicUsize::new(0),
            failing_lists: AtomicUsize::new(0),
            failing_member_lookups: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    /// Fail the next `n` channel creations
    pub fn fail_next_creates(&self, n: usize) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` channel listings
    pub fn fail_next_lists(&self, n: usize) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` member lookups
    pub fn fail_next_member_lookups(&self, n: usize) {
        self.failing_member_lookups.store(n, Ordering::SeqCst);
    }

    /// Sleep before answering every call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn add_remote_channel(&self, channel: RemoteChannel) {
        self.channels.lock().push(channel);
    }

    pub fn remove_remote_channel(&self, channel_id: Snowflake) {
        self.channels.lock().retain(|c| c.id != channel_id);
    }

    pub fn remote_channel(&self, channel_id: Snowflake) -> Option<RemoteChannel> {
        self.channels.lock().iter().find(|c| c.id == channel_id).cloned()
    }

    pub fn add_member(&self, member: GuildMember) {
        self.members.lock().push(member);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn created_channels(&self) -> Vec<NewChannel> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TransportCall::CreateChannel(channel) => Some(channel.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.created_channels().len()
    }

    /// Edits applied to one channel, oldest first
    pub fn edits_of(&self, channel_id: Snowflake) -> Vec<ChannelEdit> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TransportCall::EditChannel(id, edit) if *id == channel_id => Some(edit.clone()),
                _ => None,
            })
            .collect()
    }

    /// Message bodies sent to one target, oldest first
    pub fn messages_to(&self, target: MessageTarget) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TransportCall::SendMessage(t, content) if *t == target => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            // Give other tasks a chance to interleave
            None => tokio::task::yield_now().await,
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn create_channel(&self, channel: &NewChannel) -> TransportResult<Snowflake> {
        self.pause().await;
        self.calls
            .lock()
            .push(TransportCall::CreateChannel(channel.clone()));

        if Self::take_failure(&self.failing_creates) {
            return Err(DomainError::Transport("500 Internal Server Error".into()));
        }

        let id = Snowflake::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.channels.lock().push(RemoteChannel {
            id,
            name: channel.name.clone(),
            parent_id: channel.parent_id,
            topic: channel.topic.clone(),
        });
        Ok(id)
    }

    async fn edit_channel(&self, channel_id: Snowflake, edit: &ChannelEdit) -> TransportResult<()> {
        self.pause().await;
        self.calls
            .lock()
            .push(TransportCall::EditChannel(channel_id, edit.clone()));

        let mut channels = self.channels.lock();
        let channel = channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| DomainError::Transport("404 Unknown Channel".into()))?;

        if let Some(name) = &edit.name {
            channel.name.clone_from(name);
        }
        match edit.parent {
            ParentUpdate::Keep => {}
            ParentUpdate::Set(parent) => channel.parent_id = Some(parent),
            ParentUpdate::Clear => channel.parent_id = None,
        }
        if let Some(topic) = &edit.topic {
            channel.topic = Some(topic.clone());
        }
        Ok(())
    }

    async fn send_message(&self, target: MessageTarget, content: &str) -> TransportResult<()> {
        self.pause().await;
        self.calls
            .lock()
            .push(TransportCall::SendMessage(target, content.to_string()));
        Ok(())
    }

    async fn list_guild_channels(&self, guild_id: Snowflake) -> TransportResult<Vec<RemoteChannel>> {
        self.pause().await;
        self.calls.lock().push(TransportCall::ListChannels(guild_id));

        if Self::take_failure(&self.failing_lists) {
            return Err(DomainError::Transport("503 Service Unavailable".into()));
        }
        Ok(self.channels.lock().clone())
    }

    async fn guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> TransportResult<Option<GuildMember>> {
        self.pause().await;
        self.calls
            .lock()
            .push(TransportCall::GuildMember(guild_id, user_id));

        if Self::take_failure(&self.failing_member_lookups) {
            return Err(DomainError::Transport("503 Service Unavailable".into()));
        }
        Ok(self
            .members
            .lock()
            .iter()
            .find(|m| m.user_id == user_id)
            .cloned())
    }
}

/// Audit sink keeping every event in memory
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<ThreadEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ThreadEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ThreadEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &ThreadEvent) {
        self.events.lock().push(event.clone());
    }
}

/// A service context wired to in-memory fakes
pub struct TestHarness {
    pub ctx: ServiceContext,
    pub repo: Arc<MemoryThreadRepository>,
    pub transport: Arc<RecordingTransport>,
    pub audit: Arc<MemoryAuditSink>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: RegistrySettings) -> Self {
        Self::with_repo(settings, Arc::new(MemoryThreadRepository::new()))
    }

    /// Harness over an existing store, e.g. to simulate a restart
    pub fn with_repo(settings: RegistrySettings, repo: Arc<MemoryThreadRepository>) -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let audit = Arc::new(MemoryAuditSink::new());
        Self::assemble(settings, repo, transport, audit)
    }

    /// Harness sharing the store and remote channels of another one
    pub fn restarted(&self) -> Self {
        Self::assemble(
            self.ctx.registry().settings().clone(),
            Arc::clone(&self.repo),
            Arc::clone(&self.transport),
            Arc::new(MemoryAuditSink::new()),
        )
    }

    fn assemble(
        settings: RegistrySettings,
        repo: Arc<MemoryThreadRepository>,
        transport: Arc<RecordingTransport>,
        audit: Arc<MemoryAuditSink>,
    ) -> Self {
        let worker = NEXT_WORKER.fetch_add(1, Ordering::SeqCst) % 1024;
        let registry = ThreadRegistry::new(
            settings,
            repo.clone(),
            transport.clone(),
            audit.clone(),
            Arc::new(SnowflakeGenerator::new(worker)),
        );
        let ctx = ServiceContext::new(Arc::new(registry), repo.clone(), "?");

        Self {
            ctx,
            repo,
            transport,
            audit,
        }
    }

    pub fn registry(&self) -> Arc<ThreadRegistry> {
        self.ctx.registry_handle()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
