//! Thread registry
//!
//! Owns the lifecycle of every thread. Two views are kept over the same data:
//! a slot per user holding that user's current (non-closed) thread, and an
//! append-only `channel -> user` pointer map used to resolve staff actions.
//! The thread record itself lives only in the user's slot.
//!
//! Every mutation for a user runs under that user's slot mutex, remote calls
//! included, so racing opens create one channel and messages keep their
//! arrival order. Unrelated users never contend. Each transition is applied
//! to a copy, pushed to the transport, and only then committed to memory and
//! written through to the store.
//!
//! Committed threads are mirrored into a lock-free snapshot map. Reads are
//! served from it and never wait on a slot held across a remote call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use modmail_common::{AppConfig, ThreadCategories};
use modmail_core::{
    thread_overwrites, AuditSink, ChannelEdit, DomainError, GuildMember, MessageTarget, NewChannel,
    OpenedBy, Snowflake, SnowflakeGenerator, Thread, ThreadEvent, ThreadEventKind,
    ThreadRepository, ThreadTopic, Transport, TransportResult,
};

/// Longest message body accepted from users and staff
pub const MAX_CONTENT_LEN: usize = 2000;

type Slot = Arc<Mutex<Option<Thread>>>;

/// Static settings of a registry
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Staff guild hosting the thread channels
    pub guild_id: Snowflake,
    pub categories: ThreadCategories,
    pub staff_role_id: Option<Snowflake>,
    /// Move archived threads back to active when the user writes again
    pub reopen_on_message: bool,
    /// Upper bound for every transport call
    pub transport_timeout: Duration,
}

impl RegistrySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            guild_id: config.discord.staff_guild_id,
            categories: config.modmail.categories,
            staff_role_id: config.discord.staff_role_id,
            reopen_on_message: config.modmail.reopen_on_message,
            transport_timeout: config.discord.transport_timeout,
        }
    }
}

/// Outcome of routing an inbound user message
#[derive(Debug, Clone)]
pub struct Delivery {
    pub thread: Thread,
    /// A new thread (and channel) was created for this message
    pub opened: bool,
}

/// A thread resolved from its channel. `guard` holds the user's slot while
/// the thread is live; closed threads come from the store without a guard.
struct Bound {
    guard: Option<OwnedMutexGuard<Option<Thread>>>,
    thread: Thread,
}

/// Thread lifecycle state machine keyed by user
pub struct ThreadRegistry {
    settings: RegistrySettings,
    repo: Arc<dyn ThreadRepository>,
    transport: Arc<dyn Transport>,
    audit: Arc<dyn AuditSink>,
    ids: Arc<SnowflakeGenerator>,
    slots: DashMap<Snowflake, Slot>,
    channels: DashMap<Snowflake, Snowflake>,
    /// Last committed non-closed thread per user
    snapshot: DashMap<Snowflake, Thread>,
}

impl ThreadRegistry {
    pub fn new(
        settings: RegistrySettings,
        repo: Arc<dyn ThreadRepository>,
        transport: Arc<dyn Transport>,
        audit: Arc<dyn AuditSink>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            settings,
            repo,
            transport,
            audit,
            ids,
            slots: DashMap::new(),
            channels: DashMap::new(),
            snapshot: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub(crate) fn repo(&self) -> &dyn ThreadRepository {
        self.repo.as_ref()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Whether a channel has ever been bound to a thread in this process
    pub fn knows_channel(&self, channel_id: Snowflake) -> bool {
        self.channels.contains_key(&channel_id)
    }

    // =========================================================================
    // Opening and routing
    // =========================================================================

    /// Return the user's routable thread, creating one if there is none.
    ///
    /// A staff open for a user who already has a non-closed thread fails with
    /// `DuplicateThread`.
    #[instrument(skip(self))]
    pub async fn open_thread(
        &self,
        user_id: Snowflake,
        opened_by: OpenedBy,
    ) -> Result<Thread, DomainError> {
        let mut slot = self.slot(user_id).lock_owned().await;
        self.hydrate(&mut slot, user_id).await?;

        if opened_by.staff_id().is_some() {
            if let Some(current) = slot.as_ref() {
                return Err(DomainError::DuplicateThread {
                    user_id,
                    channel_id: current.channel_id,
                });
            }
        }

        let (thread, _) = self.routable_thread(&mut slot, user_id, opened_by).await?;
        Ok(thread)
    }

    /// Forward a direct message from a user into their thread channel
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn route_inbound(
        &self,
        user_id: Snowflake,
        content: &str,
    ) -> Result<Delivery, DomainError> {
        validate_content(content)?;

        let mut slot = self.slot(user_id).lock_owned().await;
        self.hydrate(&mut slot, user_id).await?;
        let (thread, opened) = self
            .routable_thread(&mut slot, user_id, OpenedBy::UserMessage)
            .await?;

        self.call(self.transport.send_message(
            MessageTarget::Channel(thread.channel_id),
            &format!("**<@{user_id}>:** {content}"),
        ))
        .await?;

        debug!(thread_id = %thread.id, channel_id = %thread.channel_id, "Message forwarded");
        Ok(Delivery { thread, opened })
    }

    async fn routable_thread(
        &self,
        slot: &mut Option<Thread>,
        user_id: Snowflake,
        opened_by: OpenedBy,
    ) -> Result<(Thread, bool), DomainError> {
        match slot.as_ref().cloned() {
            Some(current) if current.status.routes_user_messages() => Ok((current, false)),
            Some(archived) if self.settings.reopen_on_message => {
                let thread = self.reopen(slot, archived).await?;
                Ok((thread, false))
            }
            Some(archived) => Ok((archived, false)),
            None => {
                let thread = self.create(slot, user_id, opened_by).await?;
                Ok((thread, true))
            }
        }
    }

    /// Fill an empty slot from the store. Covers users whose thread was
    /// never loaded into memory, e.g. after a failed reconciliation.
    async fn hydrate(&self, slot: &mut Option<Thread>, user_id: Snowflake) -> Result<(), DomainError> {
        if slot.is_some() {
            return Ok(());
        }
        let Some(stored) = self.repo.find_open_by_user(user_id).await? else {
            return Ok(());
        };

        debug!(%user_id, channel_id = %stored.channel_id, "Open thread loaded from the store");
        self.channels.entry(stored.channel_id).or_insert(user_id);
        self.install(slot, stored);
        Ok(())
    }

    async fn create(
        &self,
        slot: &mut Option<Thread>,
        user_id: Snowflake,
        opened_by: OpenedBy,
    ) -> Result<Thread, DomainError> {
        let id = self.ids.generate();
        let topic = ThreadTopic::new(user_id, id);
        let request = NewChannel {
            guild_id: self.settings.guild_id,
            name: Thread::channel_name(user_id),
            parent_id: Some(self.settings.categories.active),
            topic: Some(topic.render()),
            overwrites: thread_overwrites(
                self.settings.guild_id,
                self.settings.staff_role_id,
                &[],
                false,
            ),
        };

        // Nothing is recorded unless the channel exists
        let channel_id = self
            .call(self.transport.create_channel(&request))
            .await
            .inspect_err(|e| warn!(%user_id, error = %e, "Thread channel creation failed"))?;

        let thread = Thread::open(id, user_id, channel_id, opened_by);
        if let Err(e) = self.repo.insert(&thread).await {
            warn!(thread_id = %id, error = %e, "Failed to persist new thread");
        }
        self.channels.entry(channel_id).or_insert(user_id);
        self.install(slot, thread.clone());

        info!(%user_id, %channel_id, thread_id = %id, "Thread opened");

        let notice = match opened_by {
            OpenedBy::UserMessage => {
                format!("New ModMail thread from <@{user_id}> ({user_id}).")
            }
            OpenedBy::Staff(staff_id) => {
                format!("ModMail thread opened for <@{user_id}> by <@{staff_id}>.")
            }
        };
        self.notify(MessageTarget::Channel(channel_id), &notice).await;
        if opened_by == OpenedBy::UserMessage {
            self.notify(
                MessageTarget::User(user_id),
                "Your message has been sent to the staff team. Replies will arrive here.",
            )
            .await;
        }

        self.record(ThreadEvent::new(
            ThreadEventKind::Opened,
            &thread,
            opened_by.actor(user_id),
        ))
        .await;
        Ok(thread)
    }

    async fn reopen(&self, slot: &mut Option<Thread>, archived: Thread) -> Result<Thread, DomainError> {
        let mut next = archived;
        next.unarchive()?;

        let edit = ChannelEdit::new().parent(Some(self.settings.categories.active));
        self.call(self.transport.edit_channel(next.channel_id, &edit))
            .await?;
        let thread = self.commit_slot(slot, next).await;

        info!(thread_id = %thread.id, "Archived thread reopened by user message");
        self.notify(
            MessageTarget::Channel(thread.channel_id),
            "Thread reopened by a new message from the user.",
        )
        .await;
        self.record(ThreadEvent::new(ThreadEventKind::Unarchived, &thread, thread.user_id))
            .await;
        Ok(thread)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// The thread bound to a channel, closed threads included
    #[instrument(skip(self))]
    pub async fn resolve_by_channel(&self, channel_id: Snowflake) -> Result<Thread, DomainError> {
        Ok(self.bind(channel_id).await?.thread)
    }

    /// The user's non-closed thread, as last committed
    #[instrument(skip(self))]
    pub async fn resolve_by_user(&self, user_id: Snowflake) -> Result<Thread, DomainError> {
        self.snapshot
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or(DomainError::UserThreadNotFound(user_id))
    }

    /// Snapshot of every non-closed thread, oldest first
    pub async fn list_open(&self) -> Vec<Thread> {
        let mut threads: Vec<Thread> = self
            .snapshot
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        threads.sort_by_key(|t| t.created_at);
        threads
    }

    /// Number of non-closed threads
    pub fn open_count(&self) -> usize {
        self.snapshot.len()
    }

    /// The user's membership of the staff server; one retry, the lookup is idempotent
    #[instrument(skip(self))]
    pub async fn member_info(&self, user_id: Snowflake) -> Result<Option<GuildMember>, DomainError> {
        let guild_id = self.settings.guild_id;
        match self.call(self.transport.guild_member(guild_id, user_id)).await {
            Ok(member) => Ok(member),
            Err(e) if e.is_transport() => {
                warn!(%user_id, error = %e, "Member lookup failed, retrying once");
                self.call(self.transport.guild_member(guild_id, user_id)).await
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Staff transitions
    // =========================================================================

    /// `Active -> Claimed`
    #[instrument(skip(self))]
    pub async fn claim(&self, channel_id: Snowflake, staff_id: Snowflake) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        if !next.claim(staff_id)? {
            return Ok(next);
        }

        let edit = ChannelEdit::new()
            .parent(Some(self.settings.categories.claimed))
            .topic(next.topic().render());
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, %staff_id, "Thread claimed");
        self.notify(
            MessageTarget::Channel(channel_id),
            &format!("Thread claimed by <@{staff_id}>."),
        )
        .await;
        self.record(ThreadEvent::new(ThreadEventKind::Claimed, &thread, staff_id))
            .await;
        Ok(thread)
    }

    /// Make the channel staff-only for sending
    #[instrument(skip(self))]
    pub async fn lock(&self, channel_id: Snowflake, staff_id: Snowflake) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        if !next.lock()? {
            return Ok(next);
        }

        let edit = ChannelEdit::new()
            .topic(next.topic().render())
            .overwrites(self.overwrites_for(&next));
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, %staff_id, "Thread locked");
        self.notify(
            MessageTarget::Channel(channel_id),
            "Thread locked. Only staff can send messages here.",
        )
        .await;
        self.record(ThreadEvent::new(ThreadEventKind::Locked, &thread, staff_id))
            .await;
        Ok(thread)
    }

    /// `Active | Claimed -> Archived`
    #[instrument(skip(self))]
    pub async fn archive(&self, channel_id: Snowflake, staff_id: Snowflake) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        if !next.archive()? {
            return Ok(next);
        }

        // The claim tag leaves the topic together with the claim
        let edit = ChannelEdit::new()
            .parent_if_set(self.settings.categories.archive)
            .topic(next.topic().render());
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, %staff_id, "Thread archived");
        self.record(ThreadEvent::new(ThreadEventKind::Archived, &thread, staff_id))
            .await;
        Ok(thread)
    }

    /// `Archived -> Active`
    #[instrument(skip(self))]
    pub async fn unarchive(&self, channel_id: Snowflake, staff_id: Snowflake) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        next.unarchive()?;

        let edit = ChannelEdit::new().parent(Some(self.settings.categories.active));
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, %staff_id, "Thread unarchived");
        self.record(ThreadEvent::new(ThreadEventKind::Unarchived, &thread, staff_id))
            .await;
        Ok(thread)
    }

    /// Grant another user access to the thread channel
    #[instrument(skip(self))]
    pub async fn add_participant(
        &self,
        channel_id: Snowflake,
        member_id: Snowflake,
        added_by: Snowflake,
    ) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        if !next.add_participant(member_id)? {
            return Ok(next);
        }

        let edit = ChannelEdit::new()
            .topic(next.topic().render())
            .overwrites(self.overwrites_for(&next));
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, %member_id, %added_by, "Participant added");
        self.notify(
            MessageTarget::User(member_id),
            &format!("You were added to a ModMail thread by <@{added_by}>: <#{channel_id}>"),
        )
        .await;
        self.notify(
            MessageTarget::Channel(channel_id),
            &format!("<@{member_id}> was added by <@{added_by}>."),
        )
        .await;
        self.record(
            ThreadEvent::new(ThreadEventKind::ParticipantAdded, &thread, added_by)
                .with_subject(member_id),
        )
        .await;
        Ok(thread)
    }

    /// Close the thread. Closing a closed thread succeeds without side effects.
    #[instrument(skip(self))]
    pub async fn close(&self, channel_id: Snowflake, closed_by: Snowflake) -> Result<Thread, DomainError> {
        let mut bound = self.bind(channel_id).await?;
        let mut next = bound.thread.clone();
        if !next.close(closed_by) {
            return Ok(next);
        }

        let edit = ChannelEdit::new()
            .name(Thread::closed_channel_name(next.user_id))
            .clear_parent();
        self.call(self.transport.edit_channel(channel_id, &edit))
            .await?;
        let thread = self.commit(&mut bound, next).await;

        info!(%channel_id, user_id = %thread.user_id, %closed_by, "Thread closed");
        self.notify(
            MessageTarget::User(thread.user_id),
            "Your ModMail thread has been closed by staff. Send another message to open a new one.",
        )
        .await;
        self.notify(
            MessageTarget::Channel(channel_id),
            &format!("Thread closed by <@{closed_by}>."),
        )
        .await;
        self.record(ThreadEvent::new(ThreadEventKind::Closed, &thread, closed_by))
            .await;
        Ok(thread)
    }

    /// Send a staff reply to the thread's user
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn reply(
        &self,
        channel_id: Snowflake,
        staff_id: Snowflake,
        content: &str,
    ) -> Result<Thread, DomainError> {
        validate_content(content)?;

        // Held until the message is out so replies keep their order
        let bound = self.bind(channel_id).await?;
        bound.thread.ensure_open("reply to")?;

        self.call(self.transport.send_message(
            MessageTarget::User(bound.thread.user_id),
            &format!("**Staff:** {content}"),
        ))
        .await?;

        debug!(%channel_id, %staff_id, "Reply delivered");
        Ok(bound.thread)
    }

    // =========================================================================
    // Reconciliation hooks
    // =========================================================================

    /// Put a stored thread into memory. Returns `false` if the user already
    /// has a live thread or the thread is closed.
    pub(crate) async fn load(&self, thread: Thread) -> bool {
        if thread.is_closed() {
            return false;
        }

        let mut slot = self.slot(thread.user_id).lock_owned().await;
        if let Some(current) = slot.as_ref() {
            if current.id != thread.id {
                warn!(
                    user_id = %thread.user_id,
                    kept = %current.channel_id,
                    ignored = %thread.channel_id,
                    "User has more than one open thread; keeping the first"
                );
            }
            return false;
        }

        self.channels.entry(thread.channel_id).or_insert(thread.user_id);
        self.install(&mut slot, thread);
        true
    }

    /// Load a thread rebuilt from channel metadata and persist it
    pub(crate) async fn adopt(&self, thread: Thread) -> bool {
        if !self.load(thread.clone()).await {
            return false;
        }
        if let Err(e) = self.repo.insert(&thread).await {
            warn!(thread_id = %thread.id, error = %e, "Failed to persist adopted thread");
        }
        info!(user_id = %thread.user_id, channel_id = %thread.channel_id, "Thread adopted");
        self.record(ThreadEvent::new(
            ThreadEventKind::Adopted,
            &thread,
            self.system_actor(),
        ))
        .await;
        true
    }

    /// Close a live thread whose channel no longer exists. No remote calls.
    pub(crate) async fn close_missing(&self, thread: &Thread) -> bool {
        let mut slot = self.slot(thread.user_id).lock_owned().await;
        let Some(mut next) = slot.as_ref().cloned().filter(|t| t.id == thread.id) else {
            return false;
        };
        next.close(self.system_actor());
        let closed = self.commit_slot(&mut slot, next).await;

        warn!(thread_id = %closed.id, channel_id = %closed.channel_id, "Closed thread with missing channel");
        self.record(ThreadEvent::new(
            ThreadEventKind::Closed,
            &closed,
            self.system_actor(),
        ))
        .await;
        true
    }

    /// Actor recorded for transitions made by the registry itself
    fn system_actor(&self) -> Snowflake {
        self.settings.guild_id
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn slot(&self, user_id: Snowflake) -> Slot {
        Arc::clone(self.slots.entry(user_id).or_default().value())
    }

    /// Resolve a channel and take its user's slot
    async fn bind(&self, channel_id: Snowflake) -> Result<Bound, DomainError> {
        let user_id = self.channels.get(&channel_id).map(|entry| *entry.value());
        let Some(user_id) = user_id else {
            return self.bind_from_store(channel_id).await;
        };

        let guard = self.slot(user_id).lock_owned().await;
        let live = guard.as_ref().cloned().filter(|t| t.channel_id == channel_id);
        if let Some(thread) = live {
            return Ok(Bound {
                guard: Some(guard),
                thread,
            });
        }
        drop(guard);

        // The channel belongs to one of the user's closed threads
        let thread = self.stored_thread(channel_id).await?;
        Ok(Bound {
            guard: None,
            thread,
        })
    }

    /// Channel unknown to this process; consult the store
    async fn bind_from_store(&self, channel_id: Snowflake) -> Result<Bound, DomainError> {
        let thread = self.stored_thread(channel_id).await?;
        if thread.is_closed() {
            return Ok(Bound {
                guard: None,
                thread,
            });
        }

        let mut guard = self.slot(thread.user_id).lock_owned().await;
        match guard.as_ref().cloned() {
            None => {
                self.channels.entry(channel_id).or_insert(thread.user_id);
                self.install(&mut guard, thread.clone());
                Ok(Bound {
                    guard: Some(guard),
                    thread,
                })
            }
            Some(current) if current.channel_id == channel_id => Ok(Bound {
                guard: Some(guard),
                thread: current,
            }),
            Some(current) => Err(DomainError::InternalError(format!(
                "channel {channel_id} is stored as open but user {} is live in {}",
                thread.user_id, current.channel_id
            ))),
        }
    }

    async fn stored_thread(&self, channel_id: Snowflake) -> Result<Thread, DomainError> {
        self.repo
            .find_by_channel(channel_id)
            .await?
            .ok_or(DomainError::ThreadNotFound(channel_id))
    }

    async fn commit(&self, bound: &mut Bound, next: Thread) -> Thread {
        match bound.guard.as_deref_mut() {
            Some(slot) => self.commit_slot(slot, next).await,
            None => {
                self.persist(&next).await;
                next
            }
        }
    }

    /// Install `next` as the user's current thread and write it through
    async fn commit_slot(&self, slot: &mut Option<Thread>, next: Thread) -> Thread {
        self.persist(&next).await;
        if next.is_closed() {
            *slot = None;
            self.snapshot.remove(&next.user_id);
        } else {
            self.install(slot, next.clone());
        }
        next
    }

    /// Make `thread` the user's current thread in the slot and the snapshot
    fn install(&self, slot: &mut Option<Thread>, thread: Thread) {
        self.snapshot.insert(thread.user_id, thread.clone());
        *slot = Some(thread);
    }

    async fn persist(&self, thread: &Thread) {
        if let Err(e) = self.repo.update(thread).await {
            warn!(thread_id = %thread.id, status = %thread.status, error = %e, "Failed to persist thread update");
        }
    }

    fn overwrites_for(&self, thread: &Thread) -> Vec<modmail_core::PermissionOverwrite> {
        thread_overwrites(
            self.settings.guild_id,
            self.settings.staff_role_id,
            &thread.participants,
            thread.locked,
        )
    }

    /// Run a transport call under the configured timeout
    pub(crate) async fn call<T, F>(&self, operation: F) -> Result<T, DomainError>
    where
        F: Future<Output = TransportResult<T>>,
    {
        let limit = self.settings.transport_timeout;
        tokio::time::timeout(limit, operation)
            .await
            .unwrap_or_else(|_| Err(DomainError::TransportTimeout(limit)))
    }

    /// Best-effort message; failures are logged
    async fn notify(&self, target: MessageTarget, content: &str) {
        if let Err(e) = self.call(self.transport.send_message(target, content)).await {
            warn!(?target, error = %e, "Failed to deliver notification");
        }
    }

    async fn record(&self, event: ThreadEvent) {
        self.audit.record(&event).await;
    }
}

impl std::fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("settings", &self.settings)
            .field("users", &self.slots.len())
            .field("open", &self.snapshot.len())
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

fn validate_content(content: &str) -> Result<(), DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::ValidationError(
            "message content is empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(DomainError::ContentTooLong {
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        TestHarness, TransportCall, ACTIVE_CATEGORY, ARCHIVE_CATEGORY, CLAIMED_CATEGORY,
    };
    use modmail_core::{ParentUpdate, Permissions, ThreadStatus};

    const USER: Snowflake = Snowflake::new(42);
    const STAFF: Snowflake = Snowflake::new(7);
    const OTHER_STAFF: Snowflake = Snowflake::new(8);

    #[tokio::test]
    async fn test_first_message_opens_thread() {
        let h = TestHarness::new();

        let delivery = h.registry().route_inbound(USER, "hello").await.unwrap();
        assert!(delivery.opened);
        assert_eq!(delivery.thread.status, ThreadStatus::Active);

        let created = h.transport.created_channels();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "modmail-42");
        assert_eq!(created[0].parent_id, Some(ACTIVE_CATEGORY));

        let topic = ThreadTopic::parse(created[0].topic.as_deref().unwrap()).unwrap();
        assert_eq!(topic.user_id, USER);
        assert_eq!(topic.thread_id, delivery.thread.id);

        let dms = h.transport.messages_to(MessageTarget::User(USER));
        assert_eq!(dms.len(), 1);
        assert!(dms[0].contains("sent to the staff team"));

        let posted = h.transport.messages_to(MessageTarget::Channel(delivery.thread.channel_id));
        assert!(posted.last().unwrap().ends_with("hello"));
        assert_eq!(h.audit.kinds(), vec![ThreadEventKind::Opened]);
    }

    #[tokio::test]
    async fn test_concurrent_opens_create_one_channel() {
        let h = TestHarness::new();
        let registry = h.registry();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.open_thread(USER, OpenedBy::UserMessage).await })
            })
            .collect();

        let mut channels = Vec::new();
        for task in tasks {
            channels.push(task.await.unwrap().unwrap().channel_id);
        }

        assert_eq!(h.transport.create_count(), 1);
        assert!(channels.iter().all(|c| *c == channels[0]));
    }

    #[tokio::test]
    async fn test_messages_keep_order() {
        let h = TestHarness::new();
        let registry = h.registry();

        let (a, b, c) = tokio::join!(
            registry.route_inbound(USER, "m1"),
            registry.route_inbound(USER, "m2"),
            registry.route_inbound(USER, "m3"),
        );
        let channel = a.unwrap().thread.channel_id;
        b.unwrap();
        c.unwrap();

        let forwarded: Vec<String> = h
            .transport
            .messages_to(MessageTarget::Channel(channel))
            .into_iter()
            .filter(|m| m.starts_with("**<@42>:**"))
            .collect();
        assert_eq!(
            forwarded,
            vec!["**<@42>:** m1", "**<@42>:** m2", "**<@42>:** m3"]
        );
        assert_eq!(h.transport.create_count(), 1);
    }

    #[tokio::test]
    async fn test_staff_open_for_user_with_thread_is_duplicate() {
        let h = TestHarness::new();
        let thread = h.registry().route_inbound(USER, "hi").await.unwrap().thread;

        let err = h
            .registry()
            .open_thread(USER, OpenedBy::Staff(STAFF))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::DuplicateThread { channel_id, .. } if channel_id == thread.channel_id
        ));
    }

    #[tokio::test]
    async fn test_staff_open_does_not_dm_user() {
        let h = TestHarness::new();
        let thread = h
            .registry()
            .open_thread(USER, OpenedBy::Staff(STAFF))
            .await
            .unwrap();

        assert_eq!(thread.opened_by, OpenedBy::Staff(STAFF));
        assert!(h.transport.messages_to(MessageTarget::User(USER)).is_empty());
        assert_eq!(h.audit.events()[0].actor, STAFF);
    }

    #[tokio::test]
    async fn test_claim_is_idempotent_for_same_staff() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;

        let claimed = h.registry().claim(channel, STAFF).await.unwrap();
        assert_eq!(claimed.status, ThreadStatus::Claimed);
        assert_eq!(claimed.claimed_by, Some(STAFF));

        let edits = h.transport.edits_of(channel);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].parent, ParentUpdate::Set(CLAIMED_CATEGORY));
        assert!(edits[0].topic.as_deref().unwrap().ends_with("claimed:7"));

        let again = h.registry().claim(channel, STAFF).await.unwrap();
        assert_eq!(again.claimed_by, Some(STAFF));
        assert_eq!(h.transport.edits_of(channel).len(), 1);

        let err = h.registry().claim(channel, OTHER_STAFF).await.unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(
            h.registry().resolve_by_channel(channel).await.unwrap().claimed_by,
            Some(STAFF)
        );
    }

    #[tokio::test]
    async fn test_unknown_channel_is_not_found() {
        let h = TestHarness::new();
        let err = h
            .registry()
            .resolve_by_channel(Snowflake::new(555))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ThreadNotFound(_)));

        let err = h.registry().claim(Snowflake::new(555), STAFF).await.unwrap_err();
        assert!(err.is_not_found());

        let err = h.registry().resolve_by_user(USER).await.unwrap_err();
        assert!(matches!(err, DomainError::UserThreadNotFound(_)));
    }

    #[tokio::test]
    async fn test_close_then_message_opens_new_thread() {
        let h = TestHarness::new();
        let first = h.registry().route_inbound(USER, "hello").await.unwrap().thread;
        h.registry().claim(first.channel_id, STAFF).await.unwrap();

        let closed = h.registry().close(first.channel_id, STAFF).await.unwrap();
        assert_eq!(closed.status, ThreadStatus::Closed);
        assert_eq!(closed.claimed_by, None);
        assert_eq!(closed.closed_by, Some(STAFF));
        assert!(h.registry().resolve_by_user(USER).await.is_err());

        let rename = h.transport.edits_of(first.channel_id).pop().unwrap();
        assert_eq!(rename.name.as_deref(), Some("closed-modmail-42"));
        assert_eq!(rename.parent, ParentUpdate::Clear);

        let dms = h.transport.messages_to(MessageTarget::User(USER));
        assert!(dms.last().unwrap().contains("closed"));

        // Closed threads stay resolvable by channel
        let resolved = h.registry().resolve_by_channel(first.channel_id).await.unwrap();
        assert!(resolved.is_closed());

        let second = h.registry().route_inbound(USER, "again").await.unwrap();
        assert!(second.opened);
        assert_ne!(second.thread.id, first.id);
        assert_ne!(second.thread.channel_id, first.channel_id);
        assert_eq!(h.transport.create_count(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;

        h.registry().close(channel, STAFF).await.unwrap();
        let calls = h.transport.calls().len();

        let again = h.registry().close(channel, OTHER_STAFF).await.unwrap();
        assert!(again.is_closed());
        assert_eq!(again.closed_by, Some(STAFF));
        assert_eq!(h.transport.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_transitions_on_closed_thread_fail() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.registry().close(channel, STAFF).await.unwrap();

        assert!(h.registry().claim(channel, STAFF).await.unwrap_err().is_invalid_state());
        assert!(h.registry().archive(channel, STAFF).await.unwrap_err().is_invalid_state());
        assert!(h.registry().lock(channel, STAFF).await.unwrap_err().is_invalid_state());
        assert!(h
            .registry()
            .reply(channel, STAFF, "hello?")
            .await
            .unwrap_err()
            .is_invalid_state());
    }

    #[tokio::test]
    async fn test_archive_and_unarchive() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.registry().claim(channel, STAFF).await.unwrap();

        let archived = h.registry().archive(channel, STAFF).await.unwrap();
        assert_eq!(archived.status, ThreadStatus::Archived);
        assert_eq!(archived.claimed_by, None);
        let edit = h.transport.edits_of(channel).pop().unwrap();
        assert_eq!(edit.parent, ParentUpdate::Set(ARCHIVE_CATEGORY));

        // Re-archiving is a no-op
        let edits = h.transport.edits_of(channel).len();
        h.registry().archive(channel, STAFF).await.unwrap();
        assert_eq!(h.transport.edits_of(channel).len(), edits);

        // Staff replies still reach the user
        h.registry().reply(channel, STAFF, "still here").await.unwrap();

        let active = h.registry().unarchive(channel, STAFF).await.unwrap();
        assert_eq!(active.status, ThreadStatus::Active);
        let edit = h.transport.edits_of(channel).pop().unwrap();
        assert_eq!(edit.parent, ParentUpdate::Set(ACTIVE_CATEGORY));

        assert!(h.registry().unarchive(channel, STAFF).await.unwrap_err().is_invalid_state());
    }

    #[tokio::test]
    async fn test_message_to_archived_thread_without_reopen() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.registry().archive(channel, STAFF).await.unwrap();

        let delivery = h.registry().route_inbound(USER, "anyone?").await.unwrap();
        assert!(!delivery.opened);
        assert_eq!(delivery.thread.channel_id, channel);
        assert_eq!(delivery.thread.status, ThreadStatus::Archived);
    }

    #[tokio::test]
    async fn test_message_to_archived_thread_with_reopen() {
        let mut settings = crate::testing::test_settings();
        settings.reopen_on_message = true;
        let h = TestHarness::with_settings(settings);
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.registry().archive(channel, STAFF).await.unwrap();

        let delivery = h.registry().route_inbound(USER, "back again").await.unwrap();
        assert_eq!(delivery.thread.channel_id, channel);
        assert_eq!(delivery.thread.status, ThreadStatus::Active);
        assert_eq!(
            h.audit.kinds().last(),
            Some(&ThreadEventKind::Unarchived)
        );
    }

    #[tokio::test]
    async fn test_lock_restricts_overwrites() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.registry()
            .add_participant(channel, Snowflake::new(99), STAFF)
            .await
            .unwrap();

        let locked = h.registry().lock(channel, STAFF).await.unwrap();
        assert!(locked.locked);

        let overwrites = h.transport.edits_of(channel).pop().unwrap().overwrites.unwrap();
        let member = overwrites.iter().find(|o| o.id == Snowflake::new(99)).unwrap();
        assert!(member.deny.contains(Permissions::SEND_MESSAGES));

        // Idempotent
        let edits = h.transport.edits_of(channel).len();
        h.registry().lock(channel, STAFF).await.unwrap();
        assert_eq!(h.transport.edits_of(channel).len(), edits);
    }

    #[tokio::test]
    async fn test_add_participant_notifies_member() {
        let h = TestHarness::new();
        let member = Snowflake::new(99);
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;

        let thread = h.registry().add_participant(channel, member, STAFF).await.unwrap();
        assert_eq!(thread.participants, vec![member]);
        assert_eq!(h.transport.messages_to(MessageTarget::User(member)).len(), 1);

        h.registry().add_participant(channel, member, STAFF).await.unwrap();
        assert_eq!(h.transport.messages_to(MessageTarget::User(member)).len(), 1);

        let event = h.audit.events().pop().unwrap();
        assert_eq!(event.kind, ThreadEventKind::ParticipantAdded);
        assert_eq!(event.subject, Some(member));
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_no_reservation() {
        let h = TestHarness::new();
        h.transport.fail_next_creates(1);

        let err = h.registry().route_inbound(USER, "hello").await.unwrap_err();
        assert!(err.is_transport());
        assert!(h.registry().resolve_by_user(USER).await.is_err());
        assert!(h.registry().list_open().await.is_empty());
        assert!(h.repo.is_empty());

        let delivery = h.registry().route_inbound(USER, "hello").await.unwrap();
        assert!(delivery.opened);
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_previous_state() {
        let h = TestHarness::new();
        let channel = h.registry().route_inbound(USER, "hi").await.unwrap().thread.channel_id;
        h.transport.remove_remote_channel(channel);

        assert!(h.registry().claim(channel, STAFF).await.unwrap_err().is_transport());
        let thread = h.registry().resolve_by_channel(channel).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Active);
        assert_eq!(thread.claimed_by, None);
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        let mut settings = crate::testing::test_settings();
        settings.transport_timeout = Duration::from_millis(50);
        let h = TestHarness::with_settings(settings);
        h.transport.set_delay(Duration::from_millis(500));

        let err = h.registry().route_inbound(USER, "hello").await.unwrap_err();
        assert!(matches!(err, DomainError::TransportTimeout(_)));
        assert!(h.registry().resolve_by_user(USER).await.is_err());
    }

    #[tokio::test]
    async fn test_content_validation() {
        let h = TestHarness::new();
        let err = h.registry().route_inbound(USER, "   ").await.unwrap_err();
        assert!(err.is_validation());

        let long = "a".repeat(MAX_CONTENT_LEN + 1);
        let err = h.registry().route_inbound(USER, &long).await.unwrap_err();
        assert!(matches!(err, DomainError::ContentTooLong { .. }));
        assert_eq!(h.transport.create_count(), 0);
    }

    #[tokio::test]
    async fn test_state_is_written_through() {
        let h = TestHarness::new();
        let thread = h.registry().route_inbound(USER, "hi").await.unwrap().thread;
        h.registry().claim(thread.channel_id, STAFF).await.unwrap();

        let stored = h.repo.find_by_id(thread.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Claimed);
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_list_open() {
        let h = TestHarness::new();
        let a = h.registry().route_inbound(Snowflake::new(1), "a").await.unwrap().thread;
        let b = h.registry().route_inbound(Snowflake::new(2), "b").await.unwrap().thread;
        h.registry().close(a.channel_id, STAFF).await.unwrap();

        let open = h.registry().list_open().await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, b.id);
        assert!(matches!(
            h.transport.calls().first(),
            Some(TransportCall::CreateChannel(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_on_remote_calls() {
        let h = TestHarness::new();
        h.registry().route_inbound(Snowflake::new(1), "first").await.unwrap();

        h.transport.set_delay(Duration::from_millis(400));
        let registry = h.registry();
        let slow = tokio::spawn(async move { registry.route_inbound(Snowflake::new(2), "second").await });
        // Let the second user's open reach the transport
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = tokio::time::Instant::now();
        let open = h.registry().list_open().await;
        let by_user = h.registry().resolve_by_user(Snowflake::new(1)).await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(open.len(), 1);
        assert!(by_user.is_ok());
        assert_eq!(h.registry().open_count(), 1);

        assert!(slow.await.unwrap().unwrap().opened);
        assert_eq!(h.registry().list_open().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stored_thread_routes_without_reconcile() {
        let h = TestHarness::new();
        let channel_id = Snowflake::new(777);
        let stored = Thread::open(Snowflake::new(5_000), USER, channel_id, OpenedBy::UserMessage);
        h.repo.insert(&stored).await.unwrap();
        h.transport.add_remote_channel(modmail_core::RemoteChannel {
            id: channel_id,
            name: Thread::channel_name(USER),
            parent_id: Some(ACTIVE_CATEGORY),
            topic: Some(stored.topic().render()),
        });

        let delivery = h.registry().route_inbound(USER, "back again").await.unwrap();
        assert!(!delivery.opened);
        assert_eq!(delivery.thread.id, stored.id);
        assert_eq!(h.transport.create_count(), 0);
        assert_eq!(
            h.transport.messages_to(MessageTarget::Channel(channel_id)),
            vec!["**<@42>:** back again".to_string()]
        );

        let err = h
            .registry()
            .open_thread(USER, OpenedBy::Staff(STAFF))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert!(h.registry().resolve_by_channel(channel_id).await.is_ok());
    }
}
