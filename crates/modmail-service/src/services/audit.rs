//! Audit sinks
//!
//! Every lifecycle transition produces one [`ThreadEvent`]. The server fans
//! each event out to the structured log and to the staff log channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use modmail_core::{AuditSink, MessageTarget, Snowflake, ThreadEvent, Transport};

/// Writes events to the `modmail::audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &ThreadEvent) {
        info!(
            target: "modmail::audit",
            event = event.kind.as_str(),
            thread_id = %event.thread_id,
            user_id = %event.user_id,
            channel_id = %event.channel_id,
            actor = %event.actor,
            subject = ?event.subject,
            "thread event"
        );
    }
}

/// Posts a one-line summary of each event to a staff log channel
pub struct LogChannelAuditSink {
    transport: Arc<dyn Transport>,
    channel_id: Snowflake,
    timeout: Duration,
}

impl LogChannelAuditSink {
    pub fn new(transport: Arc<dyn Transport>, channel_id: Snowflake, timeout: Duration) -> Self {
        Self {
            transport,
            channel_id,
            timeout,
        }
    }
}

#[async_trait]
impl AuditSink for LogChannelAuditSink {
    async fn record(&self, event: &ThreadEvent) {
        let summary = event.summary();
        let sent = tokio::time::timeout(
            self.timeout,
            self.transport
                .send_message(MessageTarget::Channel(self.channel_id), &summary),
        )
        .await;

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(channel_id = %self.channel_id, error = %e, "Failed to post audit event");
            }
            Err(_) => {
                warn!(channel_id = %self.channel_id, "Posting audit event timed out");
            }
        }
    }
}

/// Delivers each event to several sinks in order
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record(&self, event: &ThreadEvent) {
        for sink in &self.sinks {
            sink.record(event).await;
        }
    }
}
