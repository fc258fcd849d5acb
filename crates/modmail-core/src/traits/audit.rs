//! Audit sink port

use async_trait::async_trait;

use crate::events::ThreadEvent;

/// Receives one structured event per lifecycle transition.
///
/// Sinks must not fail the transition that produced the event; delivery
/// problems are theirs to log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &ThreadEvent);
}
