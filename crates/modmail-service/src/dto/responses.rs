//! Response DTOs for API endpoints
//!
//! All response DTOs implement `Serialize` for JSON output.
//! Snowflake IDs are serialized as strings for JavaScript compatibility.

use chrono::{DateTime, Utc};
use serde::Serialize;

use modmail_core::Thread;

// ============================================================================
// Common Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Thread Responses
// ============================================================================

/// A thread as exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct ThreadResponse {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_by_staff: Option<String>,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
}

impl From<&Thread> for ThreadResponse {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id.to_string(),
            user_id: thread.user_id.to_string(),
            channel_id: thread.channel_id.to_string(),
            status: thread.status.as_str().to_string(),
            claimed_by: thread.claimed_by.map(|id| id.to_string()),
            locked: thread.locked,
            opened_by_staff: thread.opened_by.staff_id().map(|id| id.to_string()),
            participants: thread.participants.iter().map(ToString::to_string).collect(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            closed_at: thread.closed_at,
            closed_by: thread.closed_by.map(|id| id.to_string()),
        }
    }
}

impl From<Thread> for ThreadResponse {
    fn from(thread: Thread) -> Self {
        Self::from(&thread)
    }
}

/// Result of routing a direct message
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResponse {
    pub thread: ThreadResponse,
    /// A new thread was opened for this message
    pub opened: bool,
}

/// Outcome of a staff command, shown to the invoking staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
}

impl CommandReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ============================================================================
// Health Check Response
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Health check status for each dependency
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub store: String,
    pub open_threads: usize,
}

impl ReadinessResponse {
    pub fn ready(store_healthy: bool, open_threads: usize) -> Self {
        Self {
            status: if store_healthy { "ready" } else { "not_ready" }.to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                store: if store_healthy { "healthy" } else { "unhealthy" }.to_string(),
                open_threads,
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}
