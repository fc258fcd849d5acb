//! Domain errors - error types for the domain layer

use std::time::Duration;

use thiserror::Error;

use crate::entities::ThreadStatus;
use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("This channel is not a modmail thread: {0}")]
    ThreadNotFound(Snowflake),

    #[error("User {0} has no open thread")]
    UserThreadNotFound(Snowflake),

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("User {user_id} already has an open thread in <#{channel_id}>")]
    DuplicateThread {
        user_id: Snowflake,
        channel_id: Snowflake,
    },

    // =========================================================================
    // State Machine Violations
    // =========================================================================
    #[error("Cannot {action} a thread that is {status}")]
    InvalidState {
        channel_id: Snowflake,
        status: ThreadStatus,
        action: &'static str,
    },

    #[error("Thread is already claimed by <@{claimed_by}>")]
    AlreadyClaimed {
        channel_id: Snowflake,
        claimed_by: Snowflake,
    },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport call timed out after {0:?}")]
    TransportTimeout(Duration),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::ThreadNotFound(_) => "UNKNOWN_THREAD",
            Self::UserThreadNotFound(_) => "NO_OPEN_THREAD",
            Self::DuplicateThread { .. } => "DUPLICATE_THREAD",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::TransportTimeout(_) => "TRANSPORT_TIMEOUT",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ThreadNotFound(_) | Self::UserThreadNotFound(_))
    }

    /// Check if this is a duplicate-thread conflict
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateThread { .. })
    }

    /// Check if a transition was attempted from a state that disallows it
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::AlreadyClaimed { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::ContentTooLong { .. })
    }

    /// Check if the messaging transport failed or timed out
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::TransportTimeout(_))
    }
}
