//! Data transfer objects for API requests and responses
//!
//! This module provides:
//! - Request DTOs (ingress events) with validation
//! - Response DTOs for serializing API outputs

pub mod requests;
pub mod responses;

// Re-export commonly used request types
pub use requests::{DirectMessageEvent, StaffCommandEvent, StaffMessageEvent};

// Re-export commonly used response types
pub use responses::{
    ApiResponse, CommandReply, DeliveryResponse, HealthChecks, HealthResponse, ReadinessResponse,
    ThreadResponse,
};
