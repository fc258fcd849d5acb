//! Test fixtures
//!
//! Request bodies the gateway would post, and the response shapes the
//! tests read back.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Counter for unique user ids
static NEXT_USER: AtomicI64 = AtomicI64::new(1_000);

/// A user id no other test uses
pub fn unique_user_id() -> i64 {
    NEXT_USER.fetch_add(1, Ordering::SeqCst)
}

/// Staff member issuing commands in the tests
pub const STAFF_ID: i64 = 7;

/// Direct message event
#[derive(Debug, Serialize)]
pub struct DirectMessage {
    pub user_id: String,
    pub content: String,
}

impl DirectMessage {
    pub fn new(user_id: i64, content: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            content: content.to_string(),
        }
    }
}

/// Structured staff command event
#[derive(Debug, Serialize)]
pub struct StaffCommand {
    pub command: String,
    pub channel_id: String,
    pub invoking_staff_id: String,
    pub args: Vec<String>,
}

impl StaffCommand {
    pub fn new(command: &str, channel_id: &str) -> Self {
        Self {
            command: command.to_string(),
            channel_id: channel_id.to_string(),
            invoking_staff_id: STAFF_ID.to_string(),
            args: Vec::new(),
        }
    }

    pub fn by(mut self, staff_id: i64) -> Self {
        self.invoking_staff_id = staff_id.to_string();
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }
}

/// Raw staff message event
#[derive(Debug, Serialize)]
pub struct StaffMessage {
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
}

impl StaffMessage {
    pub fn new(channel_id: &str, content: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            author_id: STAFF_ID.to_string(),
            content: content.to_string(),
        }
    }
}

/// Thread response
#[derive(Debug, Deserialize)]
pub struct ThreadResponse {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub status: String,
    pub claimed_by: Option<String>,
    pub locked: bool,
    pub participants: Vec<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
}

/// Delivery response
#[derive(Debug, Deserialize)]
pub struct DeliveryResponse {
    pub thread: ThreadResponse,
    pub opened: bool,
}

/// Command reply
#[derive(Debug, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
}

/// List wrapper
#[derive(Debug, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Error response body
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
