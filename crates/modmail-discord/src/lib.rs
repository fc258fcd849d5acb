//! # modmail-discord
//!
//! [`Transport`](modmail_core::Transport) implementation over the Discord REST
//! API (v10). Only the handful of endpoints the thread registry needs are
//! covered: channel create/edit/list, message send, and DM channel creation.

mod client;
mod payload;

pub use client::{DiscordTransport, DISCORD_API_BASE};
pub use payload::{split_content, MAX_MESSAGE_LEN};
