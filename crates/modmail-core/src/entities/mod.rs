//! Domain entities - core business objects

mod channel;
mod thread;

pub use channel::{
    ChannelEdit, GuildMember, MessageTarget, NewChannel, ParentUpdate, RemoteChannel,
};
pub use thread::{OpenedBy, Thread, ThreadStatus, ThreadTopic};
