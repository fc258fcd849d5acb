//! # modmail-core
//!
//! Domain layer containing the thread entity and its state machine, value
//! objects, lifecycle events, and the ports (repository, transport, audit)
//! implemented by the infrastructure crates.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ChannelEdit, GuildMember, MessageTarget, NewChannel, OpenedBy, ParentUpdate, RemoteChannel,
    Thread, ThreadStatus, ThreadTopic,
};
pub use error::DomainError;
pub use events::{ThreadEvent, ThreadEventKind};
pub use traits::{AuditSink, RepoResult, ThreadRepository, Transport, TransportResult};
pub use value_objects::{
    thread_overwrites, OverwriteKind, PermissionOverwrite, Permissions, Snowflake,
    SnowflakeGenerator, SnowflakeParseError,
};
