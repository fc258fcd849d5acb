//! Value objects - immutable types that represent domain concepts

mod permissions;
mod snowflake;

pub use permissions::{thread_overwrites, OverwriteKind, PermissionOverwrite, Permissions};
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
