//! Repository implementations
//!
//! Implementations of the `ThreadRepository` port defined in modmail-core.

mod error;
mod memory;
mod thread;

pub use memory::MemoryThreadRepository;
pub use thread::PgThreadRepository;
