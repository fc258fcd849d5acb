//! Domain events emitted on thread lifecycle transitions

mod thread_event;

pub use thread_event::{ThreadEvent, ThreadEventKind};
