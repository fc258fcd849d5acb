//! Entity ↔ Model mappers

mod thread;

pub use thread::ThreadRow;
